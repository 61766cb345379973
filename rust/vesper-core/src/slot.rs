//! The typed value slot inside an operation state.
//!
//! A slot is settled at most once (`Pending → Ready | Failed`) and its value
//! is moved out at most once (`Ready → Taken`, unique consumers only). This
//! replaces the uninitialized in-place storage a lower-level implementation
//! would use: every state of the cell is a named enum variant.

use crate::error::{FutureError, FutureResult};

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// Storage for the eventual outcome of a task.
#[derive(Debug)]
pub(crate) enum Slot<T> {
    /// No outcome yet.
    Pending,
    /// The producer stored a value.
    Ready(T),
    /// The producer stored a failure.
    Failed(FutureError),
    /// A unique consumer moved the value out.
    Taken,
}

impl<T> Slot<T> {
    /// Settle the slot with the task's outcome.
    ///
    /// Fails with [`FutureError::AlreadySatisfied`] unless the slot is still
    /// pending.
    pub(crate) fn settle(&mut self, outcome: FutureResult<T>) -> FutureResult<()> {
        match self {
            Slot::Pending => {
                *self = match outcome {
                    Ok(value) => Slot::Ready(value),
                    Err(err) => Slot::Failed(err),
                };
                Ok(())
            }
            _ => Err(FutureError::AlreadySatisfied),
        }
    }

    /// Move the value out, leaving [`Slot::Taken`] behind.
    ///
    /// Stored failures are returned by clone so a later `error()` probe still
    /// sees them.
    pub(crate) fn take(&mut self) -> FutureResult<T> {
        match std::mem::replace(self, Slot::Taken) {
            Slot::Ready(value) => Ok(value),
            Slot::Failed(err) => {
                *self = Slot::Failed(err.clone());
                Err(err)
            }
            Slot::Pending => {
                *self = Slot::Pending;
                Err(FutureError::InvalidState("taking a pending value"))
            }
            Slot::Taken => Err(FutureError::InvalidState("value already taken")),
        }
    }

    /// The stored failure, if the slot holds one.
    pub(crate) fn error(&self) -> Option<FutureError> {
        match self {
            Slot::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Whether the slot has been settled (value or failure).
    pub(crate) fn is_settled(&self) -> bool {
        !matches!(self, Slot::Pending)
    }
}

impl<T: Clone> Slot<T> {
    /// Read the value by clone, for multi-consumer access.
    pub(crate) fn clone_value(&self) -> FutureResult<T> {
        match self {
            Slot::Ready(value) => Ok(value.clone()),
            Slot::Failed(err) => Err(err.clone()),
            Slot::Pending => Err(FutureError::InvalidState("reading a pending value")),
            Slot::Taken => Err(FutureError::InvalidState("value already taken")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
