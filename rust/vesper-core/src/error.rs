//! Error taxonomy for the futures engine.
//!
//! Two families of failures flow through the same enum:
//!
//! - **Stored failures** are produced on the writer side and parked inside an
//!   operation state until a consumer observes them via `get` or `error`:
//!   [`FutureError::BrokenPromise`] and [`FutureError::TaskPanicked`].
//! - **Synchronous failures** are returned directly from the offending API
//!   call: [`FutureError::Uninitialized`], [`FutureError::NoState`],
//!   [`FutureError::AlreadyRetrieved`], [`FutureError::AlreadySatisfied`] and
//!   [`FutureError::InvalidState`].
//!
//! Panics raised by user tasks are reserved for programmer errors; the engine
//! catches them at the task boundary and converts them into
//! [`FutureError::TaskPanicked`] so a panicking task never takes an executor
//! worker down with it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

// ---------------------------------------------------------------------------
// FutureError
// ---------------------------------------------------------------------------

/// Everything that can go wrong when producing or consuming a future.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FutureError {
    /// The producer was destroyed before setting a value or an error.
    #[error("broken promise: producer dropped before fulfilling the state")]
    BrokenPromise,

    /// A second `set_value` / `set_error` was attempted on the same state.
    #[error("state already satisfied")]
    AlreadySatisfied,

    /// `get`, `wait`, or `request_stop` was called on an invalid future.
    #[error("future is uninitialized")]
    Uninitialized,

    /// A continuation was attached to an invalid future.
    #[error("future has no state to continue from")]
    NoState,

    /// `get_future` was called a second time on the same promise or task.
    #[error("future already retrieved")]
    AlreadyRetrieved,

    /// The operation is not supported by the state's current representation.
    #[error("invalid state for operation: {0}")]
    InvalidState(&'static str),

    /// The user's task panicked; the payload message is captured verbatim.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

/// Result alias used throughout the engine.
pub type FutureResult<T> = Result<T, FutureError>;

// ---------------------------------------------------------------------------
// Panic boundary
// ---------------------------------------------------------------------------

/// Run `f`, converting a panic into [`FutureError::TaskPanicked`].
///
/// This is the boundary between user code and the engine: every task,
/// continuation, and packaged closure is invoked through it.
pub(crate) fn catch_task<T, F>(f: F) -> FutureResult<T>
where
    F: FnOnce() -> FutureResult<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(FutureError::TaskPanicked(panic_message(&payload))),
    }
}

/// Extract a human-readable message from a panic payload.
///
/// Handles `&str` and `String` payloads; falls back to a generic message.
pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
