//! Writer-side handles: promises and packaged tasks.
//!
//! A [`Promise`] is fulfilled explicitly by whoever holds it; a
//! [`PackagedTask`] wraps a closure and fulfils its state when run. Both
//! break their promise on drop: if the writer disappears before settling the
//! state, consumers observe [`FutureError::BrokenPromise`].

use std::fmt;
use std::sync::Arc;

use crate::error::{FutureError, FutureResult};
use crate::future::{Future, FutureOptions};
use crate::future_state::FutureState;
use crate::operation_state::{OperationState, StateConfig};

// ---------------------------------------------------------------------------
// Promise
// ---------------------------------------------------------------------------

/// The explicit writer end of a future.
pub struct Promise<T: Send + 'static> {
    state: Arc<OperationState<T>>,
    future_retrieved: bool,
}

impl<T: Send + 'static> Promise<T> {
    /// Create a promise with a fresh, unsettled state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(OperationState::new(StateConfig::plain())),
            future_retrieved: false,
        }
    }

    /// The future observing this promise's state.
    ///
    /// May be called exactly once; the second call fails with
    /// [`FutureError::AlreadyRetrieved`].
    pub fn get_future(&mut self) -> FutureResult<Future<T>> {
        if self.future_retrieved {
            return Err(FutureError::AlreadyRetrieved);
        }
        self.future_retrieved = true;
        let options = FutureOptions {
            continuable: true,
            ..FutureOptions::default()
        };
        Ok(Future::from_parts(
            FutureState::Shared(Arc::clone(&self.state)),
            options,
        ))
    }

    /// Fulfil the state with a value.
    pub fn set_value(&self, value: T) -> FutureResult<()> {
        self.state.set_value(value)
    }

    /// Fulfil the state with a failure.
    pub fn set_error(&self, error: FutureError) -> FutureResult<()> {
        self.state.set_error(error)
    }

    /// Whether the state has been settled.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }
}

impl<T: Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        self.state.signal_producer_destroyed();
    }
}

impl<T: Send + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("future_retrieved", &self.future_retrieved)
            .field("is_ready", &self.is_ready())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PackagedTask
// ---------------------------------------------------------------------------

/// A run-once closure bound to a future state.
///
/// The closure is stored as an `Option` so `run` executes it exactly once;
/// the second run fails instead of re-invoking.
pub struct PackagedTask<T: Send + 'static> {
    task: Option<Box<dyn FnOnce() -> T + Send + 'static>>,
    state: Arc<OperationState<T>>,
    future_retrieved: bool,
}

impl<T: Send + 'static> PackagedTask<T> {
    /// Package `f` for later execution.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            task: Some(Box::new(f)),
            state: Arc::new(OperationState::new(StateConfig::plain())),
            future_retrieved: false,
        }
    }

    /// The future observing this task's state. May be called exactly once.
    pub fn get_future(&mut self) -> FutureResult<Future<T>> {
        if self.future_retrieved {
            return Err(FutureError::AlreadyRetrieved);
        }
        self.future_retrieved = true;
        let options = FutureOptions {
            continuable: true,
            ..FutureOptions::default()
        };
        Ok(Future::from_parts(
            FutureState::Shared(Arc::clone(&self.state)),
            options,
        ))
    }

    /// Execute the stored closure through the panic boundary and fulfil the
    /// state with its outcome.
    ///
    /// Fails with [`FutureError::AlreadySatisfied`] if the task has already
    /// run.
    pub fn run(&mut self) -> FutureResult<()> {
        let task = self
            .task
            .take()
            .ok_or(FutureError::AlreadySatisfied)?;
        self.state.install_task(Box::new(move |_| Ok(task())));
        self.state.apply();
        Ok(())
    }

    /// Whether the closure is still waiting to run.
    pub fn runnable(&self) -> bool {
        self.task.is_some()
    }
}

impl<T: Send + 'static> Drop for PackagedTask<T> {
    fn drop(&mut self) {
        // An unrun task can never fulfil its state.
        self.state.signal_producer_destroyed();
    }
}

impl<T: Send + 'static> fmt::Debug for PackagedTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagedTask")
            .field("runnable", &self.runnable())
            .field("future_retrieved", &self.future_retrieved)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
