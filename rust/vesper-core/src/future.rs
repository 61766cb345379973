//! User-facing future handles.
//!
//! [`Future`] is the unique handle: `get` consumes it and moves the value
//! out. [`SharedFuture`] is the multi-consumer handle: it is `Clone`, and
//! `get` reads the settled value by clone. Both wrap a five-way variant
//! state and a [`FutureOptions`] record describing which capabilities the
//! state carries.
//!
//! # Drop semantics
//!
//! A unique handle joins on drop: if the state is not ready, the destructor
//! blocks until it is, so work never outlives the last handle that could
//! observe it. A unique *stoppable* handle first requests a stop, which is
//! what makes `drop(future)` a cancellation point for cooperative tasks. A
//! shared handle joins only when it is the last reference to its state.
//! [`detach`](Future::detach) opts a handle out of joining.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{FutureError, FutureResult};
use crate::future_state::{FutureState, WaiterHandle};
use crate::operation_state::{OperationState, ReadySignal, WaitStatus};
use crate::stop::{StopSource, StopToken};
use crate::then;
use crate::unwrap::Continuation;

// ---------------------------------------------------------------------------
// FutureOptions
// ---------------------------------------------------------------------------

/// Which capabilities a future's state carries.
///
/// The record is plain data: absent capabilities are simply `false`, and the
/// variant state knows which sub-objects are populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FutureOptions {
    /// Continuations attach through the state's continuation source.
    pub continuable: bool,
    /// The state carries a stop source.
    pub stoppable: bool,
    /// The bound task is not posted until the first wait.
    pub deferred: bool,
    /// Deferred with a handle-local state: the task may run inline.
    pub always_deferred: bool,
    /// Multiple handles may observe the state.
    pub shared: bool,
}

// ---------------------------------------------------------------------------
// Future
// ---------------------------------------------------------------------------

/// A unique handle to an eventual value.
pub struct Future<T: Send + 'static> {
    state: FutureState<T>,
    options: FutureOptions,
    join: bool,
}

impl<T: Send + 'static> Future<T> {
    pub(crate) fn from_parts(state: FutureState<T>, options: FutureOptions) -> Self {
        Self {
            state,
            options,
            join: true,
        }
    }

    /// An invalid future: `valid()` is false and every observation fails
    /// with [`FutureError::Uninitialized`].
    pub fn empty() -> Self {
        Self::from_parts(FutureState::Empty, FutureOptions::default())
    }

    // -- observation -------------------------------------------------------

    /// Whether this handle refers to a state.
    pub fn valid(&self) -> bool {
        self.state.valid()
    }

    /// Whether the state has been settled.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// The capability record of this future.
    pub fn options(&self) -> &FutureOptions {
        &self.options
    }

    /// Block until the state is ready.
    pub fn wait(&mut self) -> FutureResult<()> {
        if !self.valid() {
            return Err(FutureError::Uninitialized);
        }
        self.state.wait();
        Ok(())
    }

    /// Block until the state is ready or `timeout` elapses.
    pub fn wait_timeout(&mut self, timeout: Duration) -> FutureResult<WaitStatus> {
        self.wait_deadline(Instant::now() + timeout)
    }

    /// Block until the state is ready or `deadline` passes.
    pub fn wait_deadline(&mut self, deadline: Instant) -> FutureResult<WaitStatus> {
        if !self.valid() {
            return Err(FutureError::Uninitialized);
        }
        Ok(self.state.wait_deadline(deadline))
    }

    /// Wait, then move the value out, consuming the handle.
    pub fn get(mut self) -> FutureResult<T> {
        if !self.valid() {
            return Err(FutureError::Uninitialized);
        }
        self.state.wait();
        // Leave `Empty` behind so the destructor has nothing to join.
        let mut state = self.state.take();
        state.take_value()
    }

    /// Wait, then report the stored failure without consuming the value.
    pub fn error(&mut self) -> FutureResult<Option<FutureError>> {
        if !self.valid() {
            return Err(FutureError::Uninitialized);
        }
        self.state.wait();
        self.state.error()
    }

    // -- sharing -----------------------------------------------------------

    /// Convert this handle into a multi-consumer one.
    pub fn share(mut self) -> FutureResult<SharedFuture<T>> {
        let state = self.state.take().into_shared()?;
        let mut options = self.options;
        options.shared = true;
        Ok(SharedFuture { state, options })
    }

    // -- continuation ------------------------------------------------------

    /// Attach a continuation; its executor is inherited from this future
    /// (or the default executor when there is none).
    pub fn then<C, M>(self, continuation: C) -> FutureResult<Future<C::Output>>
    where
        C: Continuation<T, M>,
    {
        then::attach(self, None, continuation)
    }

    /// Attach a continuation to run on `executor`.
    pub fn then_on<C, M>(
        self,
        executor: &crate::executor::ExecutorHandle,
        continuation: C,
    ) -> FutureResult<Future<C::Output>>
    where
        C: Continuation<T, M>,
    {
        then::attach(self, Some(executor.clone()), continuation)
    }

    // -- cancellation ------------------------------------------------------

    /// The stop source of a stoppable future.
    pub fn stop_source(&self) -> FutureResult<StopSource> {
        self.state.stop_source().map(Clone::clone)
    }

    /// An observing token for a stoppable future.
    pub fn stop_token(&self) -> FutureResult<StopToken> {
        self.state.stop_token()
    }

    /// Request a stop; `Ok(true)` for the first request on the flag.
    pub fn request_stop(&self) -> FutureResult<bool> {
        if !self.valid() {
            return Err(FutureError::Uninitialized);
        }
        self.state.request_stop()
    }

    // -- lifecycle ---------------------------------------------------------

    /// Opt this handle out of joining on drop.
    pub fn detach(&mut self) {
        self.join = false;
    }

    /// Register `signal` to fire when this future becomes ready.
    ///
    /// Returns `None` when the future is already settled (the signal fires
    /// immediately). Promotes an inline state to a shared one.
    pub fn notify_when_ready(
        &mut self,
        signal: &Arc<ReadySignal>,
    ) -> FutureResult<Option<WaiterHandle>> {
        self.state.subscribe(signal)
    }

    // -- crate plumbing ----------------------------------------------------

    pub(crate) fn state(&self) -> &FutureState<T> {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut FutureState<T> {
        &mut self.state
    }

    pub(crate) fn shared_operation_state(&self) -> Option<Arc<OperationState<T>>> {
        self.state.shared_state()
    }
}

impl<T: Send + 'static> Default for Future<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Send + 'static> Drop for Future<T> {
    fn drop(&mut self) {
        if !self.state.valid() {
            return;
        }
        if self.options.stoppable && !self.state.is_ready() {
            let _ = self.state.request_stop();
        }
        if self.join && !self.state.is_ready() {
            self.state.wait();
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("valid", &self.valid())
            .field("is_ready", &self.is_ready())
            .field("options", &self.options)
            .field("join", &self.join)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SharedFuture
// ---------------------------------------------------------------------------

/// A multi-consumer handle to an eventual value.
///
/// Every clone observes the same state; `get` reads the settled value by
/// clone instead of moving it out.
pub struct SharedFuture<T: Send + 'static> {
    state: FutureState<T>,
    options: FutureOptions,
}

impl<T: Send + 'static> SharedFuture<T> {
    /// Whether this handle refers to a state.
    pub fn valid(&self) -> bool {
        self.state.valid()
    }

    /// Whether the state has been settled.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// The capability record of this future.
    pub fn options(&self) -> &FutureOptions {
        &self.options
    }

    /// Block until the state is ready.
    pub fn wait(&self) -> FutureResult<()> {
        match &self.state {
            FutureState::Empty => Err(FutureError::Uninitialized),
            FutureState::Shared(state) => {
                OperationState::wait(state);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Block until the state is ready or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> FutureResult<WaitStatus> {
        self.wait_deadline(Instant::now() + timeout)
    }

    /// Block until the state is ready or `deadline` passes.
    pub fn wait_deadline(&self, deadline: Instant) -> FutureResult<WaitStatus> {
        match &self.state {
            FutureState::Empty => Err(FutureError::Uninitialized),
            FutureState::Shared(state) => Ok(OperationState::wait_deadline(state, deadline)),
            _ => Ok(WaitStatus::Ready),
        }
    }

    /// Wait, then report the stored failure.
    pub fn error(&self) -> FutureResult<Option<FutureError>> {
        self.wait()?;
        self.state.error()
    }

    /// Request a stop; `Ok(true)` for the first request on the flag.
    pub fn request_stop(&self) -> FutureResult<bool> {
        if !self.valid() {
            return Err(FutureError::Uninitialized);
        }
        self.state.request_stop()
    }

    /// An observing token for a stoppable future.
    pub fn stop_token(&self) -> FutureResult<StopToken> {
        self.state.stop_token()
    }
}

impl<T: Clone + Send + 'static> SharedFuture<T> {
    /// Wait, then read the settled value by clone.
    pub fn get(&self) -> FutureResult<T> {
        self.wait()?;
        self.state.clone_value()
    }
}

impl<T: Send + 'static> SharedFuture<T> {
    pub(crate) fn state_mut(&mut self) -> &mut FutureState<T> {
        &mut self.state
    }
}

impl<T: Send + 'static> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            // Shared handles only ever hold shareable representations.
            state: self
                .state
                .try_clone()
                .expect("shared representations are clonable"),
            options: self.options,
        }
    }
}

impl<T: Send + 'static> Drop for SharedFuture<T> {
    fn drop(&mut self) {
        // Join only as the last reference to an unfinished state.
        if let FutureState::Shared(state) = &self.state {
            if Arc::strong_count(state) == 1 && !state.is_ready() {
                OperationState::wait(state);
            }
        }
    }
}

impl<T: Send + 'static> fmt::Debug for SharedFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFuture")
            .field("valid", &self.valid())
            .field("is_ready", &self.is_ready())
            .field("options", &self.options)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::{make_error_future, make_ready_future};

    // -- validity ----------------------------------------------------------

    #[test]
    fn empty_future_is_invalid() {
        let mut f: Future<i32> = Future::empty();
        assert!(!f.valid());
        assert!(!f.is_ready());
        assert_eq!(f.wait(), Err(FutureError::Uninitialized));
        assert_eq!(f.request_stop(), Err(FutureError::Uninitialized));
        assert_eq!(f.get(), Err(FutureError::Uninitialized));
    }

    #[test]
    fn ready_future_gets_without_blocking() {
        let f = make_ready_future(42);
        assert!(f.valid());
        assert!(f.is_ready());
        assert_eq!(f.get(), Ok(42));
    }

    #[test]
    fn error_future_surfaces_the_failure() {
        let mut f = make_error_future::<i32>(FutureError::TaskPanicked("x".into()));
        assert_eq!(
            f.error(),
            Ok(Some(FutureError::TaskPanicked("x".into())))
        );
        assert_eq!(f.get(), Err(FutureError::TaskPanicked("x".into())));
    }

    #[test]
    fn ready_future_timed_wait_is_immediate() {
        let mut f = make_ready_future(1);
        let status = f.wait_timeout(Duration::from_secs(0)).unwrap();
        assert_eq!(status, WaitStatus::Ready);
        assert_eq!(f.get(), Ok(1));
    }

    // -- share -------------------------------------------------------------

    #[test]
    fn share_preserves_the_value_for_many_consumers() {
        let shared = make_ready_future(String::from("v")).share().unwrap();
        let other = shared.clone();
        assert_eq!(shared.get(), Ok("v".to_string()));
        assert_eq!(other.get(), Ok("v".to_string()));
        // Reading twice from the same handle also works.
        assert_eq!(shared.get(), Ok("v".to_string()));
    }

    #[test]
    fn share_on_invalid_future_fails() {
        let f: Future<i32> = Future::empty();
        assert_eq!(f.share().unwrap_err(), FutureError::Uninitialized);
    }

    #[test]
    fn shared_options_record_sharing() {
        let shared = make_ready_future(3).share().unwrap();
        assert!(shared.options().shared);
    }

    // -- stop contract on direct values -------------------------------------

    #[test]
    fn direct_value_has_no_stop_source() {
        let f = make_ready_future(1);
        assert!(matches!(
            f.stop_token(),
            Err(FutureError::InvalidState(_))
        ));
    }
}
