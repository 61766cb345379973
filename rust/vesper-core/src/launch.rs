//! Launching tasks: eager, deferred, and ready-made futures.
//!
//! [`launch`] posts the task right away and hands back a continuable future.
//! [`schedule`] builds an always-deferred future whose task is not handed to
//! the executor until somebody waits. [`make_ready_future`] and
//! [`make_error_future`] build settled futures that allocate no shared
//! state at all.
//!
//! A task's signature decides its cancellation support: a closure taking a
//! [`StopToken`] first is launched with a stop source and receives the
//! state's token; a plain closure is not stoppable.

use std::sync::Arc;

use crate::error::FutureError;
use crate::executor::{default_executor, ExecutorHandle};
use crate::future::{Future, FutureOptions};
use crate::future_state::FutureState;
use crate::operation_state::{OperationState, StateConfig};
use crate::slot::Slot;
use crate::stop::{StopSource, StopToken};

// ---------------------------------------------------------------------------
// Launch signatures
// ---------------------------------------------------------------------------

/// Marker types distinguishing plain tasks from token-consuming ones.
pub mod signature {
    /// `F() -> T` — no cancellation support.
    pub struct Plain;
    /// `F(StopToken) -> T` — cooperative cancellation.
    pub struct Stoppable;
}

/// A closure that can be launched as a task, with marker-driven signature
/// probing: the marker `M` is inferred from whether the closure takes a
/// [`StopToken`] first.
pub trait LaunchSignature<T, M>: Send + 'static {
    /// Whether the launched state carries a stop source.
    const STOPPABLE: bool;

    /// Invoke the task.
    fn run(self, token: Option<StopToken>) -> T;
}

impl<F, T> LaunchSignature<T, signature::Plain> for F
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    const STOPPABLE: bool = false;

    fn run(self, _token: Option<StopToken>) -> T {
        self()
    }
}

impl<F, T> LaunchSignature<T, signature::Stoppable> for F
where
    T: Send + 'static,
    F: FnOnce(StopToken) -> T + Send + 'static,
{
    const STOPPABLE: bool = true;

    fn run(self, token: Option<StopToken>) -> T {
        self(token.expect("stoppable task launched without a stop source"))
    }
}

// ---------------------------------------------------------------------------
// Launch operations
// ---------------------------------------------------------------------------

/// Launch `task` eagerly on `executor`.
///
/// The returned future is continuable, and stoppable iff the task's
/// signature accepts a stop token.
pub fn launch<T, F, M>(executor: &ExecutorHandle, task: F) -> Future<T>
where
    T: Send + 'static,
    F: LaunchSignature<T, M>,
{
    let mut config = StateConfig::eager(executor.clone());
    let stoppable = F::STOPPABLE;
    if stoppable {
        config = config.stoppable(StopSource::new());
    }
    let state = Arc::new(OperationState::new(config));
    state.install_task(Box::new(move |token| Ok(task.run(token))));

    let job_state = Arc::clone(&state);
    executor.post(move || job_state.apply());

    Future::from_parts(
        FutureState::Shared(state),
        FutureOptions {
            continuable: true,
            stoppable,
            ..FutureOptions::default()
        },
    )
}

/// Launch `task` eagerly on the global pool.
pub fn launch_default<T, F, M>(task: F) -> Future<T>
where
    T: Send + 'static,
    F: LaunchSignature<T, M>,
{
    launch(&default_executor(), task)
}

/// Build an always-deferred future bound to `executor`.
///
/// The task is not submitted anywhere until the future is first observed: a
/// plain `wait`/`get` runs it on the waiting thread without allocating a
/// shared state; a timed wait or subscription promotes the state and posts
/// the task to `executor`.
pub fn schedule<T, F, M>(executor: &ExecutorHandle, task: F) -> Future<T>
where
    T: Send + 'static,
    F: LaunchSignature<T, M>,
{
    let mut config = StateConfig::deferred(executor.clone());
    let stoppable = F::STOPPABLE;
    if stoppable {
        config = config.stoppable(StopSource::new());
    }
    let state = OperationState::new(config);
    state.install_task(Box::new(move |token| Ok(task.run(token))));

    Future::from_parts(
        FutureState::Inline(Box::new(state)),
        FutureOptions {
            continuable: true,
            stoppable,
            deferred: true,
            always_deferred: true,
            shared: false,
        },
    )
}

/// A future that is ready with `value` from the start.
///
/// Holds the value directly: no shared state, no executor, no allocation
/// beyond the value itself.
pub fn make_ready_future<T: Send + 'static>(value: T) -> Future<T> {
    Future::from_parts(FutureState::Direct(Slot::Ready(value)), FutureOptions::default())
}

/// A future that is settled with `error` from the start.
pub fn make_error_future<T: Send + 'static>(error: FutureError) -> Future<T> {
    Future::from_parts(
        FutureState::Direct(Slot::Failed(error)),
        FutureOptions::default(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
