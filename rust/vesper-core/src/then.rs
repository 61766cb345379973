//! Continuation wiring: building the derived future and scheduling it.
//!
//! Three wiring modes, chosen from the parent's capabilities:
//!
//! - **Bridge** — the parent is continuable: a trigger callback is registered
//!   on the parent's continuation source. The parent's list stores only a
//!   weak reference to the child state; the child's task owns the parent
//!   handle. Ownership therefore flows child → parent and never cycles.
//! - **Deferred poll** — the parent has no continuation source (a ready
//!   value, a promise-fed state that was shared away, …): the trigger is
//!   deferred on the child's executor, and the task's own `get` on the
//!   parent blocks until the parent settles.
//! - **Deferred chain** — the parent is always-deferred: the child becomes an
//!   always-deferred inline state too. Nothing is posted anywhere until the
//!   chain is awaited, at which point the tasks run back-to-front on the
//!   waiting thread.

use std::sync::Arc;

use crate::error::{FutureError, FutureResult};
use crate::executor::{default_executor, ExecutorHandle};
use crate::future::{Future, FutureOptions};
use crate::future_state::FutureState;
use crate::operation_state::{OperationState, StateConfig};
use crate::stop::StopSource;
use crate::unwrap::Continuation;

/// Attach `continuation` to `parent`, returning the derived future.
///
/// `executor` overrides the continuation's executor; by default it inherits
/// the parent's, falling back to the global pool.
pub(crate) fn attach<T, C, M>(
    parent: Future<T>,
    executor: Option<ExecutorHandle>,
    continuation: C,
) -> FutureResult<Future<C::Output>>
where
    T: Send + 'static,
    C: Continuation<T, M>,
{
    if !parent.valid() {
        return Err(FutureError::NoState);
    }

    let parent_options = *parent.options();
    let executor = executor
        .or_else(|| parent.state().executor_handle())
        .unwrap_or_else(default_executor);

    // Derived cancellation: a token-consuming continuation gets a fresh stop
    // source; otherwise a unique stoppable parent hands its flag down so the
    // chain cancels as one unit.
    let stop_source = if C::NEEDS_TOKEN {
        Some(StopSource::new())
    } else if parent_options.stoppable && !parent_options.shared {
        parent.stop_source().ok()
    } else {
        None
    };
    let stoppable = stop_source.is_some();

    if parent_options.always_deferred {
        // Deferred chain: the child's state lives inline in the new handle
        // and its task awaits the parent when the chain is first observed.
        let mut config = StateConfig::deferred(executor);
        if let Some(source) = stop_source {
            config = config.stoppable(source);
        }
        let state = OperationState::new(config);
        state.install_task(Box::new(move |token| {
            continuation.continue_with(parent, token)
        }));
        let options = FutureOptions {
            continuable: true,
            stoppable,
            deferred: true,
            always_deferred: true,
            shared: false,
        };
        return Ok(Future::from_parts(
            FutureState::Inline(Box::new(state)),
            options,
        ));
    }

    // Grab the parent's continuation source before the parent handle moves
    // into the child's task.
    let bridge_state = if parent_options.continuable {
        parent.shared_operation_state()
    } else {
        None
    };

    let mut config = StateConfig::eager(executor.clone());
    if let Some(source) = stop_source {
        config = config.stoppable(source);
    }
    let child = Arc::new(OperationState::new(config));
    child.install_task(Box::new(move |token| {
        continuation.continue_with(parent, token)
    }));

    // The trigger holds the child weakly: if every child handle is gone and
    // the state was reclaimed, firing is a no-op.
    let weak = Arc::downgrade(&child);
    let trigger = move || {
        if let Some(state) = weak.upgrade() {
            state.apply();
        }
    };

    match bridge_state.filter(|state| state.continuations().is_some()) {
        Some(parent_state) => {
            let continuations = parent_state
                .continuations()
                .expect("bridge state was checked for a continuation source");
            continuations.emplace(executor, trigger);
        }
        // No continuation source to hook: defer a job whose `get` on the
        // parent blocks until the parent settles.
        None => executor.defer(trigger),
    }

    let options = FutureOptions {
        continuable: true,
        stoppable,
        deferred: false,
        always_deferred: false,
        shared: false,
    };
    Ok(Future::from_parts(FutureState::Shared(child), options))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::{launch, make_ready_future, schedule};
    use crate::stop::StopToken;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn then_on_invalid_future_is_no_state() {
        let parent: Future<i32> = Future::empty();
        let result = parent.then(|v: i32| v);
        assert_eq!(result.unwrap_err(), FutureError::NoState);
    }

    #[test]
    fn bridge_continuation_runs_after_the_parent() {
        let executor = default_executor();
        let parent = launch(&executor, || {
            std::thread::sleep(Duration::from_millis(10));
            2
        });
        let child = parent.then(|v: i32| v * 3).unwrap();
        assert_eq!(child.get(), Ok(6));
    }

    #[test]
    fn continuation_on_ready_value_uses_the_poll_path() {
        let child = make_ready_future(5).then(|v: i32| v + 1).unwrap();
        assert_eq!(child.get(), Ok(6));
    }

    #[test]
    fn continuations_chain() {
        let executor = default_executor();
        let result = launch(&executor, || 1)
            .then(|v: i32| v + 1)
            .unwrap()
            .then(|v: i32| v * 10)
            .unwrap()
            .get();
        assert_eq!(result, Ok(20));
    }

    #[test]
    fn deferred_chain_stays_inline_until_observed() {
        let executor = default_executor();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        let parent = schedule(&executor, move || {
            r.fetch_add(1, Ordering::Relaxed);
            7
        });
        let child = parent.then(|v: i32| v + 1).unwrap();
        assert!(child.options().always_deferred);
        assert_eq!(ran.load(Ordering::Relaxed), 0);
        assert_eq!(child.get(), Ok(8));
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn token_continuation_makes_the_child_stoppable() {
        let executor = default_executor();
        let parent = launch(&executor, || 1);
        let child = parent
            .then(|token: StopToken, v: i32| {
                // The token belongs to the child's own state.
                assert!(token.stop_possible());
                v + 1
            })
            .unwrap();
        assert!(child.options().stoppable);
        assert_eq!(child.get(), Ok(2));
    }

    #[test]
    fn unique_stoppable_parent_hands_its_flag_down() {
        let executor = default_executor();
        let parent = launch(&executor, |token: StopToken| {
            while !token.stop_requested() {
                std::thread::sleep(Duration::from_millis(1));
            }
            1
        });
        let parent_token = parent.stop_token().unwrap();
        let child = parent.then(|v: i32| v).unwrap();
        assert!(child.options().stoppable);
        // Requesting a stop through the child reaches the parent's flag.
        assert_eq!(child.request_stop(), Ok(true));
        assert!(parent_token.stop_requested());
        assert_eq!(child.get(), Ok(1));
    }

    #[test]
    fn parent_failure_propagates_through_the_chain() {
        let executor = default_executor();
        let parent: Future<i32> = launch(&executor, || panic!("parent died"));
        let child = parent.then(|v: i32| v).unwrap();
        assert_eq!(
            child.get(),
            Err(FutureError::TaskPanicked("parent died".into()))
        );
    }

    #[test]
    fn whole_future_continuation_sees_the_failure_itself() {
        let executor = default_executor();
        let parent: Future<i32> = launch(&executor, || panic!("inner"));
        let child = parent
            .then(|f: Future<i32>| match f.get() {
                Ok(_) => "value",
                Err(FutureError::TaskPanicked(_)) => "panic",
                Err(_) => "other",
            })
            .unwrap();
        assert_eq!(child.get(), Ok("panic"));
    }

    #[test]
    fn then_identity_preserves_the_value() {
        let executor = default_executor();
        let direct = launch(&executor, || 42).get();
        let chained = launch(&executor, || 42).then(|v: i32| v).unwrap().get();
        assert_eq!(direct, chained);
    }

    #[test]
    fn continuation_attached_before_the_promise_settles() {
        let mut promise = crate::promise::Promise::new();
        let parent = promise.get_future().unwrap();
        let child = parent.then(|v: i32| v * 2).unwrap();
        assert!(!child.is_ready());
        promise.set_value(21).unwrap();
        assert_eq!(child.get(), Ok(42));
    }

    #[test]
    fn continuation_attached_after_the_promise_settles() {
        let mut promise = crate::promise::Promise::new();
        let parent = promise.get_future().unwrap();
        promise.set_value(3).unwrap();
        // The parent's continuation list already ran; the bridge posts
        // immediately instead.
        let child = parent.then(|v: i32| v + 1).unwrap();
        assert_eq!(child.get(), Ok(4));
    }
}
