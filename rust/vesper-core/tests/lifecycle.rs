//! Handle lifecycle: promises, sharing, and failure taxonomy.

use vesper_core::{
    default_executor, launch, make_ready_future, FutureError, PackagedTask, Promise, WaitStatus,
};
use std::time::Duration;

#[test]
fn broken_promise_surfaces_on_get() {
    let mut promise = Promise::<i32>::new();
    let future = promise.get_future().unwrap();
    drop(promise);
    assert_eq!(future.get(), Err(FutureError::BrokenPromise));
}

#[test]
fn promise_error_kinds_are_distinguishable() {
    let mut promise = Promise::<i32>::new();
    let _future = {
        let f = promise.get_future().unwrap();
        assert_eq!(
            promise.get_future().unwrap_err(),
            FutureError::AlreadyRetrieved
        );
        f
    };
    promise.set_value(1).unwrap();
    assert_eq!(promise.set_value(2), Err(FutureError::AlreadySatisfied));
}

#[test]
fn share_then_get_matches_the_unique_get() {
    let executor = default_executor();
    let unique_value = launch(&executor, || "payload".to_string()).get();

    let shared = launch(&executor, || "payload".to_string()).share().unwrap();
    let shared_value = shared.get();
    assert_eq!(unique_value, shared_value);
    // The shared handle can read again; the unique one was consumed.
    assert_eq!(shared.get(), Ok("payload".to_string()));
}

#[test]
fn readiness_is_shared_between_clones() {
    let mut promise = Promise::new();
    let shared = promise.get_future().unwrap().share().unwrap();
    let observer = shared.clone();
    assert!(!observer.is_ready());
    promise.set_value(3).unwrap();
    shared.wait().unwrap();
    assert!(observer.is_ready());
    assert_eq!(observer.get(), Ok(3));
}

#[test]
fn ready_futures_never_block_on_wait() {
    let mut future = make_ready_future(1);
    assert!(future.is_ready());
    let status = future.wait_timeout(Duration::from_secs(0)).unwrap();
    assert_eq!(status, WaitStatus::Ready);
    assert_eq!(future.get(), Ok(1));
}

#[test]
fn timed_wait_on_a_pending_promise_times_out() {
    let mut promise = Promise::<i32>::new();
    let mut future = promise.get_future().unwrap();
    let status = future.wait_timeout(Duration::from_millis(30)).unwrap();
    assert_eq!(status, WaitStatus::Timeout);
    promise.set_value(9).unwrap();
    assert_eq!(future.get(), Ok(9));
}

#[test]
fn packaged_task_drives_its_future() {
    let mut task = PackagedTask::new(|| 6 * 7);
    let future = task.get_future().unwrap();
    task.run().unwrap();
    assert_eq!(future.get(), Ok(42));
}

#[test]
fn invalid_future_operations_report_uninitialized() {
    let future: vesper_core::Future<u8> = vesper_core::Future::empty();
    assert!(!future.valid());
    assert_eq!(future.get(), Err(FutureError::Uninitialized));
}

#[test]
fn task_panics_are_captured_not_propagated() {
    let executor = default_executor();
    let future: vesper_core::Future<i32> = launch(&executor, || panic!("task failure"));
    match future.get() {
        Err(FutureError::TaskPanicked(message)) => assert_eq!(message, "task failure"),
        other => panic!("expected a captured panic, got {other:?}"),
    }
}
