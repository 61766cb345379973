//! The executor abstraction the engine schedules work on.
//!
//! The engine only consumes two operations: [`Executor::post`] (run as soon
//! as possible) and [`Executor::defer`] (run when the executor has nothing
//! more urgent). Everything else — thread count, queueing discipline,
//! fairness — is the implementation's business.
//!
//! Executors are shared through [`ExecutorHandle`], a cheaply clonable
//! reference whose equality is pointer identity, so two handles compare equal
//! exactly when they submit to the same executor.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::pool::ThreadPool;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of work submitted to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

// ---------------------------------------------------------------------------
// Executor trait
// ---------------------------------------------------------------------------

/// A sink for opaque callables.
pub trait Executor: Send + Sync + 'static {
    /// Submit `job` for execution as soon as possible.
    fn post(&self, job: Job);

    /// Submit `job` to run when the executor is otherwise free.
    ///
    /// Implementations without a low-priority lane fall back to [`post`].
    ///
    /// [`post`]: Executor::post
    fn defer(&self, job: Job) {
        self.post(job);
    }
}

// ---------------------------------------------------------------------------
// ExecutorHandle
// ---------------------------------------------------------------------------

/// A shared, cheaply clonable reference to an executor.
#[derive(Clone)]
pub struct ExecutorHandle {
    inner: Arc<dyn Executor>,
}

impl ExecutorHandle {
    /// Wrap an executor in a shared handle.
    pub fn new<E: Executor>(executor: E) -> Self {
        Self {
            inner: Arc::new(executor),
        }
    }

    /// Wrap an already shared executor.
    pub fn from_arc(executor: Arc<dyn Executor>) -> Self {
        Self { inner: executor }
    }

    /// Submit a closure for execution as soon as possible.
    pub fn post<F: FnOnce() + Send + 'static>(&self, f: F) {
        self.inner.post(Box::new(f));
    }

    /// Submit a closure to run when the executor is otherwise free.
    pub fn defer<F: FnOnce() + Send + 'static>(&self, f: F) {
        self.inner.defer(Box::new(f));
    }
}

impl PartialEq for ExecutorHandle {
    /// Handles compare equal when they refer to the same executor.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ExecutorHandle {}

impl fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// InlineExecutor
// ---------------------------------------------------------------------------

/// Runs every job on the calling thread, immediately.
///
/// Useful for tests and for code that wants continuation side effects to be
/// observable as soon as the producer finishes.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn post(&self, job: Job) {
        job();
    }
}

// ---------------------------------------------------------------------------
// NewThreadExecutor
// ---------------------------------------------------------------------------

/// Spawns one detached OS thread per job.
///
/// Heavyweight but isolation-friendly: a job that blocks forever only wastes
/// its own thread. Completion is reported through the job's own state, so
/// the thread handle is intentionally dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewThreadExecutor;

impl Executor for NewThreadExecutor {
    fn post(&self, job: Job) {
        let _ = std::thread::Builder::new()
            .name("vesper-task".to_string())
            .spawn(job);
    }
}

// ---------------------------------------------------------------------------
// Default executor
// ---------------------------------------------------------------------------

/// The process-wide pool backing [`default_executor`].
static DEFAULT_POOL: Lazy<ExecutorHandle> = Lazy::new(|| ExecutorHandle::new(ThreadPool::new(0)));

/// The global work-stealing pool used when no executor is given.
///
/// Created on first use with one worker per available CPU; lives for the
/// remainder of the process.
pub fn default_executor() -> ExecutorHandle {
    DEFAULT_POOL.clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn inline_executor_runs_before_post_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = ExecutorHandle::new(InlineExecutor);
        let c = Arc::clone(&counter);
        handle.post(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn defer_falls_back_to_post() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = ExecutorHandle::new(InlineExecutor);
        let c = Arc::clone(&counter);
        handle.defer(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn handle_equality_is_identity() {
        let a = ExecutorHandle::new(InlineExecutor);
        let b = a.clone();
        let c = ExecutorHandle::new(InlineExecutor);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn default_executor_is_a_singleton() {
        assert_eq!(default_executor(), default_executor());
    }

    #[test]
    fn new_thread_executor_runs_jobs() {
        use std::time::{Duration, Instant};

        let counter = Arc::new(AtomicUsize::new(0));
        let handle = ExecutorHandle::new(NewThreadExecutor);
        for _ in 0..4 {
            let c = Arc::clone(&counter);
            handle.post(move || {
                c.fetch_add(1, Ordering::Release);
            });
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::Acquire) < 4 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(counter.load(Ordering::Acquire), 4);
    }
}
