//! Ordered, run-once continuation lists.
//!
//! A [`ContinuationSource`] collects `(executor, callback)` pairs while it is
//! open. [`request_run`](ContinuationSource::request_run) closes the list
//! atomically and posts every callback, in registration order, on the
//! executor recorded with it. Callbacks registered after the close are posted
//! immediately; callbacks registered after a skip are dropped.

use std::fmt;
use std::sync::Mutex;

use crate::executor::{ExecutorHandle, Job};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Lifecycle of a continuation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationPhase {
    /// Accepting continuations.
    Open,
    /// Closed; registered continuations were posted.
    Ran,
    /// Closed; registered continuations were dropped.
    Skipped,
}

// ---------------------------------------------------------------------------
// ContinuationSource
// ---------------------------------------------------------------------------

/// One registered continuation.
struct Entry {
    executor: ExecutorHandle,
    callback: Job,
}

struct Inner {
    phase: ContinuationPhase,
    entries: Vec<Entry>,
}

/// The ordered list of continuations attached to an operation state.
pub struct ContinuationSource {
    inner: Mutex<Inner>,
}

impl ContinuationSource {
    /// Create an open, empty list.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: ContinuationPhase::Open,
                entries: Vec::new(),
            }),
        }
    }

    /// Register `callback` to be posted on `executor` once the list runs.
    ///
    /// If the list has already run, the callback is posted immediately; if it
    /// was skipped, the callback is dropped.
    pub fn emplace<F>(&self, executor: ExecutorHandle, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        match inner.phase {
            ContinuationPhase::Open => {
                inner.entries.push(Entry {
                    executor,
                    callback: Box::new(callback),
                });
            }
            ContinuationPhase::Ran => {
                // Post outside the lock: the executor may run the job inline.
                drop(inner);
                executor.post(callback);
            }
            ContinuationPhase::Skipped => {}
        }
    }

    /// Close the list and post every registered continuation, in order.
    ///
    /// Returns `true` for the caller that performed the transition; later
    /// calls are no-ops.
    pub fn request_run(&self) -> bool {
        let entries = {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase != ContinuationPhase::Open {
                return false;
            }
            inner.phase = ContinuationPhase::Ran;
            std::mem::take(&mut inner.entries)
        };
        for entry in entries {
            entry.executor.post(entry.callback);
        }
        true
    }

    /// Close the list and drop every registered continuation.
    ///
    /// Used for states that can never become ready. Returns `true` for the
    /// caller that performed the transition.
    pub fn request_skip(&self) -> bool {
        let dropped = {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase != ContinuationPhase::Open {
                return false;
            }
            inner.phase = ContinuationPhase::Skipped;
            std::mem::take(&mut inner.entries)
        };
        drop(dropped);
        true
    }

    /// Whether a `request_run` would still have an effect.
    pub fn run_possible(&self) -> bool {
        self.phase() == ContinuationPhase::Open
    }

    /// Current phase.
    pub fn phase(&self) -> ContinuationPhase {
        self.inner.lock().unwrap().phase
    }

    /// Number of continuations waiting to run.
    pub fn pending(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

impl Default for ContinuationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContinuationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("ContinuationSource")
            .field("phase", &inner.phase)
            .field("pending", &inner.entries.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
