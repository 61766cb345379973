//! M:N work-stealing thread pool, the engine's reference executor.
//!
//! The pool maintains a set of OS worker threads, each with a local
//! work-stealing deque. Posted jobs enter via a global injection queue and
//! are distributed to workers. Deferred jobs land in a second, low-priority
//! injection queue that is drained only when a worker finds no eager work.
//!
//! # Work-stealing algorithm
//!
//! Each worker thread runs a loop with the following priority:
//! 1. Pop from the local FIFO deque (cheapest — no contention).
//! 2. Steal a batch from the global injection queue into the local deque.
//! 3. Steal from a random peer worker.
//! 4. Pop one job from the deferred queue.
//! 5. Park briefly (1 ms) to avoid busy-spinning, then retry.
//!
//! Jobs run inside the panic boundary: a panicking job is dropped without
//! taking the worker thread down.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_deque::{Injector, Steal, Stealer, Worker};

use crate::error::catch_task;
use crate::executor::{Executor, Job};

// ---------------------------------------------------------------------------
// Shared pool state
// ---------------------------------------------------------------------------

/// Queues and flags shared by every worker thread.
struct PoolState {
    /// Global injection queue — posted jobs land here.
    eager: Injector<Job>,
    /// Low-priority queue — deferred jobs land here.
    deferred: Injector<Job>,
    /// Signal used to request graceful shutdown.
    shutdown: AtomicBool,
    /// Number of jobs that have finished across all workers.
    executed: AtomicUsize,
}

// ---------------------------------------------------------------------------
// ThreadPool
// ---------------------------------------------------------------------------

/// A work-stealing pool of OS threads implementing [`Executor`].
pub struct ThreadPool {
    state: Arc<PoolState>,
    join_handles: Vec<thread::JoinHandle<()>>,
    worker_count: usize,
}

impl ThreadPool {
    /// Create a pool with `num_workers` OS threads.
    ///
    /// Passing `0` defaults to the number of available CPUs.
    pub fn new(num_workers: usize) -> Self {
        let num_workers = if num_workers == 0 {
            num_cpus::get().max(1)
        } else {
            num_workers
        };

        let state = Arc::new(PoolState {
            eager: Injector::new(),
            deferred: Injector::new(),
            shutdown: AtomicBool::new(false),
            executed: AtomicUsize::new(0),
        });

        // Phase 1: create all worker deques and collect stealers.
        let mut locals: Vec<Worker<Job>> = Vec::with_capacity(num_workers);
        let mut stealers: Vec<Stealer<Job>> = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let w = Worker::new_fifo();
            stealers.push(w.stealer());
            locals.push(w);
        }
        let stealers = Arc::new(stealers);

        // Phase 2: spawn OS threads.
        let mut join_handles = Vec::with_capacity(num_workers);
        for (idx, local) in locals.into_iter().enumerate() {
            let state = Arc::clone(&state);
            let peers = Arc::clone(&stealers);
            let jh = thread::Builder::new()
                .name(format!("vesper-worker-{}", idx))
                .spawn(move || Self::worker_loop(idx, local, state, peers))
                .expect("failed to spawn worker thread");
            join_handles.push(jh);
        }

        Self {
            state,
            join_handles,
            worker_count: num_workers,
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of jobs completed so far.
    pub fn executed_count(&self) -> usize {
        self.state.executed.load(Ordering::Acquire)
    }

    /// Block until at least `expected` jobs have completed or `timeout`
    /// elapses. Returns the executed count at the time the wait ended.
    pub fn wait_for_executed(&self, expected: usize, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        loop {
            let current = self.executed_count();
            if current >= expected || Instant::now() >= deadline {
                return current;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Request a graceful shutdown and wait for all workers to exit.
    ///
    /// Jobs still queued when a worker notices the signal are abandoned.
    pub fn shutdown(&mut self) {
        self.state.shutdown.store(true, Ordering::Release);
        for jh in self.join_handles.drain(..) {
            let _ = jh.join();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.state.shutdown.load(Ordering::Acquire)
    }

    // -- internal worker loop ---------------------------------------------

    /// Simple deterministic pseudo-random number generator (xorshift32).
    ///
    /// Each worker has its own state so there is no contention.
    fn xorshift32(state: &mut u32) -> u32 {
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        *state = x;
        x
    }

    /// Run one job inside the panic boundary and count it.
    fn run_job(state: &PoolState, job: Job) {
        let _ = catch_task(|| {
            job();
            Ok(())
        });
        state.executed.fetch_add(1, Ordering::Release);
    }

    /// The main loop executed by each worker thread.
    fn worker_loop(
        idx: usize,
        local: Worker<Job>,
        state: Arc<PoolState>,
        peers: Arc<Vec<Stealer<Job>>>,
    ) {
        // Seed the per-worker PRNG. Avoid zero (xorshift32 fixpoint).
        let mut rng_state: u32 = (idx as u32).wrapping_mul(2654435761).max(1);

        loop {
            if state.shutdown.load(Ordering::Acquire) {
                return;
            }

            // 1. Try the local deque.
            if let Some(job) = local.pop() {
                Self::run_job(&state, job);
                continue;
            }

            // 2. Try the global queue (steal a batch into local).
            match state.eager.steal_batch_and_pop(&local) {
                Steal::Success(job) => {
                    Self::run_job(&state, job);
                    continue;
                }
                Steal::Retry => {
                    thread::yield_now();
                    continue;
                }
                Steal::Empty => {}
            }

            // 3. Try stealing from a random peer.
            let num_peers = peers.len();
            if num_peers > 1 {
                let start = Self::xorshift32(&mut rng_state) as usize % num_peers;
                let mut stolen = false;
                for offset in 0..num_peers {
                    let peer_idx = (start + offset) % num_peers;
                    if peer_idx == idx {
                        continue;
                    }
                    if let Steal::Success(job) = peers[peer_idx].steal_batch_and_pop(&local) {
                        Self::run_job(&state, job);
                        stolen = true;
                        break;
                    }
                }
                if stolen {
                    continue;
                }
            }

            // 4. No eager work anywhere — deferred jobs may now run.
            if let Steal::Success(job) = state.deferred.steal() {
                Self::run_job(&state, job);
                continue;
            }

            // 5. Nothing to do — brief park to avoid busy-spinning.
            thread::park_timeout(Duration::from_millis(1));
        }
    }
}

impl Executor for ThreadPool {
    fn post(&self, job: Job) {
        self.state.eager.push(job);
        // Workers park for at most 1 ms, so no explicit unpark is required.
    }

    fn defer(&self, job: Job) {
        self.state.deferred.push(job);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if !self.is_shutdown() {
            self.shutdown();
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("worker_count", &self.worker_count)
            .field("executed_count", &self.executed_count())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
