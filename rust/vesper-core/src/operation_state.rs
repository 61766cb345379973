//! The operation state: status, value slot, waiters, and optional
//! executor / continuation / stop sub-objects.
//!
//! A state moves `Initial → Waiting` when the first observer arrives and
//! `Initial | Waiting → Ready` when the producer finishes; `Ready` is
//! terminal. The transition to `Ready` is published with release ordering
//! while the slot mutex is held, so any observer that sees `Ready` also sees
//! the settled slot.
//!
//! Deferred states additionally carry their bound task. The first `wait`
//! (or external-waiter registration) performs the one-shot hand-off of that
//! task to the bound executor; [`apply`](OperationState::apply) is the single
//! place where user code runs, always inside the panic boundary.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::continuations::ContinuationSource;
use crate::error::{catch_task, FutureError, FutureResult};
use crate::executor::ExecutorHandle;
use crate::slot::Slot;
use crate::stop::{StopSource, StopToken};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

const INITIAL: u8 = 0;
const WAITING: u8 = 1;
const READY: u8 = 2;

/// Outcome of a timed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The state became ready within the allotted time.
    Ready,
    /// The deadline passed first.
    Timeout,
}

// ---------------------------------------------------------------------------
// ReadySignal
// ---------------------------------------------------------------------------

/// A condition an external observer can park on while watching one or more
/// operation states.
///
/// Producers notify under the signal's own mutex, so an observer that checks
/// its predicate while holding the lock and then waits can never miss a
/// wakeup.
pub struct ReadySignal {
    epoch: Mutex<u64>,
    cond: Condvar,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    pub fn new() -> Self {
        Self {
            epoch: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    /// Wake every thread blocked on this signal.
    pub fn notify(&self) {
        let mut epoch = self.epoch.lock().unwrap();
        *epoch += 1;
        self.cond.notify_all();
    }

    /// Block until `ready()` returns true.
    pub(crate) fn block_until<P: FnMut() -> bool>(&self, mut ready: P) {
        let mut guard = self.epoch.lock().unwrap();
        while !ready() {
            guard = self.cond.wait(guard).unwrap();
        }
    }

    /// Block until `ready()` returns true or `deadline` passes.
    pub(crate) fn block_until_deadline<P: FnMut() -> bool>(
        &self,
        mut ready: P,
        deadline: Instant,
    ) -> WaitStatus {
        let mut guard = self.epoch.lock().unwrap();
        while !ready() {
            let now = Instant::now();
            if now >= deadline {
                return WaitStatus::Timeout;
            }
            let (next, _) = self.cond.wait_timeout(guard, deadline - now).unwrap();
            guard = next;
        }
        WaitStatus::Ready
    }
}

impl fmt::Debug for ReadySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadySignal")
            .field("epoch", &*self.epoch.lock().unwrap())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which optional sub-objects a state carries.
pub(crate) struct StateConfig {
    pub executor: Option<ExecutorHandle>,
    pub continuable: bool,
    pub stop: Option<StopSource>,
    pub deferred: bool,
}

impl StateConfig {
    /// An eager, continuable state bound to `executor`.
    pub(crate) fn eager(executor: ExecutorHandle) -> Self {
        Self {
            executor: Some(executor),
            continuable: true,
            stop: None,
            deferred: false,
        }
    }

    /// A deferred state whose task is handed to `executor` on first wait.
    pub(crate) fn deferred(executor: ExecutorHandle) -> Self {
        Self {
            executor: Some(executor),
            continuable: false,
            stop: None,
            deferred: true,
        }
    }

    /// A producer-driven state with no executor (promises, packaged tasks).
    pub(crate) fn plain() -> Self {
        Self {
            executor: None,
            continuable: true,
            stop: None,
            deferred: false,
        }
    }

    /// Attach a stop source.
    pub(crate) fn stoppable(mut self, source: StopSource) -> Self {
        self.stop = Some(source);
        self
    }
}

// ---------------------------------------------------------------------------
// OperationState
// ---------------------------------------------------------------------------

/// The task a deferred or continuation state will eventually run.
pub(crate) type StateTask<T> =
    Box<dyn FnOnce(Option<StopToken>) -> FutureResult<T> + Send + 'static>;

struct WaiterRegistry {
    next_id: u64,
    signals: Vec<(u64, Arc<ReadySignal>)>,
}

/// Shared state between one producer and any number of observers.
pub(crate) struct OperationState<T> {
    status: AtomicU8,
    slot: Mutex<Slot<T>>,
    ready_cond: Condvar,
    waiters: Mutex<WaiterRegistry>,
    executor: Option<ExecutorHandle>,
    continuations: Option<ContinuationSource>,
    stop: Option<StopSource>,
    task: Mutex<Option<StateTask<T>>>,
    deferred: bool,
}

impl<T: Send + 'static> OperationState<T> {
    pub(crate) fn new(config: StateConfig) -> Self {
        Self {
            status: AtomicU8::new(INITIAL),
            slot: Mutex::new(Slot::Pending),
            ready_cond: Condvar::new(),
            waiters: Mutex::new(WaiterRegistry {
                next_id: 0,
                signals: Vec::new(),
            }),
            executor: config.executor,
            continuations: config.continuable.then(ContinuationSource::new),
            stop: config.stop,
            task: Mutex::new(None),
            deferred: config.deferred,
        }
    }

    // -- status ------------------------------------------------------------

    pub(crate) fn is_ready(&self) -> bool {
        self.status.load(Ordering::Acquire) == READY
    }

    /// CAS `Initial → Waiting`; returns the prior status.
    fn transition_to_waiting(&self) -> u8 {
        match self
            .status
            .compare_exchange(INITIAL, WAITING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(prev) => prev,
            Err(prev) => prev,
        }
    }

    // -- producer side -----------------------------------------------------

    /// Settle the state with the task's outcome, wake every waiter, and
    /// release continuations.
    pub(crate) fn fulfil(&self, outcome: FutureResult<T>) -> FutureResult<()> {
        {
            let mut slot = self.slot.lock().unwrap();
            slot.settle(outcome)?;
            self.status.store(READY, Ordering::Release);
            self.ready_cond.notify_all();
        }
        self.notify_external_waiters();
        if let Some(cs) = &self.continuations {
            cs.request_run();
        }
        Ok(())
    }

    pub(crate) fn set_value(&self, value: T) -> FutureResult<()> {
        self.fulfil(Ok(value))
    }

    pub(crate) fn set_error(&self, error: FutureError) -> FutureResult<()> {
        self.fulfil(Err(error))
    }

    /// Store a broken-promise failure unless the state is already ready.
    pub(crate) fn signal_producer_destroyed(&self) {
        if !self.is_ready() {
            let _ = self.set_error(FutureError::BrokenPromise);
        }
    }

    fn notify_external_waiters(&self) {
        let signals: Vec<Arc<ReadySignal>> = {
            let registry = self.waiters.lock().unwrap();
            registry.signals.iter().map(|(_, s)| Arc::clone(s)).collect()
        };
        for signal in signals {
            signal.notify();
        }
    }

    // -- the bound task ----------------------------------------------------

    pub(crate) fn install_task(&self, task: StateTask<T>) {
        *self.task.lock().unwrap() = Some(task);
    }

    pub(crate) fn has_task(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }

    /// Take the installed task, invoke it through the panic boundary with
    /// this state's stop token, and route the outcome into the slot.
    ///
    /// Runs at most once; later calls are no-ops.
    pub(crate) fn apply(&self) {
        let task = self.task.lock().unwrap().take();
        if let Some(task) = task {
            let token = self.stop.as_ref().map(|s| s.token());
            let outcome = catch_task(|| task(token));
            let _ = self.fulfil(outcome);
        }
    }

    /// One-shot hand-off of a deferred task to the bound executor.
    ///
    /// Associated function: posting needs to hand the executor an owning
    /// reference to `this`.
    pub(crate) fn post_deferred(this: &Arc<Self>) {
        if !this.deferred || !this.has_task() {
            return;
        }
        match &this.executor {
            Some(executor) => {
                let state = Arc::clone(this);
                executor.post(move || state.apply());
            }
            // No executor bound: run on the waiting thread.
            None => this.apply(),
        }
    }

    // -- consumer side -----------------------------------------------------

    /// Block until the state is ready.
    pub(crate) fn wait(this: &Arc<Self>) {
        let prev = this.transition_to_waiting();
        if prev == READY {
            return;
        }
        if prev == INITIAL {
            Self::post_deferred(this);
        }
        let mut slot = this.slot.lock().unwrap();
        while !this.is_ready() {
            slot = this.ready_cond.wait(slot).unwrap();
        }
    }

    /// Block until the state is ready or `deadline` passes.
    pub(crate) fn wait_deadline(this: &Arc<Self>, deadline: Instant) -> WaitStatus {
        let prev = this.transition_to_waiting();
        if prev == READY {
            return WaitStatus::Ready;
        }
        if prev == INITIAL {
            Self::post_deferred(this);
        }
        let mut slot = this.slot.lock().unwrap();
        while !this.is_ready() {
            let now = Instant::now();
            if now >= deadline {
                return WaitStatus::Timeout;
            }
            let (next, _) = this.ready_cond.wait_timeout(slot, deadline - now).unwrap();
            slot = next;
        }
        WaitStatus::Ready
    }

    pub(crate) fn wait_timeout(this: &Arc<Self>, timeout: Duration) -> WaitStatus {
        Self::wait_deadline(this, Instant::now() + timeout)
    }

    /// Move the settled value out (unique consumers).
    pub(crate) fn take_value(&self) -> FutureResult<T> {
        self.slot.lock().unwrap().take()
    }

    /// The stored failure, if the producer failed.
    pub(crate) fn error(&self) -> Option<FutureError> {
        self.slot.lock().unwrap().error()
    }

    // -- external waiters --------------------------------------------------

    /// Register an external signal to be notified when this state becomes
    /// ready. Returns a handle usable with
    /// [`unnotify_when_ready`](OperationState::unnotify_when_ready).
    ///
    /// Registration counts as observation: it triggers the deferred hand-off
    /// exactly like a first `wait`.
    pub(crate) fn notify_when_ready(this: &Arc<Self>, signal: Arc<ReadySignal>) -> u64 {
        let prev = this.transition_to_waiting();
        if prev == INITIAL {
            Self::post_deferred(this);
        }
        let id = {
            let mut registry = this.waiters.lock().unwrap();
            registry.next_id += 1;
            let id = registry.next_id;
            registry.signals.push((id, Arc::clone(&signal)));
            id
        };
        // The state may have become ready between registration and here;
        // fire the signal so the observer re-checks.
        if this.is_ready() {
            signal.notify();
        }
        id
    }

    pub(crate) fn unnotify_when_ready(&self, id: u64) {
        self.waiters.lock().unwrap().signals.retain(|(i, _)| *i != id);
    }

    // -- accessors ---------------------------------------------------------

    pub(crate) fn stop_source(&self) -> Option<&StopSource> {
        self.stop.as_ref()
    }

    pub(crate) fn stop_token(&self) -> Option<StopToken> {
        self.stop.as_ref().map(|s| s.token())
    }

    pub(crate) fn continuations(&self) -> Option<&ContinuationSource> {
        self.continuations.as_ref()
    }

    pub(crate) fn executor(&self) -> Option<&ExecutorHandle> {
        self.executor.as_ref()
    }
}

impl<T: Clone + Send + 'static> OperationState<T> {
    /// Read the settled value by clone (shared consumers).
    pub(crate) fn clone_value(&self) -> FutureResult<T> {
        self.slot.lock().unwrap().clone_value()
    }
}

impl<T> fmt::Debug for OperationState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status.load(Ordering::Acquire) {
            INITIAL => "initial",
            WAITING => "waiting",
            _ => "ready",
        };
        f.debug_struct("OperationState")
            .field("status", &status)
            .field("deferred", &self.deferred)
            .field("stoppable", &self.stop.is_some())
            .field("continuable", &self.continuations.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
