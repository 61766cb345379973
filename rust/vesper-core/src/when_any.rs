//! Disjunctions: a proxy future that is ready when any child is.
//!
//! [`when_any`] accepts the same inputs as `when_all`. Its value is a
//! [`WhenAnyResult`]: the index of the first child observed ready plus the
//! whole sequence of children, which is what the disjunction continuation
//! shapes unwrap (`F(index, tasks)`, `F(winner)`, `F(winner_value)`, …).
//!
//! Waiting is signal-based rather than polling: the proxy registers one
//! shared [`ReadySignal`] with every child (promoting inline states and
//! kicking deferred tasks as a side effect) and parks on it until some child
//! reports ready.
//!
//! The disjunction operator `|` flattens exactly like the conjunction's `&`.

use std::ops::BitOr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{FutureError, FutureResult};
use crate::executor::default_executor;
use crate::future::Future;
use crate::launch::{make_error_future, schedule};
use crate::operation_state::{ReadySignal, WaitStatus};
use crate::sequence::{FutureLike, FutureSequence, IntoAwaitable, IntoFutureSequence};
use crate::unwrap::Continuation;

// ---------------------------------------------------------------------------
// WhenAnyResult
// ---------------------------------------------------------------------------

/// The value of a disjunction: the winning index and every child.
#[derive(Debug)]
pub struct WhenAnyResult<S> {
    /// Position of the first child observed ready, or
    /// [`NOT_FOUND`](WhenAnyResult::NOT_FOUND) for the empty disjunction.
    pub index: usize,
    /// The full sequence of children, winner included.
    pub tasks: S,
}

impl<S> WhenAnyResult<S> {
    /// The index reported by an empty disjunction: a well-defined "none",
    /// not an error.
    pub const NOT_FOUND: usize = usize::MAX;
}

// ---------------------------------------------------------------------------
// when_any
// ---------------------------------------------------------------------------

/// Build a disjunction over `input`.
///
/// The empty disjunction is ready immediately and reports
/// [`WhenAnyResult::NOT_FOUND`].
pub fn when_any<C, M>(input: C) -> WhenAny<C::Sequence>
where
    C: IntoFutureSequence<M>,
{
    WhenAny::from_sequence(input.into_future_sequence())
}

/// Build a disjunction from any iterator of homogeneous awaitables.
pub fn when_any_from_iter<I, M>(
    inputs: I,
) -> WhenAny<Vec<<I::Item as IntoAwaitable<M>>::Awaitable>>
where
    I: IntoIterator,
    I::Item: IntoAwaitable<M>,
{
    WhenAny::from_sequence(
        inputs
            .into_iter()
            .map(IntoAwaitable::into_awaitable)
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// WhenAny
// ---------------------------------------------------------------------------

/// A proxy future that is ready when at least one child is ready.
///
/// The winning index is recorded at the first observation and never changes
/// afterwards, even if other children become ready later.
pub struct WhenAny<S: FutureSequence> {
    children: Option<S>,
    winner: Option<usize>,
}

impl<S: FutureSequence> WhenAny<S> {
    pub(crate) fn from_sequence(children: S) -> Self {
        Self {
            children: Some(children),
            winner: None,
        }
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.as_ref().map_or(0, FutureSequence::len)
    }

    /// True for the empty disjunction.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every child is valid.
    pub fn valid(&self) -> bool {
        self.children
            .as_ref()
            .is_some_and(FutureSequence::each_valid)
    }

    /// Whether the disjunction is ready: some child is ready, or there are
    /// no children at all.
    pub fn is_ready(&self) -> bool {
        self.is_empty()
            || self.winner.is_some()
            || self
                .children
                .as_ref()
                .is_some_and(|c| c.ready_index().is_some())
    }

    /// Record the winning index at first observation.
    fn record_winner(&mut self) -> Option<usize> {
        if self.winner.is_none() {
            self.winner = self
                .children
                .as_ref()
                .and_then(FutureSequence::ready_index);
        }
        self.winner
    }

    /// Block until some child is settled.
    pub fn wait(&mut self) -> FutureResult<()> {
        if self.children.is_none() {
            return Err(FutureError::Uninitialized);
        }
        if self.is_empty() || self.record_winner().is_some() {
            return Ok(());
        }

        let signal = Arc::new(ReadySignal::new());
        let waiters = self
            .children
            .as_mut()
            .expect("children checked above")
            .subscribe_each(&signal);
        {
            let children = self.children.as_ref().expect("children checked above");
            signal.block_until(|| children.ready_index().is_some());
        }
        for waiter in waiters {
            waiter.cancel();
        }
        self.record_winner();
        Ok(())
    }

    /// Block until some child is settled or `timeout` elapses.
    pub fn wait_timeout(&mut self, timeout: Duration) -> FutureResult<WaitStatus> {
        self.wait_deadline(Instant::now() + timeout)
    }

    /// Block until some child is settled or `deadline` passes.
    pub fn wait_deadline(&mut self, deadline: Instant) -> FutureResult<WaitStatus> {
        if self.children.is_none() {
            return Err(FutureError::Uninitialized);
        }
        if self.is_empty() || self.record_winner().is_some() {
            return Ok(WaitStatus::Ready);
        }

        let signal = Arc::new(ReadySignal::new());
        let waiters = self
            .children
            .as_mut()
            .expect("children checked above")
            .subscribe_each(&signal);
        let status = {
            let children = self.children.as_ref().expect("children checked above");
            signal.block_until_deadline(|| children.ready_index().is_some(), deadline)
        };
        for waiter in waiters {
            waiter.cancel();
        }
        self.record_winner();
        Ok(status)
    }

    /// Wait for a winner, then move the result out.
    pub fn get(mut self) -> FutureResult<WhenAnyResult<S>> {
        self.wait()?;
        let index = if self.is_empty() {
            WhenAnyResult::<S>::NOT_FOUND
        } else {
            self.winner.expect("wait recorded a winner")
        };
        let tasks = self
            .children
            .take()
            .ok_or(FutureError::Uninitialized)?;
        Ok(WhenAnyResult { index, tasks })
    }

    /// Move the sequence out without waiting.
    pub fn release(mut self) -> FutureResult<S> {
        self.children.take().ok_or(FutureError::Uninitialized)
    }

    /// Forward a stop request to every child; true if any accepted.
    pub fn request_stop(&self) -> bool {
        self.children
            .as_ref()
            .is_some_and(FutureSequence::request_stop_each)
    }

    /// Materialize the proxy as an always-deferred future whose value is
    /// the disjunction result.
    pub fn into_future(mut self) -> Future<WhenAnyResult<S>> {
        let Some(children) = self.children.take() else {
            return make_error_future(FutureError::Uninitialized);
        };
        let winner = self.winner;
        schedule(&default_executor(), move || {
            let mut proxy = WhenAny {
                children: Some(children),
                winner,
            };
            let _ = proxy.wait();
            let index = if proxy.is_empty() {
                WhenAnyResult::<S>::NOT_FOUND
            } else {
                proxy.winner.expect("wait recorded a winner")
            };
            let tasks = proxy.children.take().expect("proxy owns its children");
            WhenAnyResult { index, tasks }
        })
    }

    /// Attach a continuation to the disjunction's result.
    pub fn then<C, M>(self, continuation: C) -> FutureResult<Future<C::Output>>
    where
        C: Continuation<WhenAnyResult<S>, M>,
    {
        self.into_future().then(continuation)
    }

    /// Attach a continuation to run on `executor`.
    pub fn then_on<C, M>(
        self,
        executor: &crate::executor::ExecutorHandle,
        continuation: C,
    ) -> FutureResult<Future<C::Output>>
    where
        C: Continuation<WhenAnyResult<S>, M>,
    {
        self.into_future().then_on(executor, continuation)
    }
}

impl<S: FutureSequence> std::fmt::Debug for WhenAny<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhenAny")
            .field("len", &self.len())
            .field("valid", &self.valid())
            .field("is_ready", &self.is_ready())
            .field("winner", &self.winner)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Disjunction operator
// ---------------------------------------------------------------------------

impl<A, B> BitOr<Future<B>> for Future<A>
where
    A: Send + 'static,
    B: Send + 'static,
{
    type Output = WhenAny<(Future<A>, Future<B>)>;

    fn bitor(self, rhs: Future<B>) -> Self::Output {
        WhenAny::from_sequence((self, rhs))
    }
}

/// Flattening for `disjunction | future` and `future | disjunction`.
macro_rules! impl_bitor_flatten {
    ($( $T:ident . $idx:tt ),+) => {
        impl<$($T: FutureLike,)+ B: Send + 'static> BitOr<Future<B>> for WhenAny<($($T,)+)> {
            type Output = WhenAny<($($T,)+ Future<B>,)>;

            fn bitor(self, rhs: Future<B>) -> Self::Output {
                let children = self
                    .release()
                    .expect("disjunction operand has been released");
                WhenAny::from_sequence(($(children.$idx,)+ rhs,))
            }
        }

        impl<$($T: FutureLike,)+ B: Send + 'static> BitOr<WhenAny<($($T,)+)>> for Future<B> {
            type Output = WhenAny<(Future<B>, $($T,)+)>;

            fn bitor(self, rhs: WhenAny<($($T,)+)>) -> Self::Output {
                let children = rhs
                    .release()
                    .expect("disjunction operand has been released");
                WhenAny::from_sequence((self, $(children.$idx,)+))
            }
        }
    };
}

impl_bitor_flatten!(T0.0);
impl_bitor_flatten!(T0.0, T1.1);
impl_bitor_flatten!(T0.0, T1.1, T2.2);
impl_bitor_flatten!(T0.0, T1.1, T2.2, T3.3);

/// Flattening for `disjunction | disjunction`.
macro_rules! impl_bitor_join {
    ( ($( $A:ident . $ai:tt ),+) , ($( $B:ident . $bi:tt ),+) ) => {
        impl<$($A: FutureLike,)+ $($B: FutureLike,)+> BitOr<WhenAny<($($B,)+)>>
            for WhenAny<($($A,)+)>
        {
            type Output = WhenAny<($($A,)+ $($B,)+)>;

            fn bitor(self, rhs: WhenAny<($($B,)+)>) -> Self::Output {
                let lhs = self
                    .release()
                    .expect("disjunction operand has been released");
                let rhs = rhs
                    .release()
                    .expect("disjunction operand has been released");
                WhenAny::from_sequence(($(lhs.$ai,)+ $(rhs.$bi,)+))
            }
        }
    };
}

impl_bitor_join!((A0.0), (B0.0));
impl_bitor_join!((A0.0), (B0.0, B1.1));
impl_bitor_join!((A0.0), (B0.0, B1.1, B2.2));
impl_bitor_join!((A0.0), (B0.0, B1.1, B2.2, B3.3));
impl_bitor_join!((A0.0, A1.1), (B0.0));
impl_bitor_join!((A0.0, A1.1), (B0.0, B1.1));
impl_bitor_join!((A0.0, A1.1), (B0.0, B1.1, B2.2));
impl_bitor_join!((A0.0, A1.1, A2.2), (B0.0));
impl_bitor_join!((A0.0, A1.1, A2.2), (B0.0, B1.1));
impl_bitor_join!((A0.0, A1.1, A2.2, A3.3), (B0.0));

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
