//! Conjunctions: a lazy proxy future over a set of child futures.
//!
//! [`when_all`] accepts a heterogeneous tuple or a homogeneous `Vec`;
//! closures among the inputs are launched on the default executor first.
//! The proxy's value is the sequence of child futures itself, which is what
//! lets a continuation unwrap them again (`F(f0, f1)`, `F(v0, v1)`, …).
//!
//! The conjunction operator `&` builds the same proxies and *flattens*:
//! `a & b & c` is one conjunction with three children, never a nested pair.
//! (`&&` is not overloadable in Rust, so the bitwise operator stands in for
//! the source notation.)

use std::ops::BitAnd;
use std::time::{Duration, Instant};

use crate::error::{FutureError, FutureResult};
use crate::executor::default_executor;
use crate::future::Future;
use crate::launch::{make_error_future, schedule};
use crate::operation_state::WaitStatus;
use crate::sequence::{FutureLike, FutureSequence, IntoAwaitable, IntoFutureSequence};
use crate::unwrap::Continuation;

// ---------------------------------------------------------------------------
// when_all
// ---------------------------------------------------------------------------

/// Build a conjunction over `input`.
///
/// The empty conjunction `when_all(())` is ready immediately with an empty
/// tuple.
pub fn when_all<C, M>(input: C) -> WhenAll<C::Sequence>
where
    C: IntoFutureSequence<M>,
{
    WhenAll::from_sequence(input.into_future_sequence())
}

/// Build a conjunction from any iterator of homogeneous awaitables.
pub fn when_all_from_iter<I, M>(
    inputs: I,
) -> WhenAll<Vec<<I::Item as IntoAwaitable<M>>::Awaitable>>
where
    I: IntoIterator,
    I::Item: IntoAwaitable<M>,
{
    WhenAll::from_sequence(
        inputs
            .into_iter()
            .map(IntoAwaitable::into_awaitable)
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// WhenAll
// ---------------------------------------------------------------------------

/// A proxy future that is ready when every child is ready.
///
/// The proxy is lazy: constructing it schedules nothing. Its value — the
/// sequence of children — is produced by [`get`](WhenAll::get) or through a
/// continuation.
pub struct WhenAll<S: FutureSequence> {
    children: Option<S>,
}

impl<S: FutureSequence> WhenAll<S> {
    pub(crate) fn from_sequence(children: S) -> Self {
        Self {
            children: Some(children),
        }
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.as_ref().map_or(0, FutureSequence::len)
    }

    /// True for the empty conjunction.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every child is valid.
    pub fn valid(&self) -> bool {
        self.children
            .as_ref()
            .is_some_and(FutureSequence::each_valid)
    }

    /// Whether every child is settled.
    pub fn is_ready(&self) -> bool {
        self.children.as_ref().is_some_and(FutureSequence::all_ready)
    }

    /// Block until every child is settled.
    pub fn wait(&mut self) -> FutureResult<()> {
        self.children
            .as_mut()
            .ok_or(FutureError::Uninitialized)?
            .wait_each();
        Ok(())
    }

    /// Block until every child is settled or `timeout` elapses.
    ///
    /// Children are awaited in order against the same deadline, so the
    /// elapsed time is shared rather than multiplied.
    pub fn wait_timeout(&mut self, timeout: Duration) -> FutureResult<WaitStatus> {
        self.wait_deadline(Instant::now() + timeout)
    }

    /// Block until every child is settled or `deadline` passes.
    pub fn wait_deadline(&mut self, deadline: Instant) -> FutureResult<WaitStatus> {
        Ok(self
            .children
            .as_mut()
            .ok_or(FutureError::Uninitialized)?
            .wait_each_deadline(deadline))
    }

    /// Wait for every child, then move the sequence out.
    pub fn get(mut self) -> FutureResult<S> {
        self.wait()?;
        self.release()
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

    /// Materialize the proxy as an always-deferred future whose value is the
    /// sequence of children.
    pub fn into_future(mut self) -> Future<S> {
        let Some(children) = self.children.take() else {
            return make_error_future(FutureError::Uninitialized);
        };
        schedule(&default_executor(), move || {
            let mut children = children;
            children.wait_each();
            children
        })
    }

    /// Attach a continuation to the conjunction's value.
    pub fn then<C, M>(self, continuation: C) -> FutureResult<Future<C::Output>>
    where
        C: Continuation<S, M>,
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
        C: Continuation<S, M>,
    {
        self.into_future().then_on(executor, continuation)
    }
}

impl<S: FutureSequence> std::fmt::Debug for WhenAll<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhenAll")
            .field("len", &self.len())
            .field("valid", &self.valid())
            .field("is_ready", &self.is_ready())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Conjunction operator
// ---------------------------------------------------------------------------

impl<A, B> BitAnd<Future<B>> for Future<A>
where
    A: Send + 'static,
    B: Send + 'static,
{
    type Output = WhenAll<(Future<A>, Future<B>)>;

    fn bitand(self, rhs: Future<B>) -> Self::Output {
        WhenAll::from_sequence((self, rhs))
    }
}

/// Flattening for `conjunction & future` and `future & conjunction`.
macro_rules! impl_bitand_flatten {
    ($( $T:ident . $idx:tt ),+) => {
        impl<$($T: FutureLike,)+ B: Send + 'static> BitAnd<Future<B>> for WhenAll<($($T,)+)> {
            type Output = WhenAll<($($T,)+ Future<B>,)>;

            fn bitand(self, rhs: Future<B>) -> Self::Output {
                let children = self
                    .release()
                    .expect("conjunction operand has been released");
                WhenAll::from_sequence(($(children.$idx,)+ rhs,))
            }
        }

        impl<$($T: FutureLike,)+ B: Send + 'static> BitAnd<WhenAll<($($T,)+)>> for Future<B> {
            type Output = WhenAll<(Future<B>, $($T,)+)>;

            fn bitand(self, rhs: WhenAll<($($T,)+)>) -> Self::Output {
                let children = rhs
                    .release()
                    .expect("conjunction operand has been released");
                WhenAll::from_sequence((self, $(children.$idx,)+))
            }
        }
    };
}

impl_bitand_flatten!(T0.0);
impl_bitand_flatten!(T0.0, T1.1);
impl_bitand_flatten!(T0.0, T1.1, T2.2);
impl_bitand_flatten!(T0.0, T1.1, T2.2, T3.3);

/// Flattening for `conjunction & conjunction`.
macro_rules! impl_bitand_join {
    ( ($( $A:ident . $ai:tt ),+) , ($( $B:ident . $bi:tt ),+) ) => {
        impl<$($A: FutureLike,)+ $($B: FutureLike,)+> BitAnd<WhenAll<($($B,)+)>>
            for WhenAll<($($A,)+)>
        {
            type Output = WhenAll<($($A,)+ $($B,)+)>;

            fn bitand(self, rhs: WhenAll<($($B,)+)>) -> Self::Output {
                let lhs = self
                    .release()
                    .expect("conjunction operand has been released");
                let rhs = rhs
                    .release()
                    .expect("conjunction operand has been released");
                WhenAll::from_sequence(($(lhs.$ai,)+ $(rhs.$bi,)+))
            }
        }
    };
}

impl_bitand_join!((A0.0), (B0.0));
impl_bitand_join!((A0.0), (B0.0, B1.1));
impl_bitand_join!((A0.0), (B0.0, B1.1, B2.2));
impl_bitand_join!((A0.0), (B0.0, B1.1, B2.2, B3.3));
impl_bitand_join!((A0.0, A1.1), (B0.0));
impl_bitand_join!((A0.0, A1.1), (B0.0, B1.1));
impl_bitand_join!((A0.0, A1.1), (B0.0, B1.1, B2.2));
impl_bitand_join!((A0.0, A1.1, A2.2), (B0.0));
impl_bitand_join!((A0.0, A1.1, A2.2), (B0.0, B1.1));
impl_bitand_join!((A0.0, A1.1, A2.2, A3.3), (B0.0));

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::{launch, make_ready_future};
    use std::time::Duration;

    #[test]
    fn conjunction_is_ready_when_every_child_is() {
        let executor = default_executor();
        let mut all = when_all((
            launch(&executor, || 1),
            launch(&executor, || {
                std::thread::sleep(Duration::from_millis(20));
                2
            }),
        ));
        all.wait().unwrap();
        assert!(all.is_ready());
        let (a, b) = all.get().unwrap();
        assert_eq!(a.get(), Ok(1));
        assert_eq!(b.get(), Ok(2));
    }

    #[test]
    fn empty_conjunction_is_always_ready() {
        let all = when_all(());
        assert!(all.valid());
        assert!(all.is_ready());
        assert_eq!(all.len(), 0);
        all.get().unwrap();
    }

    #[test]
    fn conjunction_from_an_iterator_of_closures() {
        let sum: i32 = when_all_from_iter((1..=4).map(|i| move || i))
            .get()
            .unwrap()
            .into_iter()
            .map(|f| f.get().unwrap())
            .sum();
        assert_eq!(sum, 10);
    }

    #[test]
    fn conjunction_over_a_vec() {
        let executor = default_executor();
        let children: Vec<_> = (0..4).map(|i| launch(&executor, move || i)).collect();
        let futures = when_all(children).get().unwrap();
        let values: Vec<i32> = futures.into_iter().map(|f| f.get().unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    #[test]
    fn closures_are_launched_as_children() {
        let all = when_all((|| 2, || 3));
        let (a, b) = all.get().unwrap();
        assert_eq!(a.get().unwrap() + b.get().unwrap(), 5);
    }

    #[test]
    fn timed_wait_reports_timeout_on_slow_children() {
        let executor = default_executor();
        let mut all = when_all((launch(&executor, || {
            std::thread::sleep(Duration::from_millis(200));
            1
        }),));
        let status = all.wait_timeout(Duration::from_millis(20)).unwrap();
        assert_eq!(status, WaitStatus::Timeout);
        // Drain before drop.
        all.wait().unwrap();
    }

    #[test]
    fn get_moves_the_children_out() {
        let all = when_all((make_ready_future(7),));
        let (only,) = all.get().unwrap();
        assert_eq!(only.get(), Ok(7));
    }

    #[test]
    fn release_skips_waiting() {
        let executor = default_executor();
        let all = when_all((launch(&executor, || {
            std::thread::sleep(Duration::from_millis(10));
            1
        }),));
        let (child,) = all.release().unwrap();
        // The child may or may not be ready here; get() waits either way.
        assert_eq!(child.get(), Ok(1));
    }

    #[test]
    fn request_stop_reaches_stoppable_children() {
        let executor = default_executor();
        let all = when_all((
            launch(&executor, |token: crate::stop::StopToken| {
                while !token.stop_requested() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                1
            }),
            launch(&executor, || 2),
        ));
        assert!(all.request_stop());
        let (a, b) = all.get().unwrap();
        assert_eq!(a.get(), Ok(1));
        assert_eq!(b.get(), Ok(2));
    }

    #[test]
    fn valid_requires_every_child_valid() {
        let invalid: Future<i32> = Future::empty();
        let all = when_all((make_ready_future(1), invalid));
        assert!(!all.valid());
    }

    // -- operator ----------------------------------------------------------

    #[test]
    fn conjunction_operator_flattens_left_chain() {
        let a = make_ready_future(1);
        let b = make_ready_future(2);
        let c = make_ready_future(3);
        let all = a & b & c;
        assert_eq!(all.len(), 3);
        let (x, y, z) = all.get().unwrap();
        assert_eq!(
            x.get().unwrap() + y.get().unwrap() + z.get().unwrap(),
            6
        );
    }

    #[test]
    fn conjunction_operator_flattens_joined_conjunctions() {
        let left = make_ready_future(1) & make_ready_future(2);
        let right = make_ready_future(3) & make_ready_future(4);
        let all = left & right;
        assert_eq!(all.len(), 4);
        let (a, b, c, d) = all.get().unwrap();
        let sum =
            a.get().unwrap() + b.get().unwrap() + c.get().unwrap() + d.get().unwrap();
        assert_eq!(sum, 10);
    }

    #[test]
    fn conjunction_operator_prepends_futures() {
        let pair = make_ready_future(2) & make_ready_future(3);
        let all = make_ready_future(1) & pair;
        assert_eq!(all.len(), 3);
        let (a, _, _) = all.release().unwrap();
        assert_eq!(a.get(), Ok(1));
    }

    // -- continuation ------------------------------------------------------

    #[test]
    fn conjunction_continuation_unwraps_values() {
        let executor = default_executor();
        let sum = when_all((launch(&executor, || 2), launch(&executor, || 3)))
            .then(|a: i32, b: i32| a + b)
            .unwrap();
        assert_eq!(sum.get(), Ok(5));
    }

    #[test]
    fn conjunction_continuation_can_take_the_futures() {
        let executor = default_executor();
        let sum = when_all((launch(&executor, || 2), launch(&executor, || 3)))
            .then(|a: Future<i32>, b: Future<i32>| a.get().unwrap() + b.get().unwrap())
            .unwrap();
        assert_eq!(sum.get(), Ok(5));
    }

    #[test]
    fn when_all_of_one_is_a_one_tuple() {
        let x = make_ready_future(11);
        let (only,) = when_all((x,)).get().unwrap();
        assert_eq!(only.get(), Ok(11));
    }
}
