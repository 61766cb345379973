//! Homogeneous and heterogeneous collections of futures.
//!
//! The conjunction and disjunction combinators observe many child futures at
//! once. [`FutureLike`] is the per-child surface they consume; a
//! [`FutureSequence`] lifts it over a tuple (heterogeneous, macro-generated
//! arities) or a `Vec` (homogeneous). [`IntoAwaitable`] adapts combinator
//! inputs: futures pass through, bare closures are launched on the default
//! executor first.

use std::sync::Arc;
use std::time::Instant;

use crate::future::{Future, SharedFuture};
use crate::future_state::WaiterHandle;
use crate::launch::launch_default;
use crate::operation_state::{ReadySignal, WaitStatus};

// ---------------------------------------------------------------------------
// FutureLike
// ---------------------------------------------------------------------------

/// The observation surface a combinator needs from one child future.
///
/// Implemented by the crate's future handles; the methods mirror the handle
/// API but never fail — an invalid or incapable child simply reports
/// `false` / does nothing, and sequence-level `each_valid` is the validity
/// check.
pub trait FutureLike: Send + 'static {
    /// Whether the child refers to a state.
    fn valid(&self) -> bool;

    /// Whether the child is settled.
    fn is_ready(&self) -> bool;

    /// Block until the child is settled.
    fn wait_ready(&mut self);

    /// Block until the child is settled or `deadline` passes.
    fn wait_deadline_ready(&mut self, deadline: Instant) -> WaitStatus;

    /// Forward a stop request; `false` when the child is not stoppable.
    fn request_stop_if_possible(&self) -> bool;

    /// Register `signal` to fire when the child settles. `None` when the
    /// child is already settled (the signal fires immediately).
    fn subscribe_ready(&mut self, signal: &Arc<ReadySignal>) -> Option<WaiterHandle>;
}

impl<T: Send + 'static> FutureLike for Future<T> {
    fn valid(&self) -> bool {
        Future::valid(self)
    }

    fn is_ready(&self) -> bool {
        Future::is_ready(self)
    }

    fn wait_ready(&mut self) {
        if self.valid() {
            self.state_mut().wait();
        }
    }

    fn wait_deadline_ready(&mut self, deadline: Instant) -> WaitStatus {
        if self.valid() {
            self.state_mut().wait_deadline(deadline)
        } else {
            WaitStatus::Ready
        }
    }

    fn request_stop_if_possible(&self) -> bool {
        self.request_stop().unwrap_or(false)
    }

    fn subscribe_ready(&mut self, signal: &Arc<ReadySignal>) -> Option<WaiterHandle> {
        self.state_mut().subscribe(signal).ok().flatten()
    }
}

impl<T: Send + 'static> FutureLike for SharedFuture<T> {
    fn valid(&self) -> bool {
        SharedFuture::valid(self)
    }

    fn is_ready(&self) -> bool {
        SharedFuture::is_ready(self)
    }

    fn wait_ready(&mut self) {
        let _ = self.wait();
    }

    fn wait_deadline_ready(&mut self, deadline: Instant) -> WaitStatus {
        self.wait_deadline(deadline).unwrap_or(WaitStatus::Ready)
    }

    fn request_stop_if_possible(&self) -> bool {
        self.request_stop().unwrap_or(false)
    }

    fn subscribe_ready(&mut self, signal: &Arc<ReadySignal>) -> Option<WaiterHandle> {
        self.state_mut().subscribe(signal).ok().flatten()
    }
}

// ---------------------------------------------------------------------------
// FutureSequence
// ---------------------------------------------------------------------------

/// A fixed set of child futures observed as one unit.
pub trait FutureSequence: Send + 'static {
    /// Number of children.
    fn len(&self) -> usize;

    /// True for the empty sequence.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every child is valid (vacuously true when empty).
    fn each_valid(&self) -> bool;

    /// Whether every child is settled (vacuously true when empty).
    fn all_ready(&self) -> bool;

    /// The position of some settled child, if any.
    fn ready_index(&self) -> Option<usize>;

    /// Block until every child is settled.
    fn wait_each(&mut self);

    /// Block until every child is settled or `deadline` passes.
    fn wait_each_deadline(&mut self, deadline: Instant) -> WaitStatus;

    /// Forward a stop request to every child; true if any accepted.
    fn request_stop_each(&self) -> bool;

    /// Register `signal` with every child.
    fn subscribe_each(&mut self, signal: &Arc<ReadySignal>) -> Vec<WaiterHandle>;
}

impl FutureSequence for () {
    fn len(&self) -> usize {
        0
    }

    fn each_valid(&self) -> bool {
        true
    }

    fn all_ready(&self) -> bool {
        true
    }

    fn ready_index(&self) -> Option<usize> {
        None
    }

    fn wait_each(&mut self) {}

    fn wait_each_deadline(&mut self, _deadline: Instant) -> WaitStatus {
        WaitStatus::Ready
    }

    fn request_stop_each(&self) -> bool {
        false
    }

    fn subscribe_each(&mut self, _signal: &Arc<ReadySignal>) -> Vec<WaiterHandle> {
        Vec::new()
    }
}

macro_rules! impl_future_sequence_for_tuple {
    ($len:expr; $( $T:ident . $idx:tt ),+) => {
        impl<$($T: FutureLike,)+> FutureSequence for ($($T,)+) {
            fn len(&self) -> usize {
                $len
            }

            fn each_valid(&self) -> bool {
                $( self.$idx.valid() )&&+
            }

            fn all_ready(&self) -> bool {
                $( self.$idx.is_ready() )&&+
            }

            fn ready_index(&self) -> Option<usize> {
                $(
                    if self.$idx.is_ready() {
                        return Some($idx);
                    }
                )+
                None
            }

            fn wait_each(&mut self) {
                $( self.$idx.wait_ready(); )+
            }

            fn wait_each_deadline(&mut self, deadline: Instant) -> WaitStatus {
                $(
                    if self.$idx.wait_deadline_ready(deadline) == WaitStatus::Timeout {
                        return WaitStatus::Timeout;
                    }
                )+
                WaitStatus::Ready
            }

            fn request_stop_each(&self) -> bool {
                let mut any = false;
                $( any |= self.$idx.request_stop_if_possible(); )+
                any
            }

            fn subscribe_each(&mut self, signal: &Arc<ReadySignal>) -> Vec<WaiterHandle> {
                let mut waiters = Vec::new();
                $(
                    if let Some(w) = self.$idx.subscribe_ready(signal) {
                        waiters.push(w);
                    }
                )+
                waiters
            }
        }
    };
}

impl_future_sequence_for_tuple!(1; T0.0);
impl_future_sequence_for_tuple!(2; T0.0, T1.1);
impl_future_sequence_for_tuple!(3; T0.0, T1.1, T2.2);
impl_future_sequence_for_tuple!(4; T0.0, T1.1, T2.2, T3.3);
impl_future_sequence_for_tuple!(5; T0.0, T1.1, T2.2, T3.3, T4.4);

impl<F: FutureLike> FutureSequence for Vec<F> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn each_valid(&self) -> bool {
        self.iter().all(FutureLike::valid)
    }

    fn all_ready(&self) -> bool {
        self.iter().all(FutureLike::is_ready)
    }

    fn ready_index(&self) -> Option<usize> {
        self.iter().position(FutureLike::is_ready)
    }

    fn wait_each(&mut self) {
        for child in self.iter_mut() {
            child.wait_ready();
        }
    }

    fn wait_each_deadline(&mut self, deadline: Instant) -> WaitStatus {
        for child in self.iter_mut() {
            if child.wait_deadline_ready(deadline) == WaitStatus::Timeout {
                return WaitStatus::Timeout;
            }
        }
        WaitStatus::Ready
    }

    fn request_stop_each(&self) -> bool {
        let mut any = false;
        for child in self {
            any |= child.request_stop_if_possible();
        }
        any
    }

    fn subscribe_each(&mut self, signal: &Arc<ReadySignal>) -> Vec<WaiterHandle> {
        self.iter_mut()
            .filter_map(|child| child.subscribe_ready(signal))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// IntoAwaitable
// ---------------------------------------------------------------------------

/// Markers distinguishing the [`IntoAwaitable`] impls.
pub mod awaitable {
    /// The input already is a future.
    pub struct AsIs;
    /// The input is a closure to launch first.
    pub struct Task;
}

/// Anything a combinator accepts as one child: a future as-is, or a closure
/// launched on the default executor.
pub trait IntoAwaitable<M> {
    /// The future the combinator will observe.
    type Awaitable: FutureLike;

    /// Convert, launching if needed.
    fn into_awaitable(self) -> Self::Awaitable;
}

impl<T: Send + 'static> IntoAwaitable<awaitable::AsIs> for Future<T> {
    type Awaitable = Future<T>;

    fn into_awaitable(self) -> Self::Awaitable {
        self
    }
}

impl<T: Send + 'static> IntoAwaitable<awaitable::AsIs> for SharedFuture<T> {
    type Awaitable = SharedFuture<T>;

    fn into_awaitable(self) -> Self::Awaitable {
        self
    }
}

impl<F, R> IntoAwaitable<awaitable::Task> for F
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    type Awaitable = Future<R>;

    fn into_awaitable(self) -> Self::Awaitable {
        launch_default(self)
    }
}

// ---------------------------------------------------------------------------
// IntoFutureSequence
// ---------------------------------------------------------------------------

/// Combinator input: a tuple of awaitables, a `Vec` of futures, or nothing.
pub trait IntoFutureSequence<M> {
    /// The sequence the combinator proxy will own.
    type Sequence: FutureSequence;

    /// Convert every input into a future and collect the sequence.
    fn into_future_sequence(self) -> Self::Sequence;
}

impl IntoFutureSequence<()> for () {
    type Sequence = ();

    fn into_future_sequence(self) -> Self::Sequence {}
}

macro_rules! impl_into_future_sequence {
    ($( $T:ident : $M:ident . $idx:tt ),+) => {
        impl<$($T, $M,)+> IntoFutureSequence<($($M,)+)> for ($($T,)+)
        where
            $($T: IntoAwaitable<$M>,)+
        {
            type Sequence = ($(<$T as IntoAwaitable<$M>>::Awaitable,)+);

            fn into_future_sequence(self) -> Self::Sequence {
                ($(self.$idx.into_awaitable(),)+)
            }
        }
    };
}

impl_into_future_sequence!(T0: M0.0);
impl_into_future_sequence!(T0: M0.0, T1: M1.1);
impl_into_future_sequence!(T0: M0.0, T1: M1.1, T2: M2.2);
impl_into_future_sequence!(T0: M0.0, T1: M1.1, T2: M2.2, T3: M3.3);
impl_into_future_sequence!(T0: M0.0, T1: M1.1, T2: M2.2, T3: M3.3, T4: M4.4);

/// Marker for the homogeneous `Vec` input.
pub struct AsRange;

impl<F: FutureLike> IntoFutureSequence<AsRange> for Vec<F> {
    type Sequence = Vec<F>;

    fn into_future_sequence(self) -> Self::Sequence {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::{launch, make_ready_future};
    use std::time::Duration;

    #[test]
    fn empty_sequence_is_trivially_ready() {
        let mut seq = ();
        assert_eq!(seq.len(), 0);
        assert!(seq.each_valid());
        assert!(seq.all_ready());
        assert_eq!(seq.ready_index(), None);
        assert_eq!(
            seq.wait_each_deadline(Instant::now()),
            WaitStatus::Ready
        );
    }

    #[test]
    fn tuple_sequence_tracks_children() {
        let mut seq = (make_ready_future(1), make_ready_future("x"));
        assert_eq!(seq.len(), 2);
        assert!(seq.each_valid());
        assert!(seq.all_ready());
        assert_eq!(seq.ready_index(), Some(0));
        seq.wait_each();
    }

    #[test]
    fn vec_sequence_tracks_children() {
        let executor = crate::executor::default_executor();
        let mut seq = vec![
            launch(&executor, || 1),
            launch(&executor, || 2),
            launch(&executor, || 3),
        ];
        seq.wait_each();
        assert!(seq.all_ready());
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn deadline_wait_times_out_on_a_slow_child() {
        let executor = crate::executor::default_executor();
        let mut seq = (
            make_ready_future(1),
            launch(&executor, || {
                std::thread::sleep(Duration::from_millis(200));
                2
            }),
        );
        let status = seq.wait_each_deadline(Instant::now() + Duration::from_millis(20));
        assert_eq!(status, WaitStatus::Timeout);
        // Let the slow child finish before the handles drop and join.
        seq.wait_each();
    }

    #[test]
    fn closures_become_futures() {
        let mut future = (|| 5).into_awaitable();
        future.wait_ready();
        assert_eq!(future.get(), Ok(5));
    }

    #[test]
    fn mixed_tuple_input_converts_each_element() {
        let input = (make_ready_future(1), || 2);
        let mut seq = input.into_future_sequence();
        seq.wait_each();
        assert!(seq.all_ready());
    }
}
