//! Vesper core: composable blocking futures.
//!
//! A family of future values representing the eventual result of a task,
//! together with the machinery that ties them to executors, cooperative
//! cancellation, and algebraic composition:
//!
//! - [`launch`] / [`schedule`] start eager and deferred tasks on any
//!   [`Executor`]; [`make_ready_future`] builds settled futures with no
//!   shared state at all.
//! - [`Future::then`] attaches continuations whose arguments are bound by
//!   the unwrap dispatcher in [`unwrap`] — pass the future whole, hand over
//!   the value, reach through nested futures, explode tuples, or pick the
//!   winner of a disjunction.
//! - [`when_all`] and [`when_any`] compose sets of futures into lazy
//!   conjunction / disjunction proxies; `&` and `|` build the same proxies
//!   with flattening.
//! - [`StopSource`] / [`StopToken`] carry cooperative cancellation, and
//!   dropping a unique stoppable future requests a stop on its way out.
//!
//! The engine consumes executors through the two-method [`Executor`] trait
//! and ships a work-stealing [`ThreadPool`] plus an [`InlineExecutor`] as
//! reference implementations.

pub mod continuations;
pub mod error;
pub mod executor;
pub mod future;
pub mod launch;
pub mod pool;
pub mod promise;
pub mod sequence;
pub mod stop;
pub mod unwrap;
pub mod when_all;
pub mod when_any;

mod future_state;
mod operation_state;
mod slot;
mod then;

pub use continuations::{ContinuationPhase, ContinuationSource};
pub use error::{FutureError, FutureResult};
pub use executor::{
    default_executor, Executor, ExecutorHandle, InlineExecutor, Job, NewThreadExecutor,
};
pub use future::{Future, FutureOptions, SharedFuture};
pub use future_state::WaiterHandle;
pub use launch::{launch, launch_default, make_error_future, make_ready_future, schedule,
    LaunchSignature};
pub use operation_state::{ReadySignal, WaitStatus};
pub use pool::ThreadPool;
pub use promise::{PackagedTask, Promise};
pub use sequence::{FutureLike, FutureSequence, IntoAwaitable, IntoFutureSequence};
pub use stop::{StopSource, StopToken};
pub use unwrap::{shape, Continuation, ElementMarker, ElementUnwrap, NestableMarker, UnwrapShape};
pub use when_all::{when_all, when_all_from_iter, WhenAll};
pub use when_any::{when_any, when_any_from_iter, WhenAny, WhenAnyResult};
