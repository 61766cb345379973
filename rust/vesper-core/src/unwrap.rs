//! The unwrap-and-continue dispatcher.
//!
//! Given a parent future with value type `P` and a continuation closure, the
//! dispatcher decides how the closure's arguments are bound from the
//! parent's value: passed the whole future, handed the value, handed the
//! value of a nested future, given the exploded elements of a tuple, and so
//! on through the disjunction-result shapes.
//!
//! Each binding strategy is a marker type in [`shape`], and
//! [`Continuation<P, M>`] has exactly one impl per marker. The marker `M` is
//! inferred from the closure's signature at the `then` call site: a closure
//! implements exactly one `FnOnce` signature, so at most one impl is
//! satisfiable and inference selects it. A closure that genuinely fits no
//! shape fails to compile at the call site, and the rare ambiguous
//! combination is resolved by annotating the closure's argument types.
//!
//! Every impl reports which [`UnwrapShape`] it stands for; tests assert the
//! selection and `then` records it for diagnostics.
//!
//! Shapes whose closure takes a [`StopToken`] as its first argument have
//! token twins (`Token*` markers). Selecting a token twin makes the derived
//! continuation future stoppable; the token handed to the closure belongs to
//! the continuation's own state.
//!
//! Unwrapping runs inside the continuation task: if the parent settled with
//! a failure, that failure propagates into the continuation's state instead
//! of invoking the closure — except for the whole-future shapes, where the
//! closure receives the parent handle and deals with the outcome itself.

use crate::error::{FutureError, FutureResult};
use crate::future::Future;
use crate::stop::StopToken;
use crate::when_any::WhenAnyResult;

// ---------------------------------------------------------------------------
// UnwrapShape
// ---------------------------------------------------------------------------

/// Which argument-binding strategy a continuation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwrapShape {
    /// The parent future is passed whole.
    NoUnwrap,
    /// The closure takes no arguments; the parent is drained first.
    NoInput,
    /// The closure receives the parent's value.
    RvalueUnwrap,
    /// The parent's value is itself a future; the closure receives the inner
    /// value.
    DoubleUnwrap,
    /// Futures nested more than two levels; the closure receives the
    /// innermost value.
    DeepestUnwrap,
    /// The parent's tuple value is exploded into individual arguments.
    TupleExplode,
    /// A tuple of futures, each awaited one level.
    FuturesTupleDouble,
    /// A tuple of futures, each awaited to its innermost value.
    FuturesTupleDeepest,
    /// A sequence of futures, awaited one level into a `Vec` of values.
    FuturesRangeDouble,
    /// A sequence of futures, awaited to their innermost values.
    FuturesRangeDeepest,
    /// A disjunction result split into `(index, tasks)`.
    WhenAnySplit,
    /// A disjunction result with the task tuple exploded after the index.
    WhenAnyExplode,
    /// The winning future of a same-typed disjunction tuple.
    WhenAnyTupleElement,
    /// The winning future of a disjunction sequence.
    WhenAnyRangeElement,
    /// The winning value (one level) of a same-typed disjunction tuple.
    WhenAnyTupleDouble,
    /// The winning innermost value of a same-typed disjunction tuple.
    WhenAnyTupleDeepest,
    /// The winning value (one level) of a disjunction sequence.
    WhenAnyRangeDouble,
    /// The winning innermost value of a disjunction sequence.
    WhenAnyRangeDeepest,
}

// ---------------------------------------------------------------------------
// Shape markers
// ---------------------------------------------------------------------------

/// Marker types naming the binding strategies.
///
/// These never hold data; they exist so each [`Continuation`] impl is keyed
/// by a distinct type and inference can pick between them.
pub mod shape {
    use std::marker::PhantomData;

    /// `F(Future<P>)` — parent passed whole.
    pub struct Whole;
    /// `F()` — parent drained, value discarded.
    pub struct Drained;
    /// `F(v)` — parent's value.
    pub struct Value;
    /// `F` applied one future level deeper, recursively.
    pub struct Nested<M>(PhantomData<M>);
    /// `F(v0, v1, …)` — tuple elements as arguments.
    pub struct Exploded;
    /// `F(value_of(v0), …)` — tuple of futures, each unwrapped per `M`.
    pub struct EachValue<M>(PhantomData<M>);
    /// `F(Vec<value_of(elem)>)` — sequence of futures, unwrapped per `M`.
    pub struct Collected<M>(PhantomData<M>);
    /// `F(index, tasks)` — disjunction result split.
    pub struct AnySplit;
    /// `F(index, f0, f1, …)` — disjunction tasks exploded.
    pub struct AnyExploded;
    /// `F(winner)` — winning future of a same-typed disjunction.
    pub struct AnyWinner;
    /// `F(value_of(winner))` — winning value, unwrapped per `M`.
    pub struct AnyWinnerValue<M>(PhantomData<M>);

    /// Token twins: as above with a `StopToken` prefix argument.
    pub struct TokenWhole;
    pub struct TokenDrained;
    pub struct TokenValue;
    pub struct TokenExploded;
    pub struct TokenEachValue<M>(PhantomData<M>);
    pub struct TokenCollected<M>(PhantomData<M>);
    pub struct TokenAnySplit;
    pub struct TokenAnyExploded;
    pub struct TokenAnyWinner;
    pub struct TokenAnyWinnerValue<M>(PhantomData<M>);

    /// Element depth for tuple / sequence unwrapping: one future level.
    pub struct Shallow;
    /// Element depth: recurse through another future level.
    pub struct Deep<M>(PhantomData<M>);
}

/// Classifies the markers that may sit at the bottom of a [`shape::Nested`]
/// chain, and how deep the chain is.
pub trait NestableMarker {
    /// True when the marker itself already crosses a future level.
    const DEEP: bool;
}

impl NestableMarker for shape::Value {
    const DEEP: bool = false;
}

impl NestableMarker for shape::TokenValue {
    const DEEP: bool = false;
}

impl<M: NestableMarker> NestableMarker for shape::Nested<M> {
    const DEEP: bool = true;
}

/// Classifies element-depth markers.
pub trait ElementMarker {
    /// True when the element is unwrapped through more than one level.
    const DEEP: bool;
}

impl ElementMarker for shape::Shallow {
    const DEEP: bool = false;
}

impl<M: ElementMarker> ElementMarker for shape::Deep<M> {
    const DEEP: bool = true;
}

// ---------------------------------------------------------------------------
// Element unwrapping
// ---------------------------------------------------------------------------

/// Awaits a future element down to the value depth named by `M`.
pub trait ElementUnwrap<M>: Send + 'static {
    /// The value produced at depth `M`.
    type Value: Send + 'static;

    /// Await and unwrap, propagating any stored failure.
    fn unwrap_value(self) -> FutureResult<Self::Value>;
}

impl<T: Send + 'static> ElementUnwrap<shape::Shallow> for Future<T> {
    type Value = T;

    fn unwrap_value(self) -> FutureResult<T> {
        self.get()
    }
}

impl<U, M> ElementUnwrap<shape::Deep<M>> for Future<U>
where
    U: ElementUnwrap<M> + Send + 'static,
{
    type Value = <U as ElementUnwrap<M>>::Value;

    fn unwrap_value(self) -> FutureResult<Self::Value> {
        self.get()?.unwrap_value()
    }
}

// ---------------------------------------------------------------------------
// Continuation
// ---------------------------------------------------------------------------

/// A callable that can continue from a parent future with value type `P`,
/// bound according to marker `M`.
pub trait Continuation<P: Send + 'static, M>: Send + 'static {
    /// The continuation's result type.
    type Output: Send + 'static;

    /// The binding strategy this impl stands for.
    const SHAPE: UnwrapShape;

    /// Whether the closure consumes a stop token prefix.
    const NEEDS_TOKEN: bool;

    /// Await and unwrap the parent as dictated by `M`, then invoke the
    /// closure.
    fn continue_with(self, parent: Future<P>, token: Option<StopToken>)
        -> FutureResult<Self::Output>;
}

/// The token a token-twin impl was promised by the `then` wiring.
fn expect_token(token: Option<StopToken>) -> FutureResult<StopToken> {
    token.ok_or(FutureError::InvalidState(
        "token continuation on a state without a stop source",
    ))
}

// -- whole / drained / value ------------------------------------------------

impl<P, F, R> Continuation<P, shape::Whole> for F
where
    P: Send + 'static,
    R: Send + 'static,
    F: FnOnce(Future<P>) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = UnwrapShape::NoUnwrap;
    const NEEDS_TOKEN: bool = false;

    fn continue_with(self, parent: Future<P>, _token: Option<StopToken>) -> FutureResult<R> {
        Ok(self(parent))
    }
}

impl<P, F, R> Continuation<P, shape::TokenWhole> for F
where
    P: Send + 'static,
    R: Send + 'static,
    F: FnOnce(StopToken, Future<P>) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = UnwrapShape::NoUnwrap;
    const NEEDS_TOKEN: bool = true;

    fn continue_with(self, parent: Future<P>, token: Option<StopToken>) -> FutureResult<R> {
        Ok(self(expect_token(token)?, parent))
    }
}

impl<P, F, R> Continuation<P, shape::Drained> for F
where
    P: Send + 'static,
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = UnwrapShape::NoInput;
    const NEEDS_TOKEN: bool = false;

    fn continue_with(self, parent: Future<P>, _token: Option<StopToken>) -> FutureResult<R> {
        parent.get()?;
        Ok(self())
    }
}

impl<P, F, R> Continuation<P, shape::TokenDrained> for F
where
    P: Send + 'static,
    R: Send + 'static,
    F: FnOnce(StopToken) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = UnwrapShape::NoInput;
    const NEEDS_TOKEN: bool = true;

    fn continue_with(self, parent: Future<P>, token: Option<StopToken>) -> FutureResult<R> {
        parent.get()?;
        Ok(self(expect_token(token)?))
    }
}

impl<P, F, R> Continuation<P, shape::Value> for F
where
    P: Send + 'static,
    R: Send + 'static,
    F: FnOnce(P) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = UnwrapShape::RvalueUnwrap;
    const NEEDS_TOKEN: bool = false;

    fn continue_with(self, parent: Future<P>, _token: Option<StopToken>) -> FutureResult<R> {
        Ok(self(parent.get()?))
    }
}

impl<P, F, R> Continuation<P, shape::TokenValue> for F
where
    P: Send + 'static,
    R: Send + 'static,
    F: FnOnce(StopToken, P) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = UnwrapShape::RvalueUnwrap;
    const NEEDS_TOKEN: bool = true;

    fn continue_with(self, parent: Future<P>, token: Option<StopToken>) -> FutureResult<R> {
        let value = parent.get()?;
        Ok(self(expect_token(token)?, value))
    }
}

// -- nested futures ----------------------------------------------------------

impl<U, M, F> Continuation<Future<U>, shape::Nested<M>> for F
where
    U: Send + 'static,
    M: NestableMarker,
    F: Continuation<U, M>,
{
    type Output = <F as Continuation<U, M>>::Output;
    const SHAPE: UnwrapShape = if <M as NestableMarker>::DEEP {
        UnwrapShape::DeepestUnwrap
    } else {
        UnwrapShape::DoubleUnwrap
    };
    const NEEDS_TOKEN: bool = <F as Continuation<U, M>>::NEEDS_TOKEN;

    fn continue_with(
        self,
        parent: Future<Future<U>>,
        token: Option<StopToken>,
    ) -> FutureResult<Self::Output> {
        let inner = parent.get()?;
        <F as Continuation<U, M>>::continue_with(self, inner, token)
    }
}

// -- tuple explode -----------------------------------------------------------

macro_rules! impl_tuple_explode {
    ($( $T:ident . $idx:tt ),+) => {
        impl<F, R, $($T,)+> Continuation<($($T,)+), shape::Exploded> for F
        where
            R: Send + 'static,
            $($T: Send + 'static,)+
            F: FnOnce($($T,)+) -> R + Send + 'static,
        {
            type Output = R;
            const SHAPE: UnwrapShape = UnwrapShape::TupleExplode;
            const NEEDS_TOKEN: bool = false;

            fn continue_with(
                self,
                parent: Future<($($T,)+)>,
                _token: Option<StopToken>,
            ) -> FutureResult<R> {
                let value = parent.get()?;
                Ok(self($(value.$idx,)+))
            }
        }

        impl<F, R, $($T,)+> Continuation<($($T,)+), shape::TokenExploded> for F
        where
            R: Send + 'static,
            $($T: Send + 'static,)+
            F: FnOnce(StopToken, $($T,)+) -> R + Send + 'static,
        {
            type Output = R;
            const SHAPE: UnwrapShape = UnwrapShape::TupleExplode;
            const NEEDS_TOKEN: bool = true;

            fn continue_with(
                self,
                parent: Future<($($T,)+)>,
                token: Option<StopToken>,
            ) -> FutureResult<R> {
                let value = parent.get()?;
                Ok(self(expect_token(token)?, $(value.$idx,)+))
            }
        }
    };
}

impl_tuple_explode!(T0.0);
impl_tuple_explode!(T0.0, T1.1);
impl_tuple_explode!(T0.0, T1.1, T2.2);
impl_tuple_explode!(T0.0, T1.1, T2.2, T3.3);
impl_tuple_explode!(T0.0, T1.1, T2.2, T3.3, T4.4);

// -- tuple of futures, per-element unwrap ------------------------------------

macro_rules! impl_tuple_unwrap {
    ($( $T:ident : $M:ident . $idx:tt ),+) => {
        impl<F, R, $($T, $M,)+> Continuation<($($T,)+), shape::EachValue<($($M,)+)>> for F
        where
            R: Send + 'static,
            $($T: ElementUnwrap<$M>,)+
            $($M: ElementMarker,)+
            F: FnOnce($(<$T as ElementUnwrap<$M>>::Value,)+) -> R + Send + 'static,
        {
            type Output = R;
            const SHAPE: UnwrapShape = if $( <$M as ElementMarker>::DEEP )||+ {
                UnwrapShape::FuturesTupleDeepest
            } else {
                UnwrapShape::FuturesTupleDouble
            };
            const NEEDS_TOKEN: bool = false;

            fn continue_with(
                self,
                parent: Future<($($T,)+)>,
                _token: Option<StopToken>,
            ) -> FutureResult<R> {
                let value = parent.get()?;
                Ok(self($(value.$idx.unwrap_value()?,)+))
            }
        }

        impl<F, R, $($T, $M,)+> Continuation<($($T,)+), shape::TokenEachValue<($($M,)+)>> for F
        where
            R: Send + 'static,
            $($T: ElementUnwrap<$M>,)+
            $($M: ElementMarker,)+
            F: FnOnce(StopToken, $(<$T as ElementUnwrap<$M>>::Value,)+) -> R + Send + 'static,
        {
            type Output = R;
            const SHAPE: UnwrapShape = if $( <$M as ElementMarker>::DEEP )||+ {
                UnwrapShape::FuturesTupleDeepest
            } else {
                UnwrapShape::FuturesTupleDouble
            };
            const NEEDS_TOKEN: bool = true;

            fn continue_with(
                self,
                parent: Future<($($T,)+)>,
                token: Option<StopToken>,
            ) -> FutureResult<R> {
                let token = expect_token(token)?;
                let value = parent.get()?;
                Ok(self(token, $(value.$idx.unwrap_value()?,)+))
            }
        }
    };
}

impl_tuple_unwrap!(T0: M0.0);
impl_tuple_unwrap!(T0: M0.0, T1: M1.1);
impl_tuple_unwrap!(T0: M0.0, T1: M1.1, T2: M2.2);
impl_tuple_unwrap!(T0: M0.0, T1: M1.1, T2: M2.2, T3: M3.3);
impl_tuple_unwrap!(T0: M0.0, T1: M1.1, T2: M2.2, T3: M3.3, T4: M4.4);

// -- sequence of futures ------------------------------------------------------

impl<F, R, E, M> Continuation<Vec<E>, shape::Collected<M>> for F
where
    R: Send + 'static,
    E: ElementUnwrap<M>,
    M: ElementMarker,
    F: FnOnce(Vec<<E as ElementUnwrap<M>>::Value>) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = if <M as ElementMarker>::DEEP {
        UnwrapShape::FuturesRangeDeepest
    } else {
        UnwrapShape::FuturesRangeDouble
    };
    const NEEDS_TOKEN: bool = false;

    fn continue_with(self, parent: Future<Vec<E>>, _token: Option<StopToken>) -> FutureResult<R> {
        let elements = parent.get()?;
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(element.unwrap_value()?);
        }
        Ok(self(values))
    }
}

impl<F, R, E, M> Continuation<Vec<E>, shape::TokenCollected<M>> for F
where
    R: Send + 'static,
    E: ElementUnwrap<M>,
    M: ElementMarker,
    F: FnOnce(StopToken, Vec<<E as ElementUnwrap<M>>::Value>) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = if <M as ElementMarker>::DEEP {
        UnwrapShape::FuturesRangeDeepest
    } else {
        UnwrapShape::FuturesRangeDouble
    };
    const NEEDS_TOKEN: bool = true;

    fn continue_with(self, parent: Future<Vec<E>>, token: Option<StopToken>) -> FutureResult<R> {
        let token = expect_token(token)?;
        let elements = parent.get()?;
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(element.unwrap_value()?);
        }
        Ok(self(token, values))
    }
}

// -- disjunction results ------------------------------------------------------

impl<F, R, S> Continuation<WhenAnyResult<S>, shape::AnySplit> for F
where
    R: Send + 'static,
    S: Send + 'static,
    F: FnOnce(usize, S) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = UnwrapShape::WhenAnySplit;
    const NEEDS_TOKEN: bool = false;

    fn continue_with(
        self,
        parent: Future<WhenAnyResult<S>>,
        _token: Option<StopToken>,
    ) -> FutureResult<R> {
        let result = parent.get()?;
        Ok(self(result.index, result.tasks))
    }
}

impl<F, R, S> Continuation<WhenAnyResult<S>, shape::TokenAnySplit> for F
where
    R: Send + 'static,
    S: Send + 'static,
    F: FnOnce(StopToken, usize, S) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = UnwrapShape::WhenAnySplit;
    const NEEDS_TOKEN: bool = true;

    fn continue_with(
        self,
        parent: Future<WhenAnyResult<S>>,
        token: Option<StopToken>,
    ) -> FutureResult<R> {
        let result = parent.get()?;
        Ok(self(expect_token(token)?, result.index, result.tasks))
    }
}

macro_rules! impl_any_explode {
    ($( $T:ident . $idx:tt ),+) => {
        impl<F, R, $($T,)+> Continuation<WhenAnyResult<($($T,)+)>, shape::AnyExploded> for F
        where
            R: Send + 'static,
            $($T: Send + 'static,)+
            F: FnOnce(usize, $($T,)+) -> R + Send + 'static,
        {
            type Output = R;
            const SHAPE: UnwrapShape = UnwrapShape::WhenAnyExplode;
            const NEEDS_TOKEN: bool = false;

            fn continue_with(
                self,
                parent: Future<WhenAnyResult<($($T,)+)>>,
                _token: Option<StopToken>,
            ) -> FutureResult<R> {
                let result = parent.get()?;
                let tasks = result.tasks;
                Ok(self(result.index, $(tasks.$idx,)+))
            }
        }

        impl<F, R, $($T,)+> Continuation<WhenAnyResult<($($T,)+)>, shape::TokenAnyExploded> for F
        where
            R: Send + 'static,
            $($T: Send + 'static,)+
            F: FnOnce(StopToken, usize, $($T,)+) -> R + Send + 'static,
        {
            type Output = R;
            const SHAPE: UnwrapShape = UnwrapShape::WhenAnyExplode;
            const NEEDS_TOKEN: bool = true;

            fn continue_with(
                self,
                parent: Future<WhenAnyResult<($($T,)+)>>,
                token: Option<StopToken>,
            ) -> FutureResult<R> {
                let result = parent.get()?;
                let tasks = result.tasks;
                Ok(self(expect_token(token)?, result.index, $(tasks.$idx,)+))
            }
        }
    };
}

impl_any_explode!(T0.0);
impl_any_explode!(T0.0, T1.1);
impl_any_explode!(T0.0, T1.1, T2.2);
impl_any_explode!(T0.0, T1.1, T2.2, T3.3);
impl_any_explode!(T0.0, T1.1, T2.2, T3.3, T4.4);

/// Extract the winning future of a same-typed tuple by runtime index.
macro_rules! impl_any_winner_tuple {
    ($len:literal, $( $idx:tt ),+) => {
        impl<F, R, T> Continuation<WhenAnyResult<($(winner_elem!($idx, T),)+)>, shape::AnyWinner>
            for F
        where
            R: Send + 'static,
            T: Send + 'static,
            F: FnOnce(Future<T>) -> R + Send + 'static,
        {
            type Output = R;
            const SHAPE: UnwrapShape = UnwrapShape::WhenAnyTupleElement;
            const NEEDS_TOKEN: bool = false;

            fn continue_with(
                self,
                parent: Future<WhenAnyResult<($(winner_elem!($idx, T),)+)>>,
                _token: Option<StopToken>,
            ) -> FutureResult<R> {
                let result = parent.get()?;
                let tasks = result.tasks;
                let winner = match result.index {
                    $( $idx => tasks.$idx, )+
                    _ => return Err(FutureError::InvalidState("disjunction index out of range")),
                };
                Ok(self(winner))
            }
        }

        impl<F, R, T, M>
            Continuation<WhenAnyResult<($(winner_elem!($idx, T),)+)>, shape::AnyWinnerValue<M>>
            for F
        where
            R: Send + 'static,
            T: Send + 'static,
            M: ElementMarker,
            Future<T>: ElementUnwrap<M>,
            F: FnOnce(<Future<T> as ElementUnwrap<M>>::Value) -> R + Send + 'static,
        {
            type Output = R;
            const SHAPE: UnwrapShape = if <M as ElementMarker>::DEEP {
                UnwrapShape::WhenAnyTupleDeepest
            } else {
                UnwrapShape::WhenAnyTupleDouble
            };
            const NEEDS_TOKEN: bool = false;

            fn continue_with(
                self,
                parent: Future<WhenAnyResult<($(winner_elem!($idx, T),)+)>>,
                _token: Option<StopToken>,
            ) -> FutureResult<R> {
                let result = parent.get()?;
                let tasks = result.tasks;
                let winner = match result.index {
                    $( $idx => tasks.$idx, )+
                    _ => return Err(FutureError::InvalidState("disjunction index out of range")),
                };
                Ok(self(winner.unwrap_value()?))
            }
        }
    };
}

/// Expands to `Future<T>` for every tuple position.
macro_rules! winner_elem {
    ($idx:tt, $T:ident) => {
        Future<$T>
    };
}

impl_any_winner_tuple!(1, 0);
impl_any_winner_tuple!(2, 0, 1);
impl_any_winner_tuple!(3, 0, 1, 2);
impl_any_winner_tuple!(4, 0, 1, 2, 3);
impl_any_winner_tuple!(5, 0, 1, 2, 3, 4);

impl<F, R, T> Continuation<WhenAnyResult<Vec<Future<T>>>, shape::AnyWinner> for F
where
    R: Send + 'static,
    T: Send + 'static,
    F: FnOnce(Future<T>) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = UnwrapShape::WhenAnyRangeElement;
    const NEEDS_TOKEN: bool = false;

    fn continue_with(
        self,
        parent: Future<WhenAnyResult<Vec<Future<T>>>>,
        _token: Option<StopToken>,
    ) -> FutureResult<R> {
        let result = parent.get()?;
        let mut tasks = result.tasks;
        if result.index >= tasks.len() {
            return Err(FutureError::InvalidState("disjunction index out of range"));
        }
        let winner = tasks.remove(result.index);
        Ok(self(winner))
    }
}

impl<F, R, T, M> Continuation<WhenAnyResult<Vec<Future<T>>>, shape::AnyWinnerValue<M>> for F
where
    R: Send + 'static,
    T: Send + 'static,
    M: ElementMarker,
    Future<T>: ElementUnwrap<M>,
    F: FnOnce(<Future<T> as ElementUnwrap<M>>::Value) -> R + Send + 'static,
{
    type Output = R;
    const SHAPE: UnwrapShape = if <M as ElementMarker>::DEEP {
        UnwrapShape::WhenAnyRangeDeepest
    } else {
        UnwrapShape::WhenAnyRangeDouble
    };
    const NEEDS_TOKEN: bool = false;

    fn continue_with(
        self,
        parent: Future<WhenAnyResult<Vec<Future<T>>>>,
        _token: Option<StopToken>,
    ) -> FutureResult<R> {
        let result = parent.get()?;
        let mut tasks = result.tasks;
        if result.index >= tasks.len() {
            return Err(FutureError::InvalidState("disjunction index out of range"));
        }
        let winner = tasks.remove(result.index);
        Ok(self(winner.unwrap_value()?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
