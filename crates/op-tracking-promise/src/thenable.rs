//! Units of work and the thenable capability
//!
//! A unit of work is either already the thing to track, or a zero-argument
//! callable producing it. What gets produced is an [`Eventual`]: a plain value,
//! or something implementing [`Thenable`], the single continuation-registration
//! interface the tracker understands. Futures are adapted into thenables by
//! [`FutureThenable`].

use std::fmt;
use std::future::Future;

use tokio::runtime::Handle;

use crate::error::BoxError;

/// Continuation run when the asynchronous value fulfills
pub type OnFulfilled<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Continuation run when the asynchronous value rejects
pub type OnRejected<E> = Box<dyn FnOnce(E) + Send + 'static>;

/// An asynchronous value exposing one continuation-registration operation
///
/// Well-formed implementations call at most one of the two continuations,
/// at most once, now or later. Returning `Err` from `then` means the value
/// only looked asynchronous: the tracker treats that as a structural failure
/// and raises it out of `track`.
pub trait Thenable<T, E>: Send {
    /// Register the continuation pair
    fn then(
        self: Box<Self>,
        on_fulfilled: OnFulfilled<T>,
        on_rejected: OnRejected<E>,
    ) -> Result<(), BoxError>;
}

/// Adapter running a future on the ambient Tokio runtime
pub struct FutureThenable<F> {
    future: F,
}

impl<F> FutureThenable<F> {
    pub fn new(future: F) -> Self {
        Self { future }
    }
}

impl<F, T, E> Thenable<T, E> for FutureThenable<F>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    fn then(
        self: Box<Self>,
        on_fulfilled: OnFulfilled<T>,
        on_rejected: OnRejected<E>,
    ) -> Result<(), BoxError> {
        let handle = Handle::try_current()?;
        let future = self.future;
        handle.spawn(async move {
            match future.await {
                Ok(value) => on_fulfilled(value),
                Err(error) => on_rejected(error),
            }
        });
        Ok(())
    }
}

/// What evaluating a unit of work produces
pub enum Eventual<T, E> {
    /// Not asynchronous: settles the tracker immediately
    Ready(T),
    /// Asynchronous: settles the tracker through its continuations
    Pending(Box<dyn Thenable<T, E>>),
}

impl<T, E> Eventual<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Eventual::Pending(_))
    }
}

impl<T, E> Eventual<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Eventual::Pending(Box::new(FutureThenable::new(future)))
    }

    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Eventual::Pending(Box::new(thenable))
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Eventual<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eventual::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Eventual::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Callable form of a unit of work. `Err` is a synchronous raise.
pub type WorkFn<T, E> = Box<dyn FnOnce() -> Result<Eventual<T, E>, E> + Send + 'static>;

/// The unit of work handed to `track`
pub enum Work<T, E> {
    /// Already the unit of work
    Immediate(Eventual<T, E>),
    /// Invoked with no arguments when tracking starts
    Deferred(WorkFn<T, E>),
}

impl<T, E> Work<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Track an immediate, non-asynchronous value
    pub fn value(value: T) -> Self {
        Work::Immediate(Eventual::Ready(value))
    }

    /// Track an already-running asynchronous computation
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Work::Immediate(Eventual::future(future))
    }

    /// Track a custom asynchronous value
    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Work::Immediate(Eventual::thenable(thenable))
    }

    /// Track a callable that returns or raises synchronously
    pub fn call<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        Work::Deferred(Box::new(move || f().map(Eventual::Ready)))
    }

    /// Track a callable that may produce either kind of value
    pub fn call_eventual<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<Eventual<T, E>, E> + Send + 'static,
    {
        Work::Deferred(Box::new(f))
    }

    /// Track a callable returning an asynchronous computation
    pub fn call_async<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Work::Deferred(Box::new(move || Ok(Eventual::future(f()))))
    }

    /// Evaluate the unit of work, invoking it if it is callable
    pub(crate) fn evaluate(self) -> Result<Eventual<T, E>, E> {
        match self {
            Work::Immediate(eventual) => Ok(eventual),
            Work::Deferred(f) => f(),
        }
    }
}

impl<T, E> From<Eventual<T, E>> for Work<T, E> {
    fn from(eventual: Eventual<T, E>) -> Self {
        Work::Immediate(eventual)
    }
}

impl<T, E> fmt::Debug for Work<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Work::Immediate(Eventual::Ready(_)) => f.write_str("Work::Immediate(Ready)"),
            Work::Immediate(Eventual::Pending(_)) => f.write_str("Work::Immediate(Pending)"),
            Work::Deferred(_) => f.write_str("Work::Deferred(..)"),
        }
    }
}
