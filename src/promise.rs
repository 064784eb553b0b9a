//! The promise handle and its chaining methods.

use std::{fmt, future::Future, sync::Arc};

use futures::task::Spawn;

use crate::{
    cell::{Cell, Outcome},
    error::capture,
    Error, ErrorRejecter, Rejecter, Resolver,
};

/// The state of a [`Promise`].
///
/// A promise starts `Pending` and moves to `Fulfilled` or `Rejected` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with an [`Error`].
    Rejected,
}

/// The eventual result of an asynchronous operation.
///
/// A `Promise` is a cheap, clonable handle: clones observe the same settlement.
/// `Promise<()>` (the default) plays the role of an untyped promise that only
/// signals completion or failure.
///
/// Continuations registered with [`then`](Self::then) and friends run on the thread
/// that settles the promise, or straight away on the registering thread if the
/// promise has already settled. Each continuation returns a new promise, so calls
/// chain:
///
/// ```
/// # use pledge::Promise;
/// let p = Promise::resolve(2)
///     .then(|v| Ok(v * 10))
///     .then(|v| Ok(v + 5));
/// assert_eq!(p.wait().unwrap(), 25);
/// ```
///
/// # Errors and panics
/// Callbacks return `Result<_, Error>`. Returning `Err`, or panicking, rejects the
/// derived promise; neither escapes the method that registered the callback.
/// A rejection travels down the chain untouched until a rejection handler
/// ([`catch`](Self::catch), [`then_or_else`](Self::then_or_else), ...) absorbs it.
pub struct Promise<T = ()> {
    pub(crate) cell: Arc<Cell<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    pub(crate) fn pending() -> (Self, Arc<Cell<T>>) {
        let cell = Arc::new(Cell::new());
        (Promise { cell: cell.clone() }, cell)
    }

    fn drive<F>(executor: F) -> Self
    where
        F: FnOnce(Arc<Cell<T>>) -> Result<(), Error>,
    {
        let (promise, cell) = Self::pending();
        let handle = cell.clone();
        if let Err(error) = capture(move || executor(handle)) {
            cell.reject(error);
        }
        promise
    }

    /// Creates a promise that the `executor` can only fulfill.
    ///
    /// The executor runs synchronously, before `new` returns. It may keep the
    /// [`Resolver`] (or move it to another thread) and settle the promise later.
    /// If the executor returns `Err` or panics before resolving, the promise is
    /// rejected with that error.
    ///
    /// # Examples
    /// ## Resolving later:
    /// ```
    /// # use pledge::{Promise, PromiseState};
    /// let mut slot = None;
    /// let p: Promise<i32> = Promise::new(|resolver| {
    ///     slot = Some(resolver);
    ///     Ok(())
    /// });
    /// assert_eq!(p.state(), PromiseState::Pending);
    /// slot.unwrap().resolve(42);
    /// assert_eq!(p.wait().unwrap(), 42);
    /// ```
    ///
    /// ## Failing executor:
    /// ```
    /// # use pledge::{Error, Promise, PromiseState};
    /// let p: Promise<u8> = Promise::new(|_| Err(Error::msg("no input")));
    /// assert_eq!(p.state(), PromiseState::Rejected);
    /// ```
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T>) -> Result<(), Error>,
    {
        Self::drive(|cell| executor(Resolver::new(cell)))
    }

    /// Creates a promise that the `executor` can fulfill, or reject with
    /// [`PromiseError::Rejected`](crate::PromiseError::Rejected).
    ///
    /// # Example
    /// ```
    /// # use pledge::{Promise, PromiseError};
    /// let p: Promise<u8> = Promise::with_reject(|_resolver, rejecter| {
    ///     rejecter.reject();
    ///     Ok(())
    /// });
    /// let error = p.wait().unwrap_err();
    /// assert_eq!(error.downcast_ref::<PromiseError>(), Some(&PromiseError::Rejected));
    /// ```
    pub fn with_reject<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T>, Rejecter<T>) -> Result<(), Error>,
    {
        Self::drive(|cell| executor(Resolver::new(cell.clone()), Rejecter::new(cell)))
    }

    /// Creates a promise that the `executor` can fulfill, or reject with an error
    /// of its choosing.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// let cause = Error::msg("timeout");
    /// let p: Promise<u8> = Promise::with_reject_error(|_resolver, rejecter| {
    ///     rejecter.reject(cause.clone());
    ///     Ok(())
    /// });
    /// assert!(p.wait().unwrap_err().ptr_eq(&cause));
    /// ```
    pub fn with_reject_error<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T>, ErrorRejecter<T>) -> Result<(), Error>,
    {
        Self::drive(|cell| executor(Resolver::new(cell.clone()), ErrorRejecter::new(cell)))
    }

    /// Creates a promise that is already fulfilled with `value`.
    ///
    /// # Example
    /// ```
    /// # use pledge::Promise;
    /// assert_eq!(Promise::resolve("ready").wait().unwrap(), "ready");
    /// ```
    pub fn resolve(value: T) -> Self {
        Self::from_result(Ok::<T, Error>(value))
    }

    /// Creates a promise that is already rejected with `error`.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise, PromiseState};
    /// let p: Promise<u32> = Promise::reject(Error::msg("fail"));
    /// assert_eq!(p.state(), PromiseState::Rejected);
    /// ```
    pub fn reject<E: Into<Error>>(error: E) -> Self {
        Self::from_result(Err::<T, Error>(error.into()))
    }

    /// Creates a promise that is already settled with `result`.
    pub fn from_result<E: Into<Error>>(result: Result<T, E>) -> Self {
        Promise {
            cell: Arc::new(Cell::settled(result.map_err(Into::into))),
        }
    }

    /// A snapshot of the current state. Never blocks on settlement.
    pub fn state(&self) -> PromiseState {
        self.cell.state()
    }

    /// Returns the outcome if the promise has settled, without blocking.
    ///
    /// # Example
    /// ```
    /// # use pledge::Promise;
    /// let p = Promise::resolve(1);
    /// assert_eq!(p.peek().unwrap().unwrap(), 1);
    /// let never: Promise<u8> = Promise::new(|_| Ok(()));
    /// assert!(never.peek().is_none());
    /// ```
    pub fn peek(&self) -> Option<Result<T, Error>> {
        self.cell.peek()
    }

    fn chain<U, F>(&self, on_settled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>, Arc<Cell<U>>) + Send + 'static,
    {
        let (derived, cell) = Promise::pending();
        self.cell.on_settle(move |outcome| on_settled(outcome, cell));
        derived
    }

    /// Runs `on_fulfilled` with the value once this promise fulfills, and returns a
    /// promise of its result.
    ///
    /// If this promise rejects, `on_fulfilled` never runs and the returned promise
    /// rejects with the same error.
    ///
    /// # Examples
    /// ## Transforming values:
    /// ```
    /// # use pledge::Promise;
    /// let p = Promise::resolve(3).then(|v| Ok(v * 2));
    /// assert_eq!(p.wait().unwrap(), 6);
    /// ```
    ///
    /// ## Skipped on rejection:
    /// ```
    /// # use pledge::{Error, Promise};
    /// let p = Promise::<i32>::reject(Error::msg("fail")).then(|v| Ok(v + 1));
    /// assert_eq!(p.wait().unwrap_err().to_string(), "fail");
    /// ```
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, Error> + Send + 'static,
    {
        self.chain(move |outcome, derived| {
            derived.settle(outcome.and_then(|value| capture(move || on_fulfilled(value))));
        })
    }

    /// Like [`then_or_else`](Self::then_or_else), with a rejection handler that does
    /// not look at the error.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// let p = Promise::<u32>::reject(Error::msg("fail")).then_or(|v| Ok(v), || Ok(0));
    /// assert_eq!(p.wait().unwrap(), 0);
    /// ```
    pub fn then_or<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, Error> + Send + 'static,
        R: FnOnce() -> Result<U, Error> + Send + 'static,
    {
        self.then_or_else(on_fulfilled, move |_| on_rejected())
    }

    /// Runs `on_fulfilled` if this promise fulfills, or `on_rejected` if it rejects.
    ///
    /// A rejection handler that returns `Ok` absorbs the error: the returned promise
    /// fulfills, and nothing further down the chain sees the error.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// let p = Promise::<String>::reject(Error::msg("offline"))
    ///     .then_or_else(|s| Ok(s.len()), |e| Ok(e.to_string().len() * 100));
    /// assert_eq!(p.wait().unwrap(), 700);
    /// ```
    pub fn then_or_else<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, Error> + Send + 'static,
        R: FnOnce(Error) -> Result<U, Error> + Send + 'static,
    {
        self.chain(move |outcome, derived| {
            derived.settle(match outcome {
                Ok(value) => capture(move || on_fulfilled(value)),
                Err(error) => capture(move || on_rejected(error)),
            });
        })
    }

    fn adopt<U, F>(&self, on_settled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> Outcome<Promise<U>> + Send + 'static,
    {
        self.chain(move |outcome, derived| match on_settled(outcome) {
            Ok(inner) => inner.cell.on_settle(move |outcome| {
                derived.settle(outcome);
            }),
            Err(error) => {
                derived.reject(error);
            }
        })
    }

    /// Runs `on_fulfilled` once this promise fulfills and adopts the outcome of the
    /// promise it returns.
    ///
    /// The returned promise settles only when the inner promise settles, never as a
    /// promise of a promise.
    ///
    /// # Example
    /// ```
    /// # use pledge::Promise;
    /// let p = Promise::resolve(2).and_then(|v| Promise::resolve(v * 21));
    /// assert_eq!(p.wait().unwrap(), 42);
    /// ```
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<U> + Send + 'static,
    {
        self.adopt(move |outcome| outcome.and_then(|value| capture(move || Ok(on_fulfilled(value)))))
    }

    /// Like [`and_then`](Self::and_then), but a rejection runs `on_rejected` and the
    /// returned promise adopts the promise it returns.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// let p = Promise::<u32>::reject(Error::msg("cache miss"))
    ///     .and_then_or_else(|v| Promise::resolve(v), |_| Promise::resolve(404));
    /// assert_eq!(p.wait().unwrap(), 404);
    /// ```
    pub fn and_then_or_else<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<U> + Send + 'static,
        R: FnOnce(Error) -> Promise<U> + Send + 'static,
    {
        self.adopt(move |outcome| match outcome {
            Ok(value) => capture(move || Ok(on_fulfilled(value))),
            Err(error) => capture(move || Ok(on_rejected(error))),
        })
    }

    /// Runs `on_fulfilled` once this promise fulfills and adopts the outcome of the
    /// future it returns. The future is polled on `spawner`.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// use futures::executor::ThreadPool;
    ///
    /// let pool = ThreadPool::new().unwrap();
    /// let p = Promise::resolve(20)
    ///     .and_then_future(pool, |v| async move { Ok::<_, Error>(v + 1) });
    /// assert_eq!(p.wait().unwrap(), 21);
    /// ```
    pub fn and_then_future<U, E, Fut, F, S>(&self, spawner: S, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        E: Into<Error>,
        Fut: Future<Output = Result<U, E>> + Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        S: Spawn + Send + 'static,
    {
        self.and_then(move |value| Promise::from_future(&spawner, on_fulfilled(value)))
    }

    /// Like [`and_then_future`](Self::and_then_future), with a rejection handler whose
    /// future is adopted in the same way.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// use futures::executor::ThreadPool;
    ///
    /// let pool = ThreadPool::new().unwrap();
    /// let p = Promise::<u32>::reject(Error::msg("offline")).and_then_future_or_else(
    ///     pool,
    ///     |v| async move { Ok::<_, Error>(v) },
    ///     |_| async { Ok::<_, Error>(0) },
    /// );
    /// assert_eq!(p.wait().unwrap(), 0);
    /// ```
    pub fn and_then_future_or_else<U, E, RE, Fut, RFut, F, R, S>(
        &self,
        spawner: S,
        on_fulfilled: F,
        on_rejected: R,
    ) -> Promise<U>
    where
        U: Clone + Send + 'static,
        E: Into<Error>,
        RE: Into<Error>,
        Fut: Future<Output = Result<U, E>> + Send + 'static,
        RFut: Future<Output = Result<U, RE>> + Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        R: FnOnce(Error) -> RFut + Send + 'static,
        S: Spawn + Send + 'static,
    {
        self.adopt(move |outcome| match outcome {
            Ok(value) => capture(move || Ok(Promise::from_future(&spawner, on_fulfilled(value)))),
            Err(error) => capture(move || Ok(Promise::from_future(&spawner, on_rejected(error)))),
        })
    }

    /// Handles a rejection, returning a fallback value.
    ///
    /// Fulfilled values pass through untouched. The handler only runs if the chain is
    /// still rejected at this point; an error already absorbed upstream is never seen.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// let p = Promise::resolve(1)
    ///     .then(|_| Err::<u32, _>(Error::msg("bad input")))
    ///     .then(|v| Ok(v + 1))
    ///     .catch(|e| {
    ///         assert_eq!(e.to_string(), "bad input");
    ///         Ok(0)
    ///     });
    /// assert_eq!(p.wait().unwrap(), 0);
    /// ```
    pub fn catch<R>(&self, on_error: R) -> Promise<T>
    where
        R: FnOnce(Error) -> Result<T, Error> + Send + 'static,
    {
        self.then_or_else(|value| Ok(value), on_error)
    }

    /// Maps the rejection error, leaving fulfilled values and the rejected state as they are.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// let p = Promise::<()>::reject(Error::msg("fail"))
    ///     .map_err(|e| Error::msg(format!("upload: {e}")));
    /// assert_eq!(p.wait().unwrap_err().to_string(), "upload: fail");
    /// ```
    pub fn map_err<F>(&self, errback: F) -> Promise<T>
    where
        F: FnOnce(Error) -> Error + Send + 'static,
    {
        self.then_or_else(|value| Ok(value), move |error| Err(errback(error)))
    }

    /// Runs `on_final` once this promise settles, whatever the outcome, and passes
    /// the outcome on unchanged.
    ///
    /// Only a failure of `on_final` itself replaces the outcome.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// let cause = Error::msg("fail");
    /// let p = Promise::<()>::reject(cause.clone()).finally(|| {
    ///     println!("cleaning up");
    ///     Ok(())
    /// });
    /// assert!(p.wait().unwrap_err().ptr_eq(&cause));
    /// ```
    pub fn finally<F>(&self, on_final: F) -> Promise<T>
    where
        F: FnOnce() -> Result<(), Error> + Send + 'static,
    {
        self.chain(move |outcome, derived| {
            derived.settle(capture(on_final).and(outcome));
        })
    }
}

impl<T: Clone + Send + 'static, E: Into<Error>> From<Result<T, E>> for Promise<T> {
    fn from(result: Result<T, E>) -> Self {
        Promise::from_result(result)
    }
}
