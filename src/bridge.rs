//! Conversions between promises and `std` futures.
//!
//! The crate never polls futures itself: adopting a future means spawning it on
//! an executor supplied by the caller, which decides the thread it runs on.

use std::{
    fmt,
    future::{Future, IntoFuture},
    panic::AssertUnwindSafe,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    task::{Spawn, SpawnExt},
    FutureExt,
};

use crate::{cell::Outcome, Error, Promise, PromiseError};

/// A future that completes when its [`Promise`] settles.
///
/// Created by [`Promise::into_future`], or implicitly by `.await`ing a promise.
/// If the promise is dropped while pending, with nothing left that could settle
/// it, the future completes with [`PromiseError::Abandoned`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct PromiseFuture<T> {
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> fmt::Debug for PromiseFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseFuture").finish_non_exhaustive()
    }
}

impl<T> Future for PromiseFuture<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(PromiseError::Abandoned.into())))
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    fn subscribe(&self) -> oneshot::Receiver<Outcome<T>> {
        let (tx, rx) = oneshot::channel();
        self.cell.on_settle(move |outcome| {
            // The receiver may have been dropped; nobody is waiting then.
            let _ = tx.send(outcome);
        });
        rx
    }

    /// Adopts a future: the returned promise settles when `future` completes.
    ///
    /// `future` is spawned on `spawner`. If it panics, the promise rejects with
    /// [`PromiseError::Panicked`]; if it cannot be spawned, with the executor's
    /// spawn error.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// use futures::executor::ThreadPool;
    ///
    /// let pool = ThreadPool::new().unwrap();
    /// let p = Promise::from_future(&pool, async { Ok::<_, Error>(7) });
    /// assert_eq!(p.wait().unwrap(), 7);
    /// ```
    pub fn from_future<S, Fut, E>(spawner: &S, future: Fut) -> Self
    where
        S: Spawn + ?Sized,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Error>,
    {
        let (promise, cell) = Self::pending();
        let target = cell.clone();
        let task = async move {
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result.map_err(Into::into),
                Err(payload) => Err(Error::panicked(payload)),
            };
            target.settle(outcome);
        };
        log::trace!("adopting future into a promise");
        if let Err(error) = spawner.spawn(task) {
            log::warn!("could not spawn adopted future: {error}");
            cell.reject(error.into());
        }
        promise
    }

    /// Converts this promise into a future of its outcome.
    ///
    /// # Example
    /// ```
    /// # use pledge::Promise;
    /// use futures::executor::block_on;
    ///
    /// let p = Promise::resolve(5).then(|v| Ok(v * 2));
    /// assert_eq!(block_on(p.into_future()).unwrap(), 10);
    /// ```
    pub fn into_future(self) -> PromiseFuture<T> {
        IntoFuture::into_future(self)
    }

    /// Blocks the current thread until this promise settles, then returns its outcome.
    ///
    /// Blocks forever if nothing ever settles the promise.
    ///
    /// # Example
    /// ```
    /// # use pledge::Promise;
    /// # use std::{thread, time::Duration};
    /// let p: Promise<&str> = Promise::new(|resolver| {
    ///     thread::spawn(move || {
    ///         thread::sleep(Duration::from_millis(20));
    ///         resolver.resolve("done");
    ///     });
    ///     Ok(())
    /// });
    /// assert_eq!(p.wait().unwrap(), "done");
    /// ```
    pub fn wait(&self) -> Result<T, Error> {
        // A settled promise is read directly: from inside a callback, a listener
        // would only run after this call returns.
        if let Some(outcome) = self.peek() {
            return outcome;
        }
        self.subscribe()
            .recv()
            .unwrap_or_else(|_| Err(PromiseError::Abandoned.into()))
    }
}

impl<T: Clone + Send + 'static> IntoFuture for Promise<T> {
    type Output = Result<T, Error>;
    type IntoFuture = PromiseFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        PromiseFuture {
            rx: self.subscribe(),
        }
    }
}

/// Turns a fallible future into a [`Promise`].
///
/// # Example
/// ```
/// # use pledge::{Error, IntoPromise};
/// use futures::executor::ThreadPool;
///
/// let pool = ThreadPool::new().unwrap();
/// let p = async { Ok::<_, Error>("hi") }.into_promise(&pool);
/// assert_eq!(p.wait().unwrap(), "hi");
/// ```
pub trait IntoPromise<T> {
    /// Spawns `self` on `spawner` and returns a promise of its output.
    /// See [`Promise::from_future`].
    fn into_promise<S: Spawn + ?Sized>(self, spawner: &S) -> Promise<T>;
}

impl<Fut, T, E> IntoPromise<T> for Fut
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Clone + Send + 'static,
    E: Into<Error>,
{
    fn into_promise<S: Spawn + ?Sized>(self, spawner: &S) -> Promise<T> {
        Promise::from_future(spawner, self)
    }
}
