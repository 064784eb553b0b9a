//! Promises built from several input promises.
//!
//! Each combinator attaches one listener to every input and settles a fresh
//! aggregate promise. Inputs are only observed, never settled, and the aggregate
//! settles at most once like any other promise.

use std::{future::Future, mem, sync::Arc};

use futures::task::Spawn;
use parking_lot::Mutex;

use crate::{Error, Promise};

struct Gathered<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

struct Rejections {
    first: Option<Error>,
    remaining: usize,
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Waits for every promise to fulfill, collecting the values in input order.
    ///
    /// Rejects as soon as any input rejects, with that input's error, without
    /// waiting for the others. An empty input fulfills straight away with an empty
    /// vector.
    ///
    /// # Examples
    /// ## All fulfill:
    /// ```
    /// # use pledge::Promise;
    /// let all = Promise::all((0..3).map(Promise::resolve));
    /// assert_eq!(all.wait().unwrap(), vec![0, 1, 2]);
    /// ```
    ///
    /// ## One rejects:
    /// ```
    /// # use pledge::{Error, Promise};
    /// let all = Promise::all(vec![
    ///     Promise::resolve(1),
    ///     Promise::reject(Error::msg("fail")),
    ///     Promise::resolve(3),
    /// ]);
    /// assert_eq!(all.wait().unwrap_err().to_string(), "fail");
    /// ```
    pub fn all<I>(promises: I) -> Promise<Vec<T>>
    where
        I: IntoIterator<Item = Promise<T>>,
    {
        let promises: Vec<_> = promises.into_iter().collect();
        if promises.is_empty() {
            return Promise::resolve(Vec::new());
        }

        let (aggregate, cell) = Promise::pending();
        let gathered = Arc::new(Mutex::new(Gathered {
            values: vec![None; promises.len()],
            remaining: promises.len(),
        }));
        for (index, promise) in promises.iter().enumerate() {
            let (cell, gathered) = (cell.clone(), gathered.clone());
            promise.cell.on_settle(move |outcome| match outcome {
                Ok(value) => {
                    let complete = {
                        let mut gathered = gathered.lock();
                        gathered.values[index] = Some(value);
                        gathered.remaining -= 1;
                        (gathered.remaining == 0).then(|| mem::take(&mut gathered.values))
                    };
                    if let Some(values) = complete {
                        cell.fulfill(values.into_iter().flatten().collect());
                    }
                }
                Err(error) => {
                    cell.reject(error);
                }
            });
        }
        aggregate
    }

    /// [`all`](Self::all) over futures, each spawned on `spawner`.
    pub fn all_futures<S, I, Fut, E>(spawner: &S, futures: I) -> Promise<Vec<T>>
    where
        S: Spawn + ?Sized,
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Error>,
    {
        Self::all(
            futures
                .into_iter()
                .map(|future| Promise::from_future(spawner, future)),
        )
    }
}

impl<T: Clone + Default + Send + 'static> Promise<T> {
    /// Fulfills with the first input to fulfill.
    ///
    /// Rejections are tolerated while any input is still pending: the aggregate
    /// rejects only once every input has rejected, with the first error observed.
    /// An empty input fulfills straight away with `T::default()`.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, Promise};
    /// let any = Promise::any(vec![
    ///     Promise::reject(Error::msg("mirror down")),
    ///     Promise::resolve("payload"),
    /// ]);
    /// assert_eq!(any.wait().unwrap(), "payload");
    /// ```
    pub fn any<I>(promises: I) -> Promise<T>
    where
        I: IntoIterator<Item = Promise<T>>,
    {
        let promises: Vec<_> = promises.into_iter().collect();
        if promises.is_empty() {
            return Promise::resolve(T::default());
        }

        let (aggregate, cell) = Promise::pending();
        let rejections = Arc::new(Mutex::new(Rejections {
            first: None,
            remaining: promises.len(),
        }));
        for promise in &promises {
            let (cell, rejections) = (cell.clone(), rejections.clone());
            promise.cell.on_settle(move |outcome| match outcome {
                Ok(value) => {
                    cell.fulfill(value);
                }
                Err(error) => {
                    let exhausted = {
                        let mut rejections = rejections.lock();
                        rejections.first.get_or_insert(error);
                        rejections.remaining -= 1;
                        if rejections.remaining == 0 {
                            rejections.first.clone()
                        } else {
                            None
                        }
                    };
                    if let Some(error) = exhausted {
                        cell.reject(error);
                    }
                }
            });
        }
        aggregate
    }

    /// Settles like the first input to settle, fulfilled or rejected.
    ///
    /// An empty input fulfills straight away with `T::default()`.
    ///
    /// # Example
    /// ```
    /// # use pledge::Promise;
    /// # use std::{thread, time::Duration};
    /// let slow: Promise<u32> = Promise::new(|resolver| {
    ///     thread::spawn(move || {
    ///         thread::sleep(Duration::from_millis(200));
    ///         resolver.resolve(1);
    ///     });
    ///     Ok(())
    /// });
    /// let race = Promise::race(vec![slow, Promise::resolve(2)]);
    /// assert_eq!(race.wait().unwrap(), 2);
    /// ```
    pub fn race<I>(promises: I) -> Promise<T>
    where
        I: IntoIterator<Item = Promise<T>>,
    {
        let promises: Vec<_> = promises.into_iter().collect();
        if promises.is_empty() {
            return Promise::resolve(T::default());
        }

        let (aggregate, cell) = Promise::pending();
        for promise in &promises {
            let cell = cell.clone();
            promise.cell.on_settle(move |outcome| {
                cell.settle(outcome);
            });
        }
        aggregate
    }

    /// [`any`](Self::any) over futures, each spawned on `spawner`.
    pub fn any_futures<S, I, Fut, E>(spawner: &S, futures: I) -> Promise<T>
    where
        S: Spawn + ?Sized,
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Error>,
    {
        Self::any(
            futures
                .into_iter()
                .map(|future| Promise::from_future(spawner, future)),
        )
    }

    /// [`race`](Self::race) over futures, each spawned on `spawner`.
    pub fn race_futures<S, I, Fut, E>(spawner: &S, futures: I) -> Promise<T>
    where
        S: Spawn + ?Sized,
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Error>,
    {
        Self::race(
            futures
                .into_iter()
                .map(|future| Promise::from_future(spawner, future)),
        )
    }
}
