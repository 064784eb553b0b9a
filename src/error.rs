//! Rejection payloads.
//!
//! Every rejected promise carries an [`Error`]: a cheaply clonable handle to the
//! original error object. Cloning an [`Error`] never copies the underlying
//! error, so a handler further down a chain receives the very same object that
//! was produced upstream (see [`Error::ptr_eq`]).

use std::{
    any::Any,
    error::Error as StdError,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

/// Failure reasons produced by the promise machinery itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromiseError {
    /// The promise was rejected without an explicit error, through
    /// [`Rejecter::reject`](crate::Rejecter::reject).
    #[error("promise was rejected")]
    Rejected,
    /// A resolver, continuation or adopted future panicked.
    #[error("promise callback panicked: {0}")]
    Panicked(String),
    /// Every handle able to settle the promise was dropped while it was still pending.
    #[error("promise was dropped before it settled")]
    Abandoned,
}

/// Several errors boxed into one.
///
/// Converting an `AggregateError` into an [`Error`] unwraps it, recursively, to
/// its first error. Rejection handlers therefore never see the wrapper.
///
/// # Example
/// ```
/// # use pledge::{AggregateError, Error};
/// let leaf = Error::msg("disk full");
/// let boxed = Error::new(AggregateError::new([leaf.clone(), Error::msg("other")]));
/// assert!(boxed.ptr_eq(&leaf));
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{} error(s) occurred", .errors.len())]
pub struct AggregateError {
    errors: Vec<Error>,
}

impl AggregateError {
    /// Wraps the given errors. Their order is kept; the first one is the one
    /// exposed after unwrapping.
    pub fn new<I: IntoIterator<Item = Error>>(errors: I) -> Self {
        AggregateError {
            errors: errors.into_iter().collect(),
        }
    }

    /// The wrapped errors, in order.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);

/// The error a promise rejects with.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into an `Error`,
/// so `?` can be used inside callbacks.
#[derive(Clone)]
pub struct Error {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl Error {
    /// Wraps `error`, unwrapping any [`AggregateError`] layers down to the leaf.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            inner: Arc::new(error),
        }
        .into_innermost()
    }

    /// Creates an error carrying only a message.
    ///
    /// # Example
    /// ```
    /// # use pledge::Error;
    /// let e = Error::msg("connection reset");
    /// assert_eq!(e.to_string(), "connection reset");
    /// ```
    pub fn msg<M: fmt::Display>(message: M) -> Self {
        Error::new(Message(message.to_string()))
    }

    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        log::warn!("promise callback panicked: {message}");
        Error::new(PromiseError::Panicked(message))
    }

    fn into_innermost(mut self) -> Self {
        loop {
            let next = match self.inner.downcast_ref::<AggregateError>() {
                Some(aggregate) => aggregate.errors.first().cloned(),
                None => None,
            };
            match next {
                Some(error) => self = error,
                None => return self,
            }
        }
    }

    /// Returns `true` if both handles point at the same error object.
    pub fn ptr_eq(&self, other: &Error) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` if the underlying error is an `E`.
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.inner.is::<E>()
    }

    /// Attempts to view the underlying error as an `E`.
    ///
    /// # Example
    /// ```
    /// # use pledge::{Error, PromiseError};
    /// let e = Error::new(PromiseError::Rejected);
    /// assert_eq!(e.downcast_ref::<PromiseError>(), Some(&PromiseError::Rejected));
    /// ```
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// The underlying error as a trait object.
    pub fn as_std_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }
}

impl<E> From<E> for Error
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Error::new(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

/// Runs a user callback, turning a panic into a rejection.
pub(crate) fn capture<R, F>(callback: F) -> Result<R, Error>
where
    F: FnOnce() -> Result<R, Error>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(result) => result,
        Err(payload) => Err(Error::panicked(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("leaf")]
    struct Leaf;

    #[test]
    fn nested_aggregates_unwrap_to_leaf() {
        let leaf = Error::new(Leaf);
        let inner = AggregateError::new([leaf.clone()]);
        let outer = AggregateError::new([Error::new(inner), Error::msg("second")]);
        let error = Error::new(outer);
        assert!(error.ptr_eq(&leaf));
        assert!(error.is::<Leaf>());
    }

    #[test]
    fn empty_aggregate_is_kept() {
        let error = Error::new(AggregateError::new([]));
        let aggregate = error.downcast_ref::<AggregateError>().unwrap();
        assert!(aggregate.errors().is_empty());
        assert_eq!(error.to_string(), "0 error(s) occurred");
    }

    #[test]
    fn clones_share_identity() {
        let error = Error::msg("boom");
        let copy = error.clone();
        assert!(copy.ptr_eq(&error));
        assert!(!Error::msg("boom").ptr_eq(&error));
    }

    #[test]
    fn capture_converts_panics() {
        let result: Result<(), Error> = capture(|| panic!("kaboom"));
        let error = result.unwrap_err();
        assert_eq!(
            error.downcast_ref::<PromiseError>(),
            Some(&PromiseError::Panicked("kaboom".to_string()))
        );
    }

    #[test]
    fn capture_passes_results_through() {
        assert_eq!(capture(|| Ok::<_, Error>(7)).unwrap(), 7);
        let error = Error::msg("nope");
        let returned = capture(|| Err::<(), _>(error.clone())).unwrap_err();
        assert!(returned.ptr_eq(&error));
    }
}
