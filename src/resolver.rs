//! Handles given to resolver callbacks so they can settle their promise.
//!
//! All handles are cheap to clone and may be moved to other threads. Only the
//! first call across all handles of one promise has any effect.

use std::{fmt, sync::Arc};

use crate::{cell::Cell, Error, PromiseError};

/// Fulfills a promise created by [`Promise::new`](crate::Promise::new) and its siblings.
pub struct Resolver<T> {
    cell: Arc<Cell<T>>,
}

impl<T: Clone + Send + 'static> Resolver<T> {
    pub(crate) fn new(cell: Arc<Cell<T>>) -> Self {
        Resolver { cell }
    }

    /// Fulfills the promise with `value`, unless it already settled.
    pub fn resolve(&self, value: T) {
        self.cell.fulfill(value);
    }
}

/// Rejects a promise with the default [`PromiseError::Rejected`] error.
///
/// Handed out by [`Promise::with_reject`](crate::Promise::with_reject).
pub struct Rejecter<T> {
    cell: Arc<Cell<T>>,
}

impl<T: Clone + Send + 'static> Rejecter<T> {
    pub(crate) fn new(cell: Arc<Cell<T>>) -> Self {
        Rejecter { cell }
    }

    /// Rejects the promise, unless it already settled.
    pub fn reject(&self) {
        self.cell.reject(PromiseError::Rejected.into());
    }
}

/// Rejects a promise with a caller supplied error.
///
/// Handed out by [`Promise::with_reject_error`](crate::Promise::with_reject_error).
pub struct ErrorRejecter<T> {
    cell: Arc<Cell<T>>,
}

impl<T: Clone + Send + 'static> ErrorRejecter<T> {
    pub(crate) fn new(cell: Arc<Cell<T>>) -> Self {
        ErrorRejecter { cell }
    }

    /// Rejects the promise with `error`, unless it already settled.
    pub fn reject<E: Into<Error>>(&self, error: E) {
        self.cell.reject(error.into());
    }
}

macro_rules! handle_impls {
    ($($handle:ident),*) => {$(
        impl<T> Clone for $handle<T> {
            fn clone(&self) -> Self {
                $handle { cell: self.cell.clone() }
            }
        }

        impl<T> fmt::Debug for $handle<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($handle)).finish_non_exhaustive()
            }
        }
    )*};
}

handle_impls!(Resolver, Rejecter, ErrorRejecter);
