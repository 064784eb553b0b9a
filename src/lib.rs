#![doc(html_root_url = "https://docs.rs/pledge/0.1.0")]
//!
//! # Promises for Rust
//!
//! This crate provides Promise/A+ style promises: a value standing for the eventual result of an
//! asynchronous operation, with `then`/`catch`/`finally` chaining and the `all`/`any`/`race`
//! combinators. It does not schedule anything by itself: promises are settled by resolver
//! callbacks or by futures running on an executor you supply.
//!
//! ## Features
//! - Exactly-once settlement: the first resolve or reject wins, later calls are ignored
//! - Chaining with [`then`](Promise::then), [`then_or_else`](Promise::then_or_else),
//!   [`and_then`](Promise::and_then) / [`and_then_or_else`](Promise::and_then_or_else) (flattening),
//!   [`catch`](Promise::catch) and [`finally`](Promise::finally)
//! - Combinators: [`Promise::all`], [`Promise::any`], [`Promise::race`]
//! - Bridging to `std` futures: [`Promise::from_future`], [`Promise::into_future`], `.await`
//! - Panic-safe: panics in callbacks reject the derived promise instead of unwinding
//! - Stack-safe: continuations run from a per-thread queue, so chains of any length settle
//!
//! ## Example
//! ```
//! use pledge::{Error, Promise};
//! let p = Promise::resolve(2)
//!     .then(|v| Ok(v * 10))
//!     .then(|v| if v > 10 { Err(Error::msg("too big")) } else { Ok(v) })
//!     .catch(|_| Ok(-1));
//! assert_eq!(p.wait().unwrap(), -1);
//! ```
//!
//! ## Error Handling
//! A rejected promise carries an [`Error`], a cheap handle to the original error object. Errors
//! travel down a chain unchanged until a rejection handler absorbs them; wrapper layers such as
//! [`AggregateError`] are stripped so handlers always see the error that was actually raised.
//!
//! ## Logging
//! The crate reports through the [`log`](https://docs.rs/log) facade: ignored double settlements
//! at `trace`, panicking callbacks and failed spawns at `warn`.

#![warn(missing_docs)]

mod bridge;
mod cell;
mod combinators;
mod error;
mod promise;
mod resolver;


pub use bridge::{IntoPromise, PromiseFuture};
pub use error::{AggregateError, Error, PromiseError};
pub use promise::{Promise, PromiseState};
pub use resolver::{ErrorRejecter, Rejecter, Resolver};
