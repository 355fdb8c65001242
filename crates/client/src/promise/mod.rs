//! A thread-safe future value with dependency chaining.
//!
//! # Lifecycle
//!
//! A promise starts `Pending` and ends either `Fulfilled` with a value or `Rejected` with an
//! [`Error`](crate::Error). Terminal states never change. Promises built from dependencies and
//! a task pass through `Processing` while the task runs:
//!
//! ```text
//! Pending ──trigger──▶ Processing ──▶ Fulfilled(T)
//!    │                      └───────▶ Rejected(Error)
//!    └──── Writer::fulfill / Writer::reject ────▶ terminal
//! ```
//!
//! Tasks are lazy: they start when the promise is first waited on or polled, run on their own
//! thread, and keep running when a waiter gives up.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use restline::promise::{Next, Promise};
//!
//! let (promise, writer) = Promise::<u32>::create();
//! let doubled = promise.then(|value| value * 2);
//!
//! std::thread::spawn(move || writer.fulfill(21));
//!
//! assert_eq!(doubled.wait(Some(Duration::from_secs(5))).unwrap(), 42);
//! ```

mod cell;
mod handle;
mod writer;

pub use cell::PromiseState;
pub use handle::Next;
pub use handle::Promise;
pub use writer::Writer;
