//! Connection pooling per origin.
//!
//! # Architecture
//!
//! - [`Pool`]: registry of idle connections and the accounting of checked out ones, with a
//!   FIFO queue of requests waiting for capacity
//! - [`Connection`]: one logical connection to an origin, its transport handle is opened on
//!   first use
//! - [`Checkout`]: the future returned by [`Pool::checkout`], resolved immediately or once a
//!   connection is freed for it
//!
//! # Capacity
//!
//! `available + used <= max_total_connections` and every origin holds at most
//! `max_per_origin` connections, idle or checked out. When the pool is full but has idle
//! connections to other origins, the coldest one is closed to make room.

mod checkout;
mod connection;
mod registry;

pub use checkout::Checkout;
pub use connection::Connection;
pub use registry::{Pool, PoolStats};
