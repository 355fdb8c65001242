use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::Config;
use crate::pool::{Checkout, Connection};
use crate::protocol::Origin;

/// Thread-safe registry of connections, shared by cloning.
///
/// All bookkeeping happens under one mutex that is never held across I/O. Closing a connection
/// means dropping it, which drops its transport handle.
#[derive(Debug, Clone)]
pub struct Pool {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: Config,
    state: Mutex<PoolState>,
    next_connection_id: AtomicU64,
}

#[derive(Debug, Default)]
struct PoolState {
    /// Idle connections, the most recently released first
    available: VecDeque<Connection>,
    used: usize,
    per_origin: HashMap<Origin, usize>,
    waiters: VecDeque<Waiter>,
    demoted: HashSet<Origin>,
    next_waiter_id: u64,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    origin: Origin,
    sender: oneshot::Sender<Connection>,
}

/// A snapshot of the pool accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub available: usize,
    pub used: usize,
    pub per_origin: HashMap<Origin, usize>,
    pub waiting: usize,
}

impl Pool {
    pub fn new(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared { config, state: Mutex::new(PoolState::default()), next_connection_id: AtomicU64::new(1) }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Reserves a connection to `origin`.
    ///
    /// The reservation is made right away: an idle connection is reused, a new one is opened
    /// if there is capacity, or the coldest idle connection of another origin is closed to make
    /// room. Otherwise the request joins the wait queue and the returned [`Checkout`] resolves
    /// once a connection is freed for it, or fails after the configured checkout timeout.
    pub fn checkout(&self, origin: Origin) -> Checkout {
        let mut state = self.shared.state.lock();
        if let Some(connection) = self.acquire(&mut state, &origin) {
            return Checkout::ready(self.clone(), connection);
        }

        let (sender, receiver) = oneshot::channel();
        let id = state.next_waiter_id;
        state.next_waiter_id += 1;
        state.waiters.push_back(Waiter { id, origin: origin.clone(), sender });
        debug!(%origin, waiter = id, waiting = state.waiters.len(), used = state.used, "no connection available, queued");

        Checkout::queued(self.clone(), id, origin, receiver, self.shared.config.checkout_timeout())
    }

    /// Returns a connection after use.
    ///
    /// Connections the peer won't keep alive are closed instead.
    pub fn release(&self, mut connection: Connection) {
        let mut state = self.shared.state.lock();
        state.used = state.used.saturating_sub(1);

        if !connection.is_reusable() {
            Self::close(&mut state, connection);
        } else if state.available.len() < self.shared.config.max_total_connections() {
            if state.demoted.contains(connection.origin()) {
                connection.demote();
            }
            connection.mark_idle();
            trace!(id = connection.id(), origin = %connection.origin(), "connection released");
            state.available.push_front(connection);
        } else {
            Self::close(&mut state, connection);
        }

        self.serve_waiters(&mut state);
    }

    /// Closes a checked out connection for good.
    pub fn remove(&self, connection: Connection) {
        let mut state = self.shared.state.lock();
        state.used = state.used.saturating_sub(1);
        Self::close(&mut state, connection);
        self.serve_waiters(&mut state);
    }

    /// Makes every future connection to `origin` start in serial mode.
    pub fn demote(&self, origin: &Origin) {
        let mut state = self.shared.state.lock();
        if state.demoted.insert(origin.clone()) {
            debug!(%origin, "origin demoted to serial connections");
        }
        for connection in state.available.iter_mut().filter(|connection| connection.origin() == origin) {
            connection.demote();
        }
    }

    pub fn is_demoted(&self, origin: &Origin) -> bool {
        self.shared.state.lock().demoted.contains(origin)
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            available: state.available.len(),
            used: state.used,
            per_origin: state.per_origin.clone(),
            waiting: state.waiters.len(),
        }
    }

    /// Drops the waiter `id` from the queue, if it is still queued.
    pub(crate) fn withdraw(&self, id: u64) {
        let mut state = self.shared.state.lock();
        state.waiters.retain(|waiter| waiter.id != id);
    }

    fn acquire(&self, state: &mut PoolState, origin: &Origin) -> Option<Connection> {
        let config = &self.shared.config;
        Self::close_stale(state, config.idle_timeout());

        if let Some(connection) =
            state.available.iter().position(|connection| connection.origin() == origin).and_then(|index| state.available.remove(index))
        {
            state.used += 1;
            trace!(id = connection.id(), %origin, "reuse idle connection");
            return Some(connection);
        }

        let origin_count = state.per_origin.get(origin).copied().unwrap_or(0);
        if origin_count >= config.max_per_origin() {
            return None;
        }

        if state.available.len() + state.used < config.max_total_connections() {
            return Some(self.open(state, origin));
        }

        let coldest = state.available.pop_back()?;
        debug!(id = coldest.id(), evicted = %coldest.origin(), %origin, "evict coldest idle connection");
        Self::close(state, coldest);
        Some(self.open(state, origin))
    }

    fn open(&self, state: &mut PoolState, origin: &Origin) -> Connection {
        let id = self.shared.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let pipeline = !state.demoted.contains(origin);

        *state.per_origin.entry(origin.clone()).or_default() += 1;
        state.used += 1;

        debug!(id, %origin, pipeline, used = state.used, "new connection");
        Connection::new(id, origin.clone(), pipeline)
    }

    fn close(state: &mut PoolState, connection: Connection) {
        if let Some(count) = state.per_origin.get_mut(connection.origin()) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.per_origin.remove(connection.origin());
            }
        }
        debug!(id = connection.id(), origin = %connection.origin(), served = connection.served(), "connection closed");
    }

    fn close_stale(state: &mut PoolState, idle_timeout: std::time::Duration) {
        while let Some(index) = state.available.iter().position(|connection| connection.idle_for() > idle_timeout) {
            if let Some(connection) = state.available.remove(index) {
                trace!(id = connection.id(), "idle connection expired");
                Self::close(state, connection);
            }
        }
    }

    /// Hands freed capacity to queued checkouts, oldest first.
    ///
    /// Waiters that can't be served keep their position, younger waiters for other origins may
    /// still be served behind them.
    fn serve_waiters(&self, state: &mut PoolState) {
        let mut index = 0;
        while index < state.waiters.len() {
            if state.waiters[index].sender.is_closed() {
                state.waiters.remove(index);
                continue;
            }

            let origin = state.waiters[index].origin.clone();
            let Some(connection) = self.acquire(state, &origin) else {
                index += 1;
                continue;
            };

            let Some(waiter) = state.waiters.remove(index) else {
                break;
            };
            trace!(waiter = waiter.id, id = connection.id(), %origin, "deliver connection to waiter");
            if let Err(connection) = waiter.sender.send(connection) {
                // the checkout went away in the meantime, keep the connection idle
                state.used = state.used.saturating_sub(1);
                state.available.push_front(connection);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::time::Duration;

    fn origin(name: &str) -> Origin {
        Origin::new("http", name, 80)
    }

    fn pool(max_total: usize, max_per_origin: usize) -> Pool {
        Pool::new(Config::builder().max_total_connections(max_total).max_per_origin(max_per_origin).build().unwrap())
    }

    fn assert_capacity(pool: &Pool) {
        let stats = pool.stats();
        assert!(stats.available + stats.used <= pool.config().max_total_connections(), "{stats:?}");
        assert!(stats.per_origin.values().all(|count| *count <= pool.config().max_per_origin()), "{stats:?}");
    }

    #[tokio::test]
    async fn reuse_idle_connection() {
        let pool = pool(4, 2);

        let connection = pool.checkout(origin("a")).await.unwrap();
        let id = connection.id();
        pool.release(connection);

        let connection = pool.checkout(origin("a")).await.unwrap();
        assert_eq!(connection.id(), id);
        assert_eq!(pool.stats().used, 1);
        assert_eq!(pool.stats().available, 0);
    }

    #[tokio::test]
    async fn per_origin_cap_queues_checkouts() {
        let pool = pool(10, 2);

        let first = pool.checkout(origin("a")).await.unwrap();
        let _second = pool.checkout(origin("a")).await.unwrap();
        let third = pool.checkout(origin("a"));
        assert_eq!(pool.stats().waiting, 1);
        assert_eq!(pool.stats().per_origin[&origin("a")], 2);

        // other origins are not affected
        let other = pool.checkout(origin("b")).await.unwrap();
        assert_eq!(other.origin(), &origin("b"));

        let first_id = first.id();
        pool.release(first);
        assert_eq!(third.await.unwrap().id(), first_id);
        assert_capacity(&pool);
    }

    #[tokio::test]
    async fn evict_coldest_for_other_origin() {
        let pool = pool(1, 1);

        let a = pool.checkout(origin("a")).await.unwrap();
        let b = pool.checkout(origin("b"));
        assert_eq!(pool.stats().waiting, 1);

        pool.release(a);
        let b = b.await.unwrap();

        assert_eq!(b.origin(), &origin("b"));
        let stats = pool.stats();
        assert_eq!(stats.available, 0);
        assert_eq!(stats.used, 1);
        assert!(!stats.per_origin.contains_key(&origin("a")));
    }

    #[tokio::test]
    async fn evict_idle_connection_without_queueing() {
        let pool = pool(2, 2);

        let a1 = pool.checkout(origin("a")).await.unwrap();
        let a2 = pool.checkout(origin("a")).await.unwrap();
        pool.release(a1);
        pool.release(a2);

        let b = pool.checkout(origin("b")).await.unwrap();
        assert_eq!(b.origin(), &origin("b"));
        assert_eq!(pool.stats().per_origin[&origin("a")], 1);
        assert_capacity(&pool);
    }

    #[tokio::test]
    async fn waiters_are_served_in_order() {
        let pool = pool(1, 1);
        let held = pool.checkout(origin("a")).await.unwrap();
        let held_id = held.id();

        let mut first = pool.checkout(origin("a"));
        let mut second = pool.checkout(origin("b"));
        let mut third = pool.checkout(origin("a"));
        assert_eq!(pool.stats().waiting, 3);

        pool.release(held);
        let served = tokio::time::timeout(Duration::from_millis(50), &mut first).await.unwrap().unwrap();
        assert_eq!(served.id(), held_id);
        assert!(tokio::time::timeout(Duration::from_millis(20), &mut second).await.is_err());
        assert!(tokio::time::timeout(Duration::from_millis(20), &mut third).await.is_err());
        assert_eq!(pool.stats().waiting, 2);

        // the idle a connection is evicted for the older b waiter
        pool.release(served);
        let b = tokio::time::timeout(Duration::from_millis(50), &mut second).await.unwrap().unwrap();
        assert_eq!(b.origin(), &origin("b"));
        assert!(tokio::time::timeout(Duration::from_millis(20), &mut third).await.is_err());

        pool.release(b);
        assert_eq!(third.await.unwrap().origin(), &origin("a"));
        assert_eq!(pool.stats().waiting, 0);
    }

    #[tokio::test]
    async fn servable_waiter_behind_blocked_one() {
        let pool = pool(2, 1);
        let a = pool.checkout(origin("a")).await.unwrap();
        let b = pool.checkout(origin("b")).await.unwrap();

        let blocked_a = pool.checkout(origin("a"));
        let waiting_c = pool.checkout(origin("c"));

        // freeing b can't help the second a, but lets c evict it
        pool.release(b);
        let c = waiting_c.await.unwrap();
        assert_eq!(c.origin(), &origin("c"));
        assert_eq!(pool.stats().waiting, 1);

        pool.release(a);
        assert_eq!(blocked_a.await.unwrap().origin(), &origin("a"));
        assert_capacity(&pool);
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_times_out() {
        let pool = Pool::new(Config::builder().max_total_connections(1).checkout_timeout(Duration::from_millis(200)).build().unwrap());
        let _held = pool.checkout(origin("a")).await.unwrap();

        let error = pool.checkout(origin("b")).await.unwrap_err();
        assert!(matches!(error, Error::Timeout { operation: crate::Operation::Checkout { .. } }));
        assert_eq!(pool.stats().waiting, 0);
    }

    #[tokio::test]
    async fn unbounded_checkout_timeout_keeps_waiting() {
        let pool = Pool::new(Config::builder().max_total_connections(1).checkout_timeout(Duration::MAX).build().unwrap());
        let held = pool.checkout(origin("a")).await.unwrap();

        let waiting = tokio::spawn({
            let pool = pool.clone();
            async move { pool.checkout(origin("a")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.stats().waiting, 1);

        let id = held.id();
        pool.release(held);
        assert_eq!(waiting.await.unwrap().unwrap().id(), id);
    }

    #[tokio::test]
    async fn dropped_checkout_returns_connection() {
        let pool = pool(1, 1);
        let held = pool.checkout(origin("a")).await.unwrap();

        let abandoned = pool.checkout(origin("a"));
        pool.release(held);
        drop(abandoned);

        let stats = pool.stats();
        assert_eq!(stats.used, 0);
        assert_eq!(stats.available, 1);
        assert_eq!(stats.waiting, 0);
    }

    #[tokio::test]
    async fn remove_frees_capacity() {
        let pool = pool(1, 1);
        let connection = pool.checkout(origin("a")).await.unwrap();
        let waiting = pool.checkout(origin("a"));

        pool.remove(connection);
        let fresh = waiting.await.unwrap();
        assert!(!fresh.is_open());
        assert_eq!(pool.stats().per_origin[&origin("a")], 1);
    }

    #[tokio::test]
    async fn demoted_origin_opens_serial_connections() {
        let pool = pool(4, 4);
        let idle = pool.checkout(origin("a")).await.unwrap();
        assert!(idle.is_pipelined());
        pool.release(idle);

        pool.demote(&origin("a"));
        assert!(pool.is_demoted(&origin("a")));
        assert!(!pool.checkout(origin("a")).await.unwrap().is_pipelined());
        assert!(!pool.checkout(origin("a")).await.unwrap().is_pipelined());
        assert!(pool.checkout(origin("b")).await.unwrap().is_pipelined());
    }

    #[tokio::test]
    async fn stale_idle_connections_are_closed() {
        let pool = Pool::new(Config::builder().idle_timeout(Duration::from_millis(20)).build().unwrap());
        let connection = pool.checkout(origin("a")).await.unwrap();
        let id = connection.id();
        pool.release(connection);

        std::thread::sleep(Duration::from_millis(40));
        let connection = pool.checkout(origin("a")).await.unwrap();
        assert_ne!(connection.id(), id);
        assert_eq!(pool.stats().per_origin[&origin("a")], 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_respect_caps() {
        let pool = pool(5, 2);
        let origins = ["a", "b", "c", "d"];

        let tasks = (0..64)
            .map(|i| {
                let pool = pool.clone();
                let origin = origin(origins[i % origins.len()]);
                tokio::spawn(async move {
                    let connection = pool.checkout(origin).await.unwrap();
                    assert_capacity(&pool);
                    tokio::task::yield_now().await;
                    if i % 3 == 0 { pool.remove(connection) } else { pool.release(connection) }
                    assert_capacity(&pool);
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(pool.stats().used, 0);
        assert_eq!(pool.stats().waiting, 0);
    }
}
