//! Fetches a few URLs concurrently through one pooled adapter.
//!
//! ```text
//! cargo run -p restline --example fetch -- http://127.0.0.1:8080/ http://127.0.0.1:8080/users
//! ```

use std::sync::Arc;
use std::time::Duration;

use restline::{Adapter, Config, PooledAdapter, Promise, Request};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let urls = std::env::args().skip(1).collect::<Vec<_>>();
    if urls.is_empty() {
        error!("usage: fetch <url>...");
        return;
    }

    let config = Config::builder().max_per_origin(2).build().expect("valid config");
    let adapter = PooledAdapter::new(config).expect("failed to start adapter");

    let mut promises = Vec::with_capacity(urls.len());
    for url in &urls {
        match Request::get(url).build() {
            Ok(request) => promises.push(adapter.execute(Arc::new(request))),
            Err(e) => error!(%url, cause = %e, "skip url"),
        }
    }

    let sizes = promises.iter().map(|promise| promise.then(|response| (response.uri().to_string(), response.code(), response.body().len())));
    match Promise::all(sizes.collect()).wait(Some(Duration::from_secs(30))) {
        Ok(results) => {
            for (uri, status, size) in results {
                info!(%uri, status, size, "fetched");
            }
        }
        Err(e) => error!(cause = %e, "fetch failed"),
    }

    info!(stats = ?adapter.pool_stats(), "done");
}
