//! The background side of [`PooledAdapter`](crate::PooledAdapter).
//!
//! One OS thread drives a current thread runtime. Every job becomes a task of its own, so a
//! slow exchange never holds back the others.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use http::{StatusCode, Uri, header};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, debug, field, info_span, warn};

use crate::pool::Pool;
use crate::protocol::{Origin, Request, Response};
use crate::transport::{Exchange, Outcome, Transport};
use crate::{Error, Operation, Writer};

pub(crate) struct Job {
    pub(crate) request: Arc<Request>,
    pub(crate) writer: Writer<Response>,
}

pub(crate) fn spawn(pool: Pool, transport: Arc<dyn Transport>, receiver: mpsc::UnboundedReceiver<Job>) -> io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let context = Arc::new(Context { pool, transport });

    thread::Builder::new().name("restline-worker".into()).spawn(move || runtime.block_on(run(context, receiver)))
}

async fn run(context: Arc<Context>, mut receiver: mpsc::UnboundedReceiver<Job>) {
    debug!("adapter worker started");
    let tracker = TaskTracker::new();

    while let Some(job) = receiver.recv().await {
        let span = info_span!("http.request", method = %job.request.method(), url = %job.request.uri(), status = field::Empty);
        tracker.spawn(Arc::clone(&context).process(job).instrument(span));
    }

    tracker.close();
    debug!(in_flight = tracker.len(), "adapter closed, draining requests");
    tracker.wait().await;
    debug!("adapter worker stopped");
}

/// How one attempt on a connection ended, short of a final error.
enum Attempt {
    Done(Exchange),
    Failed { error: Error, pipelined: bool },
}

struct Context {
    pool: Pool,
    transport: Arc<dyn Transport>,
}

impl Context {
    async fn process(self: Arc<Self>, job: Job) {
        let Job { request, writer } = job;

        match self.perform(&request).await {
            Ok(response) => {
                Span::current().record("status", response.code());
                debug!(status = response.code(), body_size = response.body().len(), "request finished");
                writer.fulfill(response);
            }
            Err(e) => {
                warn!(cause = %e, "request failed");
                writer.reject(e);
            }
        }
    }

    /// Runs `request` to completion, following redirects.
    async fn perform(&self, request: &Arc<Request>) -> Result<Response, Error> {
        let max_redirects = self.pool.config().max_redirects();
        let mut current = Arc::clone(request);
        let mut redirects = 0;

        loop {
            let exchange = self.exchange_with_retry(&current).await?;

            if redirects < max_redirects
                && let Some(next) = follow(&current, &exchange)
            {
                redirects += 1;
                debug!(status = exchange.status.as_u16(), location = %next.uri(), redirects, "follow redirect");
                current = Arc::new(next);
                continue;
            }

            let Exchange { status, headers, body, .. } = exchange;
            return Ok(Response::new(Arc::clone(request), current.uri().clone(), status, headers, body));
        }
    }

    /// A failure on a pipelined connection demotes the origin and gets one more attempt.
    async fn exchange_with_retry(&self, request: &Arc<Request>) -> Result<Exchange, Error> {
        let origin = request.origin()?;

        match self.exchange_once(&origin, request).await? {
            Attempt::Done(exchange) => Ok(exchange),
            Attempt::Failed { error, pipelined: true } => {
                warn!(%origin, cause = %error, "pipelined connection failed, retry on a serial connection");
                self.pool.demote(&origin);
                match self.exchange_once(&origin, request).await? {
                    Attempt::Done(exchange) => Ok(exchange),
                    Attempt::Failed { error, .. } => Err(error),
                }
            }
            Attempt::Failed { error, .. } => Err(error),
        }
    }

    async fn exchange_once(&self, origin: &Origin, request: &Arc<Request>) -> Result<Attempt, Error> {
        let mut connection = self.pool.checkout(origin.clone()).await?;
        let pipelined = connection.is_pipelined();
        let connect_timeout = self.pool.config().connect_timeout();

        let exchange = connection.exchange(self.transport.as_ref(), request, connect_timeout);
        let outcome = tokio::time::timeout(request.timeout(), exchange).await;
        match outcome {
            Ok(Outcome::Success(exchange)) => {
                if connection.is_reusable() {
                    self.pool.release(connection);
                } else {
                    self.pool.remove(connection);
                }
                Ok(Attempt::Done(exchange))
            }
            Ok(Outcome::Retryable(error)) => {
                self.pool.remove(connection);
                Ok(Attempt::Failed { error, pipelined })
            }
            Ok(Outcome::Fatal(error)) => {
                self.pool.remove(connection);
                Err(error)
            }
            Err(_elapsed) => {
                debug!(id = connection.id(), timeout = ?request.timeout(), "exchange timed out");
                self.pool.remove(connection);
                Err(Error::timeout(Operation::Exchange { request: Arc::clone(request) }))
            }
        }
    }
}

/// The request a redirect response points to, if it should be followed.
fn follow(request: &Request, exchange: &Exchange) -> Option<Request> {
    let keep_method = match exchange.status {
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => true,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => request.method() == http::Method::GET,
        StatusCode::SEE_OTHER => false,
        _ => return None,
    };

    let location = exchange.headers.get(header::LOCATION)?;
    let Some(uri) = location.to_str().ok().and_then(|location| resolve(request.uri(), location)) else {
        warn!(?location, "redirect location can't be resolved, not following");
        return None;
    };
    if let Err(e) = Origin::from_uri(&uri) {
        warn!(%uri, cause = %e, "redirect target not supported, not following");
        return None;
    }

    Some(request.redirect(uri, keep_method))
}

/// Resolves a `Location` value against the URI of the request it answers.
fn resolve(base: &Uri, location: &str) -> Option<Uri> {
    let location = location.split('#').next().unwrap_or_default().trim();

    if location.contains("://") {
        return location.parse().ok();
    }
    if location.starts_with("//") {
        return format!("{}:{location}", base.scheme_str()?).parse().ok();
    }

    let path_and_query = if location.starts_with('/') {
        location.to_string()
    } else {
        let base_path = base.path();
        let directory = &base_path[..base_path.rfind('/').map_or(0, |index| index + 1)];
        if directory.is_empty() { format!("/{location}") } else { format!("{directory}{location}") }
    };

    Uri::builder().scheme(base.scheme()?.clone()).authority(base.authority()?.clone()).path_and_query(path_and_query).build().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, Method};

    fn exchange(status: StatusCode, location: &'static str) -> Exchange {
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static(location));
        Exchange { status, headers, body: Bytes::new(), keep_alive: true }
    }

    #[test]
    fn resolve_locations() {
        let base: Uri = "http://example.com:8080/api/users/1?x=1".parse().unwrap();

        assert_eq!(resolve(&base, "/login").unwrap(), "http://example.com:8080/login");
        assert_eq!(resolve(&base, "2?y=2").unwrap(), "http://example.com:8080/api/users/2?y=2");
        assert_eq!(resolve(&base, "//other.org/a").unwrap(), "http://other.org/a");
        assert_eq!(resolve(&base, "http://other.org/b#top").unwrap(), "http://other.org/b");
        assert!(resolve(&base, "http://bad host/").is_none());
    }

    #[test]
    fn redirect_methods() {
        let post = Request::post("http://example.com/items").body("a=1").build().unwrap();

        let see_other = follow(&post, &exchange(StatusCode::SEE_OTHER, "/items/1")).unwrap();
        assert_eq!(see_other.method(), Method::GET);
        assert!(see_other.body().is_none());

        let found = follow(&post, &exchange(StatusCode::FOUND, "/items/1")).unwrap();
        assert_eq!(found.method(), Method::GET);

        let temporary = follow(&post, &exchange(StatusCode::TEMPORARY_REDIRECT, "/items/1")).unwrap();
        assert_eq!(temporary.method(), Method::POST);
        assert_eq!(temporary.body(), Some(&Bytes::from_static(b"a=1")));
    }

    #[test]
    fn cross_origin_redirect_drops_credentials() {
        let request = Request::get("http://api.example.com/me")
            .header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"))
            .header(header::PROXY_AUTHORIZATION, HeaderValue::from_static("Basic cHJveHk="))
            .header(header::COOKIE, HeaderValue::from_static("session=1"))
            .build()
            .unwrap();

        let next = follow(&request, &exchange(StatusCode::FOUND, "http://evil.example.org/steal")).unwrap();
        assert_eq!(next.uri(), "http://evil.example.org/steal");
        assert!(next.headers().get(header::AUTHORIZATION).is_none());
        assert!(next.headers().get(header::PROXY_AUTHORIZATION).is_none());
        assert!(next.headers().get(header::COOKIE).is_none());

        let local = follow(&request, &exchange(StatusCode::FOUND, "/me/profile")).unwrap();
        assert_eq!(local.headers().get(header::AUTHORIZATION).unwrap(), "Bearer secret");
    }

    #[test]
    fn non_redirects_are_not_followed() {
        let get = Request::get("http://example.com/").build().unwrap();
        assert!(follow(&get, &exchange(StatusCode::OK, "/elsewhere")).is_none());
        assert!(follow(&get, &exchange(StatusCode::NOT_MODIFIED, "/elsewhere")).is_none());
        assert!(follow(&get, &exchange(StatusCode::FOUND, "ftp://example.com/")).is_none());
    }
}
