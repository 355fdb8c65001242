//! Runs the pooled adapter against a small HTTP/1.1 server on a local port.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, StatusCode, header};
use restline::{Adapter, Config, Error, PooledAdapter, Request};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

struct TestServer {
    address: String,
    accepted: Arc<AtomicUsize>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream));
            }
        });

        Self { address, accepted }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

async fn serve(stream: TcpStream) {
    let mut reader = BufReader::new(stream);

    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
            return;
        }

        let mut content_length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                return;
            }
            if line == "\r\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                content_length = value.trim().parse().unwrap();
            }
        }

        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).await.unwrap();

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();

        let (response, close) = match path.as_str() {
            "/hello" => (fixed("200 OK", "", b"hello"), false),
            "/echo" => (fixed("200 OK", &format!("X-Method: {method}\r\n"), &body), false),
            "/chunked" => ("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n".as_bytes().to_vec(), false),
            "/close" => (fixed("200 OK", "Connection: close\r\n", b"bye"), true),
            "/legacy" => ("HTTP/1.0 200 OK\r\n\r\nuntil close".as_bytes().to_vec(), true),
            "/moved" => (fixed("302 Found", "Location: /hello\r\n", b""), false),
            _ => (fixed("404 Not Found", "", b"missing"), false),
        };

        if reader.get_mut().write_all(&response).await.is_err() || close {
            return;
        }
    }
}

fn fixed(status: &str, headers: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!("HTTP/1.1 {status}\r\nContent-Length: {}\r\n{headers}\r\n", body.len()).into_bytes();
    response.extend_from_slice(body);
    response
}

fn get(url: String) -> Arc<Request> {
    Arc::new(Request::get(url).build().unwrap())
}

#[tokio::test]
async fn get_reuses_the_connection() {
    let server = TestServer::start().await;
    let adapter = PooledAdapter::new(Config::default()).unwrap();

    for _ in 0..3 {
        let request = get(server.url("/hello"));
        let response = adapter.execute(Arc::clone(&request)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), &Bytes::from_static(b"hello"));
        assert!(Arc::ptr_eq(response.request(), &request));
    }

    assert_eq!(server.accepted(), 1);
    assert_eq!(adapter.pool_stats().available, 1);
}

#[tokio::test]
async fn post_sends_body() {
    let server = TestServer::start().await;
    let adapter = PooledAdapter::new(Config::default()).unwrap();

    let request = Request::post(server.url("/echo"))
        .header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .body("ping")
        .build()
        .unwrap();
    let response = adapter.execute(Arc::new(request)).await.unwrap();

    assert_eq!(response.headers().get("x-method").unwrap(), "POST");
    assert_eq!(response.body(), &Bytes::from_static(b"ping"));
}

#[tokio::test]
async fn chunked_body_is_collected() {
    let server = TestServer::start().await;
    let adapter = PooledAdapter::new(Config::default()).unwrap();

    let response = adapter.execute(get(server.url("/chunked"))).await.unwrap();
    assert_eq!(response.body(), &Bytes::from_static(b"hello world"));
}

#[tokio::test]
async fn closing_peers_get_fresh_connections() {
    let server = TestServer::start().await;
    let adapter = PooledAdapter::new(Config::default()).unwrap();

    for path in ["/close", "/legacy", "/hello"] {
        let response = adapter.execute(get(server.url(path))).await.unwrap();
        assert!(response.is_success());
    }

    assert_eq!(server.accepted(), 3);
    let stats = adapter.pool_stats();
    assert_eq!(stats.available, 1);
    assert_eq!(stats.used, 0);
}

#[tokio::test]
async fn redirect_is_followed() {
    let server = TestServer::start().await;
    let adapter = PooledAdapter::new(Config::default()).unwrap();

    let response = adapter.execute(get(server.url("/moved"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.uri().path(), "/hello");
    assert_eq!(response.request().uri().path(), "/moved");
}

#[tokio::test]
async fn not_found_is_a_response() {
    let server = TestServer::start().await;
    let adapter = PooledAdapter::new(Config::default()).unwrap();

    let response = adapter.execute(get(server.url("/nothing"))).await.unwrap();
    assert_eq!(response.code(), 404);
    assert!(response.is_client_error());
}

#[test]
fn blocking_callers_can_wait() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(TestServer::start());
    let adapter = PooledAdapter::new(Config::default()).unwrap();

    let promises = (0..10).map(|_| adapter.execute(get(server.url("/hello")))).collect::<Vec<_>>();
    for promise in promises {
        assert_eq!(promise.wait(WAIT).unwrap().body(), &Bytes::from_static(b"hello"));
    }
    assert!(server.accepted() <= Config::default().max_per_origin());
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let adapter = PooledAdapter::new(Config::default()).unwrap();
    let error = adapter.execute(get(format!("http://{address}/"))).await.unwrap_err();

    assert!(error.is_network(), "{error:?}");
}

#[tokio::test]
async fn https_is_rejected() {
    let adapter = PooledAdapter::new(Config::default()).unwrap();
    let error = adapter.execute(get("https://localhost:8443/".to_string())).await.unwrap_err();

    assert!(matches!(error, Error::Network { .. }));
}
