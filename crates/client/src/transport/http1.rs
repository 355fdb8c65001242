//! Plain TCP HTTP/1.1 transport built on `restline-http`.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderValue, header};
use restline_http::connection::ClientConnection;
use restline_http::protocol::RequestHead;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, warn};

use crate::Error;
use crate::protocol::{Origin, Request};
use crate::transport::{Exchange, Outcome, Transport, TransportConnection};

/// Speaks HTTP/1.1 over plain TCP, `https` origins are refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct Http1Transport;

impl Http1Transport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for Http1Transport {
    async fn connect(&self, origin: &Origin) -> io::Result<Box<dyn TransportConnection>> {
        if origin.scheme() != "http" {
            return Err(io::Error::new(io::ErrorKind::Unsupported, format!("scheme {} is not supported", origin.scheme())));
        }

        let stream = TcpStream::connect((origin.host(), origin.port())).await?;
        stream.set_nodelay(true)?;
        debug!(%origin, local_addr = ?stream.local_addr().ok(), "connected");

        let (reader, writer) = stream.into_split();
        Ok(Box::new(Http1Connection { connection: ClientConnection::new(reader, writer) }))
    }
}

#[derive(Debug)]
struct Http1Connection {
    connection: ClientConnection<OwnedReadHalf, OwnedWriteHalf>,
}

#[async_trait]
impl TransportConnection for Http1Connection {
    async fn send(&mut self, request: &Arc<Request>) -> Outcome {
        let head = match request_head(request) {
            Ok(head) => head,
            Err(e) => return Outcome::Fatal(Error::network(Arc::clone(request), format!("can't encode request: {e}"))),
        };

        match self.connection.send(head, request.body().cloned()).await {
            Ok((head, body)) => {
                let keep_alive = self.connection.is_reusable();
                let parts = head.into_parts();
                Outcome::Success(Exchange { status: parts.status, headers: parts.headers, body, keep_alive })
            }
            Err(e) if e.is_unsendable() => Outcome::Fatal(Error::network(Arc::clone(request), e)),
            Err(e) => {
                warn!(cause = %e, "exchange failed");
                Outcome::Retryable(Error::network(Arc::clone(request), e))
            }
        }
    }
}

fn request_head(request: &Request) -> Result<RequestHead, http::Error> {
    let mut builder = http::Request::builder().method(request.method().clone()).uri(request.uri().clone());

    if let Some(headers) = builder.headers_mut() {
        headers.extend(request.headers().clone());
        if !headers.contains_key(header::CONNECTION) {
            headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        }
    }

    Ok(RequestHead::from(builder.body(())?))
}
