use bytes::{Bytes, BytesMut};

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{RequestEncoder, ResponseDecoder};
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHead, ResponseHead, SendError};

use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, trace};

type RequestMessage = Message<(RequestHead, PayloadSize), Bytes>;

/// A client side HTTP/1.1 connection.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct ClientConnection<R, W> {
    framed_read: FramedRead<R, ResponseDecoder>,
    framed_write: FramedWrite<W, RequestEncoder>,
    reusable: bool,
}

impl<R, W> ClientConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, ResponseDecoder::new(), 8 * 1024),
            framed_write: FramedWrite::new(writer, RequestEncoder::new()),
            reusable: true,
        }
    }

    /// Whether another request may follow on this connection.
    ///
    /// Turns false for good once a response asked to close the connection, was delimited by
    /// the connection close, or could not be read completely.
    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    /// Performs one exchange: writes the request and reads the complete response.
    pub async fn send(&mut self, head: RequestHead, body: Option<Bytes>) -> Result<(ResponseHead, Bytes), HttpError> {
        if let Err(e) = self.write_request(head, body).await {
            self.reusable = false;
            return Err(e.into());
        }
        self.read_response().await
    }

    /// Writes a request and flushes it.
    ///
    /// Responses must be read back with [`read_response`](Self::read_response) in the order
    /// the requests were written.
    pub async fn write_request(&mut self, head: RequestHead, body: Option<Bytes>) -> Result<(), SendError> {
        let payload_size = match &body {
            Some(bytes) => PayloadSize::new_length(bytes.len() as u64),
            None => PayloadSize::new_empty(),
        };
        trace!(method = %head.method(), uri = %head.uri(), ?payload_size, "write request");

        self.framed_read.decoder_mut().expect_response_to(head.method());

        self.framed_write.feed(RequestMessage::Header((head, payload_size))).await?;
        if let Some(bytes) = body.filter(|bytes| !bytes.is_empty()) {
            self.framed_write.feed(RequestMessage::Payload(PayloadItem::Chunk(bytes))).await?;
        }
        // send flushes the underlying IO after the EOF marker
        self.framed_write.send(RequestMessage::Payload(PayloadItem::Eof)).await
    }

    /// Reads the next response and its whole body.
    pub async fn read_response(&mut self) -> Result<(ResponseHead, Bytes), HttpError> {
        let result = self.do_read_response().await;
        match &result {
            Ok((head, _)) => self.reusable &= head.keep_alive(),
            Err(_) => self.reusable = false,
        }
        result
    }

    async fn do_read_response(&mut self) -> Result<(ResponseHead, Bytes), HttpError> {
        let head = match self.framed_read.next().await {
            Some(Ok(Message::Header((head, payload_size)))) => {
                debug!(status = %head.status(), ?payload_size, "receive response head");
                if payload_size.is_until_close() {
                    self.reusable = false;
                }
                head
            }
            Some(Ok(Message::Payload(_))) => {
                error!("receive payload while waiting for a response head");
                return Err(ParseError::invalid_body("payload before response head").into());
            }
            Some(Err(e)) => {
                error!("can't read response head, cause {}", e);
                return Err(e.into());
            }
            None => {
                debug!("connection closed before a response head arrived");
                return Err(ParseError::Incomplete.into());
            }
        };

        let mut body = BytesMut::new();
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => body.extend_from_slice(&bytes),
                Some(Ok(Message::Payload(PayloadItem::Eof))) => break,
                Some(Ok(Message::Header(_))) => {
                    error!("receive response head while reading a body");
                    return Err(ParseError::invalid_body("response head inside body").into());
                }
                Some(Err(e)) => {
                    error!("can't read response body, cause {}", e);
                    return Err(e.into());
                }
                None => return Err(ParseError::Incomplete.into()),
            }
        }

        trace!(len = body.len(), "response body complete");
        Ok((head, body.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Request, StatusCode};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex, split};

    fn get(uri: &str) -> RequestHead {
        RequestHead::from(Request::get(uri).body(()).unwrap())
    }

    #[tokio::test]
    async fn exchange_over_duplex() {
        let (client, mut server) = duplex(4096);
        let (reader, writer) = split(client);
        let mut connection = ClientConnection::new(reader, writer);

        let server_task = tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            let n = server.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await.unwrap();
            request
        });

        let head = RequestHead::from(Request::post("http://localhost:9000/echo").body(()).unwrap());
        let (response, body) = connection.send(head, Some(Bytes::from_static(b"ping"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.keep_alive());
        assert_eq!(&body[..], b"ok");

        let request = server_task.await.unwrap();
        assert!(request.starts_with("POST /echo HTTP/1.1\r\n"));
        assert!(request.contains("host: localhost:9000\r\n"));
        assert!(request.ends_with("\r\n\r\nping"));
    }

    #[tokio::test]
    async fn pipelined_requests_read_in_order() {
        let (client, mut server) = duplex(4096);
        let (reader, writer) = split(client);
        let mut connection = ClientConnection::new(reader, writer);

        connection.write_request(get("http://localhost/a"), None).await.unwrap();
        connection.write_request(get("http://localhost/b"), None).await.unwrap();

        server
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\naHTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nb")
            .await
            .unwrap();

        let (_, first) = connection.read_response().await.unwrap();
        let (_, second) = connection.read_response().await.unwrap();
        assert_eq!(&first[..], b"a");
        assert_eq!(&second[..], b"b");
        assert!(connection.is_reusable());
    }

    #[tokio::test]
    async fn pipelined_head_is_framed_without_body() {
        let (client, mut server) = duplex(4096);
        let (reader, writer) = split(client);
        let mut connection = ClientConnection::new(reader, writer);

        let head = RequestHead::from(Request::head("http://localhost/a").body(()).unwrap());
        connection.write_request(head, None).await.unwrap();
        connection.write_request(get("http://localhost/b"), None).await.unwrap();

        server
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nb")
            .await
            .unwrap();

        let (first_head, first) = connection.read_response().await.unwrap();
        assert_eq!(first_head.headers().get("content-length").unwrap(), "5");
        assert!(first.is_empty());

        let (_, second) = connection.read_response().await.unwrap();
        assert_eq!(&second[..], b"b");
        assert!(connection.is_reusable());
    }

    #[tokio::test]
    async fn close_delimited_response() {
        let (client, mut server) = duplex(4096);
        let (reader, writer) = split(client);
        let mut connection = ClientConnection::new(reader, writer);

        tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            let _ = server.read(&mut buf).await.unwrap();
            server.write_all(b"HTTP/1.0 200 OK\r\n\r\nuntil the end").await.unwrap();
            server.shutdown().await.unwrap();
        });

        let (response, body) = connection.send(get("http://localhost/"), None).await.unwrap();
        assert!(!response.keep_alive());
        assert!(!connection.is_reusable());
        assert_eq!(&body[..], b"until the end");
    }

    #[tokio::test]
    async fn closed_before_response() {
        let (client, server) = duplex(4096);
        let (reader, writer) = split(client);
        let mut connection = ClientConnection::new(reader, writer);
        drop(server);

        let result = connection.read_response().await;
        assert!(matches!(result, Err(HttpError::ResponseError { source: ParseError::Incomplete })));
        assert!(!connection.is_reusable());
    }
}
