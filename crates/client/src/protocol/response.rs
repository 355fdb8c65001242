use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Uri};

use crate::protocol::Request;

/// The result of a completed exchange.
///
/// A status of 400 and above is still a response; deciding whether it is an error is up to
/// the layers above.
#[derive(Debug, Clone)]
pub struct Response {
    request: Arc<Request>,
    uri: Uri,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(request: Arc<Request>, uri: Uri, status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self { request, uri, status, headers, body }
    }

    /// The request as passed to the adapter, even when redirects were followed.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// The effective URI the response was received from.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_redirection(&self) -> bool {
        self.status.is_redirection()
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }
}
