use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};

use crate::Error;
use crate::protocol::Origin;

/// Default time budget for one exchange and for blocking promise reads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Headers dropped when a redirect leaves the origin of the request
const SENSITIVE_HEADERS: [HeaderName; 3] = [http::header::AUTHORIZATION, http::header::PROXY_AUTHORIZATION, http::header::COOKIE];

/// An outbound HTTP request.
///
/// Requests are immutable once built. The adapter keeps the `Arc<Request>` handed to
/// [`Adapter::execute`](crate::Adapter::execute) and hands the very same pointer back in
/// [`Response::request`](crate::Response::request).
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Duration,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    pub fn get<T: AsRef<str>>(uri: T) -> RequestBuilder {
        RequestBuilder::new().uri(uri)
    }

    pub fn post<T: AsRef<str>>(uri: T) -> RequestBuilder {
        RequestBuilder::new().method(Method::POST).uri(uri)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The pool key of this request.
    ///
    /// # Errors
    ///
    /// Fails if the URI has no usable origin, which a built request never has.
    pub fn origin(&self) -> Result<Origin, Error> {
        Origin::from_uri(&self.uri)
    }

    /// Derives the request that follows a redirect to `uri`.
    ///
    /// With `keep_method` unset the new request is a body-less GET (or stays HEAD). Credentials
    /// are only kept while the redirect stays on the same origin.
    pub(crate) fn redirect(&self, uri: Uri, keep_method: bool) -> Request {
        let mut headers = self.headers.clone();
        headers.remove(http::header::HOST);

        if Origin::from_uri(&uri).ok() != self.origin().ok() {
            for name in SENSITIVE_HEADERS {
                headers.remove(name);
            }
        }

        if keep_method || self.method == Method::HEAD {
            return Request { uri, headers, ..self.clone() };
        }

        headers.remove(http::header::CONTENT_TYPE);
        headers.remove(http::header::CONTENT_LENGTH);
        Request { method: Method::GET, uri, headers, body: None, timeout: self.timeout }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    uri: Option<String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Duration,
}

impl RequestBuilder {
    fn new() -> Self {
        Self { method: Method::GET, uri: None, headers: HeaderMap::new(), body: None, timeout: DEFAULT_TIMEOUT }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn uri<T: AsRef<str>>(mut self, uri: T) -> Self {
        self.uri = Some(uri.as_ref().to_owned());
        self
    }

    /// Appends a header, existing values with the same name are kept.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the URI and builds the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] when the URI is missing, can't be parsed or is not
    /// absolute.
    pub fn build(self) -> Result<Request, Error> {
        let raw = self.uri.ok_or_else(|| Error::invalid_uri("", "uri must be set"))?;
        let uri = raw.parse::<Uri>().map_err(|e| Error::invalid_uri(&raw, e))?;
        Origin::from_uri(&uri)?;

        Ok(Request { method: self.method, uri, headers: self.headers, body: self.body, timeout: self.timeout })
    }
}
