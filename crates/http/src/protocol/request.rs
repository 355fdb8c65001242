//! Outbound request head.
//!
//! Wraps `http::Request<()>`: the request line and header fields of a request that is about
//! to be encoded. The body travels separately as payload items.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

/// The head of an outbound HTTP request.
#[derive(Debug)]
pub struct RequestHead {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHead {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHead {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHead {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// The request target written on the request line.
    ///
    /// Absolute URIs are reduced to origin-form (`/path?query`), an empty path becomes `/`.
    pub fn request_target(&self) -> &str {
        match self.uri().path_and_query() {
            Some(path_and_query) if !path_and_query.as_str().is_empty() => path_and_query.as_str(),
            _ => "/",
        }
    }

    /// Whether a request with this method carries a body by convention.
    ///
    /// Methods that usually don't have bodies get no `content-length: 0` when the body is empty.
    pub fn expects_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT | &Method::TRACE)
    }
}

impl From<Parts> for RequestHead {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHead {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_form_target() {
        let head = RequestHead::from(Request::get("http://example.com/index/?a=1&b=2").body(()).unwrap());
        assert_eq!(head.request_target(), "/index/?a=1&b=2");

        let head = RequestHead::from(Request::get("http://example.com").body(()).unwrap());
        assert_eq!(head.request_target(), "/");
    }

    #[test]
    fn body_expectation_by_method() {
        let get = RequestHead::from(Request::get("/").body(()).unwrap());
        let post = RequestHead::from(Request::post("/").body(()).unwrap());
        let head = RequestHead::from(Request::head("/").body(()).unwrap());

        assert!(!get.expects_body());
        assert!(post.expects_body());
        assert!(!head.expects_body());
    }
}
