//! Inbound response head.
//!
//! Wraps `http::Response<()>` as produced by the response decoder, before the body is
//! attached.

use http::response::Parts;
use http::{HeaderMap, Response, StatusCode, Version, header};

/// The decoded status line and header fields of a response.
#[derive(Debug)]
pub struct ResponseHead {
    inner: Response<()>,
}

impl AsRef<Response<()>> for ResponseHead {
    fn as_ref(&self) -> &Response<()> {
        &self.inner
    }
}

impl ResponseHead {
    pub fn into_inner(self) -> Response<()> {
        self.inner
    }

    pub fn into_parts(self) -> Parts {
        self.inner.into_parts().0
    }

    /// Attaches a body, converting the head into a full `Response<T>`.
    pub fn body<T>(self, body: T) -> Response<T> {
        self.inner.map(|()| body)
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the peer allows the connection to be reused after this response.
    ///
    /// HTTP/1.1 connections are persistent unless `Connection: close` is present, HTTP/1.0
    /// connections only when `Connection: keep-alive` is present.
    pub fn keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;
        for value in self.headers().get_all(header::CONNECTION) {
            for token in value.as_bytes().split(|b| *b == b',') {
                let token = token.trim_ascii();
                close |= token.eq_ignore_ascii_case(b"close");
                keep_alive |= token.eq_ignore_ascii_case(b"keep-alive");
            }
        }

        match self.version() {
            Version::HTTP_11 => !close,
            _ => keep_alive && !close,
        }
    }
}

impl From<Response<()>> for ResponseHead {
    #[inline]
    fn from(inner: Response<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(version: Version, connection: Option<&str>) -> ResponseHead {
        let mut builder = Response::builder().version(version).status(StatusCode::OK);
        if let Some(value) = connection {
            builder = builder.header(header::CONNECTION, value);
        }
        ResponseHead::from(builder.body(()).unwrap())
    }

    #[test]
    fn keep_alive_by_version() {
        assert!(head(Version::HTTP_11, None).keep_alive());
        assert!(!head(Version::HTTP_11, Some("close")).keep_alive());
        assert!(!head(Version::HTTP_11, Some("Upgrade, Close")).keep_alive());

        assert!(!head(Version::HTTP_10, None).keep_alive());
        assert!(head(Version::HTTP_10, Some("Keep-Alive")).keep_alive());
    }
}
