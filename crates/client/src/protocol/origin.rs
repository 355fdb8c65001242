use std::fmt;

use http::Uri;

use crate::Error;

/// The destination a connection is opened to.
///
/// Scheme and host are stored lowercase, missing ports fall back to the scheme default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: u16,
}

impl Origin {
    pub fn new(scheme: &str, host: &str, port: u16) -> Self {
        Self { scheme: scheme.to_ascii_lowercase(), host: host.to_ascii_lowercase(), port }
    }

    /// Extracts the origin of an absolute URI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] if the URI has no scheme or host, or uses a scheme without
    /// a default port and names none.
    pub fn from_uri(uri: &Uri) -> Result<Self, Error> {
        let scheme = uri.scheme_str().ok_or_else(|| Error::invalid_uri(uri, "missing scheme"))?;
        let host = uri.host().filter(|host| !host.is_empty()).ok_or_else(|| Error::invalid_uri(uri, "missing host"))?;

        let port = match (uri.port_u16(), scheme.to_ascii_lowercase().as_str()) {
            (Some(port), _) => port,
            (None, "http") => 80,
            (None, "https") => 443,
            (None, other) => return Err(Error::invalid_uri(uri, format!("no default port for scheme {other}"))),
        };

        Ok(Self::new(scheme, host, port))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl TryFrom<&Uri> for Origin {
    type Error = Error;

    fn try_from(uri: &Uri) -> Result<Self, Self::Error> {
        Origin::from_uri(uri)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
