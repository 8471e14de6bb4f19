//! Parsed http(s) endpoints.
//!
//! An [`Endpoint`] is the immutable target of one exchange: scheme, host, port
//! and request path (including any query string). It derives the pool key
//! (`host:port`) and the cache key (its canonical string form).

use crate::errors::FetchError;
use std::fmt;

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Transport scheme of an [`Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    #[must_use]
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => DEFAULT_HTTP_PORT,
            Self::Https => DEFAULT_HTTPS_PORT,
        }
    }

    #[must_use]
    pub fn is_https(&self) -> bool {
        matches!(self, Self::Https)
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An http(s) target: scheme, host, port and path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Creates an endpoint from already-separated parts.
    ///
    /// An empty path is normalised to `/`.
    #[must_use]
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if path.is_empty() {
            path.push('/');
        }
        Self {
            scheme,
            host: host.into(),
            port,
            path,
        }
    }

    /// Parses an absolute `http://` or `https://` URL.
    ///
    /// The query string, when present, is kept as part of the request path.
    /// Fragments never reach the wire and are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidEndpoint`] when the URL does not parse, has a
    /// scheme other than http/https, or has no host.
    pub fn parse(input: &str) -> Result<Self, FetchError> {
        let parsed = url::Url::parse(input)
            .map_err(|e| FetchError::InvalidEndpoint(format!("{input}: {e}")))?;

        let scheme = Scheme::from_name(parsed.scheme()).ok_or_else(|| {
            FetchError::InvalidEndpoint(format!("{input}: unsupported scheme {}", parsed.scheme()))
        })?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FetchError::InvalidEndpoint(format!("{input}: missing host")))?
            .to_string();

        let port = parsed.port().unwrap_or_else(|| scheme.default_port());

        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self::new(scheme, host, port, path))
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Pool key for this endpoint: `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `host` when the port is the scheme default, otherwise `host:port`.
    #[must_use]
    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            self.address()
        }
    }

    /// Cache key for this endpoint, its canonical string form.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority(), self.path)
    }
}

impl std::str::FromStr for Endpoint {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: Default ports must not leak into cache keys
    /// WHAT: http on 80 and https on 443 render without a port
    #[test]
    fn test_display_omits_default_port() {
        let http = Endpoint::parse("http://example.com/index.html").unwrap();
        assert_eq!(http.port(), 80);
        assert_eq!(http.to_string(), "http://example.com/index.html");

        let https = Endpoint::parse("https://example.com").unwrap();
        assert_eq!(https.port(), 443);
        assert_eq!(https.path(), "/");
        assert_eq!(https.to_string(), "https://example.com/");
    }

    /// WHY: Non-default ports are part of both keys
    /// WHAT: address and display both carry the explicit port
    #[test]
    fn test_explicit_port() {
        let endpoint = Endpoint::parse("http://127.0.0.1:8080/a?b=c").unwrap();
        assert_eq!(endpoint.address(), "127.0.0.1:8080");
        assert_eq!(endpoint.path(), "/a?b=c");
        assert_eq!(endpoint.cache_key(), "http://127.0.0.1:8080/a?b=c");
    }

    /// WHY: Only http(s) endpoints can be fetched
    /// WHAT: Other schemes are rejected with InvalidEndpoint
    #[test]
    fn test_rejects_other_schemes() {
        let err = Endpoint::parse("ftp://example.com/").unwrap_err();
        assert!(matches!(err, FetchError::InvalidEndpoint(_)));
        assert!(Endpoint::parse("not a url").is_err());
    }
}
