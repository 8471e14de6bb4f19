use derive_more::From;
use std::io;

/// Errors raised while framing a request or parsing a response.
///
/// Any of these leaves the connection in an unknown protocol state, so the
/// caller must close it rather than return it to the pool.
#[derive(From, Debug)]
pub enum CodecError {
    /// The status line had fewer than two tokens.
    #[from(ignore)]
    MalformedStatusLine(String),

    /// The second status-line token was not a non-negative integer.
    #[from(ignore)]
    InvalidStatusCode(String),

    /// The `Content-Length` value was not a non-negative integer.
    #[from(ignore)]
    InvalidContentLength(String),

    /// A chunk-size line was not a hexadecimal number.
    #[from(ignore)]
    InvalidChunkSize(String),

    /// A chunk's data was not followed by a line break.
    MissingChunkTerminator,

    /// The peer closed the stream before the status line arrived.
    EmptyResponse,

    /// The stream ended before the blank line closing the header block.
    TruncatedHeaders,

    /// Reading from or writing to the stream failed.
    #[from]
    Io(io::Error),
}

impl std::error::Error for CodecError {}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedStatusLine(line) => write!(f, "Malformed status line: {line:?}"),
            Self::InvalidStatusCode(code) => write!(f, "Invalid status code: {code:?}"),
            Self::InvalidContentLength(value) => {
                write!(f, "Invalid Content-Length: {value:?}")
            }
            Self::InvalidChunkSize(line) => write!(f, "Invalid chunk size: {line:?}"),
            Self::MissingChunkTerminator => {
                write!(f, "Chunk data was not terminated by a line break")
            }
            Self::EmptyResponse => write!(f, "Connection closed before a status line was read"),
            Self::TruncatedHeaders => {
                write!(f, "Connection closed before the end of the response headers")
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

/// DNS resolution errors.
///
/// These errors occur during DNS hostname resolution.
#[derive(From, Debug)]
pub enum DnsError {
    /// Invalid hostname provided.
    #[from(ignore)]
    InvalidHost(String),

    /// No addresses found for the given hostname.
    #[from(ignore)]
    NoAddressesFound(String),

    /// I/O error during DNS resolution.
    #[from(ignore)]
    IoError(String),
}

impl From<io::Error> for DnsError {
    fn from(err: io::Error) -> Self {
        DnsError::IoError(err.to_string())
    }
}

impl std::error::Error for DnsError {}

impl core::fmt::Display for DnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidHost(host) => write!(f, "Invalid hostname: {host}"),
            Self::NoAddressesFound(host) => write!(f, "No addresses found for host: {host}"),
            Self::IoError(err) => write!(f, "I/O error during DNS resolution: {err}"),
        }
    }
}

/// Errors returned by [`crate::HttpFetcher::fetch`].
#[derive(From, Debug)]
pub enum FetchError {
    /// Parsing or framing failed on the named address.
    #[from(ignore)]
    Codec { address: String, source: CodecError },

    /// DNS resolution error.
    #[from]
    Dns(DnsError),

    /// TCP connect failed for every resolved address.
    #[from(ignore)]
    ConnectionFailed { address: String, reason: String },

    /// TLS handshake failed.
    #[from(ignore)]
    TlsHandshakeFailed { host: String, reason: String },

    /// A 3xx response carried no `Location` header.
    #[from(ignore)]
    MissingLocation { status: u16 },

    /// A `Location` value that is neither absolute http(s) nor root-relative.
    #[from(ignore)]
    UnsupportedLocation(String),

    /// A URL could not be turned into an http(s) endpoint.
    #[from(ignore)]
    InvalidEndpoint(String),

    /// The redirect chain was longer than the configured bound.
    #[from(ignore)]
    TooManyRedirects(usize),
}

impl FetchError {
    pub(crate) fn codec(address: impl Into<String>, source: CodecError) -> Self {
        Self::Codec {
            address: address.into(),
            source,
        }
    }

    /// Returns true when the error came from the redirect bound.
    #[must_use]
    pub fn is_redirect_limit(&self) -> bool {
        matches!(self, Self::TooManyRedirects(_))
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec { source, .. } => Some(source),
            Self::Dns(err) => Some(err),
            _ => None,
        }
    }
}

impl core::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Codec { address, source } => {
                write!(f, "HTTP exchange with {address} failed: {source}")
            }
            Self::Dns(err) => write!(f, "DNS error: {err}"),
            Self::ConnectionFailed { address, reason } => {
                write!(f, "Connection to {address} failed: {reason}")
            }
            Self::TlsHandshakeFailed { host, reason } => {
                write!(f, "TLS handshake with {host} failed: {reason}")
            }
            Self::MissingLocation { status } => write!(
                f,
                "Redirect response (status {status}) is missing the Location header"
            ),
            Self::UnsupportedLocation(location) => write!(
                f,
                "Unsupported Location format: {location:?} (expected absolute http(s) URL or root-relative path)"
            ),
            Self::InvalidEndpoint(url) => write!(f, "Invalid endpoint: {url}"),
            Self::TooManyRedirects(max) => {
                write!(f, "redirect limit exceeded (max {max} redirects)")
            }
        }
    }
}

/// Errors raised while loading a [`FetchConfig`](crate::FetchConfig).
#[derive(From, Debug)]
pub enum ConfigError {
    #[from]
    Toml(toml::de::Error),

    #[from(ignore)]
    Invalid(String),
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Toml(err) => write!(f, "Failed to parse fetch config: {err}"),
            Self::Invalid(msg) => write!(f, "Invalid fetch config: {msg}"),
        }
    }
}

/// Errors raised while parsing or loading a [`Resource`](crate::Resource).
#[derive(From, Debug)]
pub enum ResourceError {
    #[from(ignore)]
    UnsupportedScheme(String),

    #[from(ignore)]
    MalformedData(String),

    #[from(ignore)]
    InvalidUrl(String),

    #[from]
    Base64(base64::DecodeError),

    #[from(ignore)]
    FileRead { path: String, source: io::Error },

    #[from]
    Fetch(FetchError),
}

impl std::error::Error for ResourceError {}

impl core::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedScheme(scheme) => write!(f, "Unsupported scheme: {scheme}"),
            Self::MalformedData(msg) => write!(f, "Malformed data URL: {msg}"),
            Self::InvalidUrl(url) => write!(f, "Invalid URL: {url:?}"),
            Self::Base64(err) => write!(f, "Invalid base64 payload: {err}"),
            Self::FileRead { path, source } => write!(f, "Failed to read file {path}: {source}"),
            Self::Fetch(err) => write!(f, "{err}"),
        }
    }
}
