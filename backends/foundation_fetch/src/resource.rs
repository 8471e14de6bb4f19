//! Scheme dispatch for everything a caller can ask to load.
//!
//! Only the http(s) variant goes through the fetch engine; the others are thin
//! I/O wrappers. The set of schemes is closed, so it is an enum and a `match`
//! rather than a registry of loaders.

use crate::dns::DnsResolver;
use crate::endpoint::Endpoint;
use crate::errors::ResourceError;
use crate::fetcher::HttpFetcher;
use base64::Engine;
use percent_encoding::percent_decode_str;
use std::path::PathBuf;

const VIEW_SOURCE_PREFIX: &str = "view-source:";
const DATA_PREFIX: &str = "data:";
const FILE_PREFIX: &str = "file://";

/// A loadable resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// `file://<path>`
    File(PathBuf),
    /// `data:[<media type>][;base64],<payload>`
    Data {
        media_type: String,
        base64: bool,
        payload: String,
    },
    /// `http://…` or `https://…`
    Http(Endpoint),
    /// `view-source:<inner>`: the inner resource's raw text, not rendered.
    ViewSource(Box<Resource>),
}

impl Resource {
    /// Parses a resource string.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::UnsupportedScheme`] for unknown schemes
    /// - [`ResourceError::MalformedData`] for a data URL without a comma
    /// - [`ResourceError::InvalidUrl`] for an empty `view-source:` target
    /// - [`ResourceError::Fetch`] for an http(s) URL that does not parse
    pub fn parse(input: &str) -> Result<Self, ResourceError> {
        if let Some(inner) = input.strip_prefix(VIEW_SOURCE_PREFIX) {
            if inner.is_empty() {
                return Err(ResourceError::InvalidUrl(input.to_string()));
            }
            return Ok(Self::ViewSource(Box::new(Self::parse(inner)?)));
        }

        if let Some(rest) = input.strip_prefix(DATA_PREFIX) {
            let (metadata, payload) = rest
                .split_once(',')
                .ok_or_else(|| ResourceError::MalformedData("missing comma".into()))?;
            let (media_type, base64) = match metadata.strip_suffix(";base64") {
                Some(media_type) => (media_type, true),
                None => (metadata, false),
            };
            return Ok(Self::Data {
                media_type: media_type.to_string(),
                base64,
                payload: payload.to_string(),
            });
        }

        if let Some(path) = input.strip_prefix(FILE_PREFIX) {
            return Ok(Self::File(PathBuf::from(path)));
        }

        if input.starts_with("http://") || input.starts_with("https://") {
            return Ok(Self::Http(Endpoint::parse(input)?));
        }

        let scheme = input.split_once(':').map_or(input, |(scheme, _)| scheme);
        Err(ResourceError::UnsupportedScheme(scheme.to_string()))
    }

    /// Whether the caller should show this resource's text without rendering.
    #[must_use]
    pub fn is_view_source(&self) -> bool {
        matches!(self, Self::ViewSource(_))
    }

    /// Loads the resource's text; http(s) goes through `fetcher`.
    ///
    /// # Errors
    ///
    /// File read failures, invalid base64 payloads and fetch errors.
    pub fn load<R: DnsResolver>(&self, fetcher: &HttpFetcher<R>) -> Result<String, ResourceError> {
        match self {
            Self::File(path) => {
                let bytes = std::fs::read(path).map_err(|source| ResourceError::FileRead {
                    path: path.display().to_string(),
                    source,
                })?;
                tracing::debug!("Read file {}", path.display());
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Self::Data {
                base64: true,
                payload,
                ..
            } => {
                let decoded = base64::engine::general_purpose::STANDARD.decode(payload)?;
                Ok(String::from_utf8_lossy(&decoded).into_owned())
            }
            Self::Data { payload, .. } => {
                // Form-style escaping: `+` is a space, `%2B` a literal plus.
                let spaced = payload.replace('+', " ");
                Ok(percent_decode_str(&spaced).decode_utf8_lossy().into_owned())
            }
            Self::Http(endpoint) => Ok(fetcher.fetch(endpoint)?),
            Self::ViewSource(inner) => inner.load(fetcher),
        }
    }
}

impl std::str::FromStr for Resource {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
