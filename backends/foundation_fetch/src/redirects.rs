use crate::endpoint::Endpoint;
use crate::errors::FetchError;

/// Resolve a `Location` header value against the endpoint that returned it.
///
/// Supports:
/// - Absolute URI (`http://` or `https://`) -> parsed directly
/// - Absolute-path reference (starts with '/') -> resolved against the base's
///   scheme, host and port; the port is left out when it is the scheme default
///
/// # Errors
///
/// Returns `FetchError::UnsupportedLocation` for any other form (relative paths,
/// other schemes, query-only references) and `FetchError::InvalidEndpoint` when
/// the resolved URL does not parse.
pub fn resolve_location(base: &Endpoint, location: &str) -> Result<Endpoint, FetchError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Endpoint::parse(location);
    }

    if location.starts_with('/') {
        let candidate = format!("{}://{}{}", base.scheme(), base.authority(), location);
        return Endpoint::parse(&candidate);
    }

    Err(FetchError::UnsupportedLocation(location.to_string()))
}
