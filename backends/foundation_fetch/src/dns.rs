use crate::errors::DnsError;
use std::net::{SocketAddr, ToSocketAddrs};

/// Trait for DNS resolution.
///
/// Allows pluggable DNS resolvers for testing and customization.
pub trait DnsResolver: Send + Sync + Clone {
    /// Resolves a hostname and port to socket addresses.
    ///
    /// # Errors
    ///
    /// Returns `DnsError` if resolution fails.
    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, DnsError>;
}

/// Resolver that answers every lookup with one fixed socket address.
///
/// Useful for testing scenarios where a named host must land on a local server.
#[derive(Debug, Clone)]
pub struct StaticSocketAddr(SocketAddr);

impl Default for StaticSocketAddr {
    /// Returns the localhost address on port 80.
    fn default() -> Self {
        Self(SocketAddr::from(([127, 0, 0, 1], 80)))
    }
}

impl StaticSocketAddr {
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl DnsResolver for StaticSocketAddr {
    fn resolve(&self, _host: &str, _port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        Ok(vec![self.0])
    }
}

/// System DNS resolver using `std::net::ToSocketAddrs`.
///
/// This is the default resolver that uses the system's DNS resolver.
#[derive(Debug, Clone, Default)]
pub struct SystemDnsResolver;

impl SystemDnsResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DnsResolver for SystemDnsResolver {
    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        if host.is_empty() {
            return Err(DnsError::InvalidHost(host.to_string()));
        }

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(DnsError::from)?
            .collect();

        if addrs.is_empty() {
            return Err(DnsError::NoAddressesFound(host.to_string()));
        }

        Ok(addrs)
    }
}
