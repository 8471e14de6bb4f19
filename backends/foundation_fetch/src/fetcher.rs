//! Redirect-following fetch orchestrator.
//!
//! WHY: Callers want "give me the body of this endpoint"; caching, keep-alive
//! reuse and redirects are details they should not have to drive.
//!
//! WHAT: [`HttpFetcher::fetch`] checks the response cache, then runs at most
//! `max_redirects` exchanges, following 3xx `Location` headers, and stores the
//! final response in the cache when its headers allow it.
//!
//! HOW: The pool and cache are explicit `Arc`-shared instances, so several
//! fetchers (or threads) can share them and tests get isolated state. All I/O is
//! blocking and happens outside the pool/cache locks. A connection goes back to
//! the pool only after a fully successful exchange that left the stream at a
//! message boundary; on any failure it is dropped (closed).

use crate::cache::ResponseCache;
use crate::codec::{self, Response};
use crate::config::FetchConfig;
use crate::connection::{default_tls_config, HttpConnection};
use crate::dns::{DnsResolver, SystemDnsResolver};
use crate::endpoint::Endpoint;
use crate::errors::FetchError;
use crate::pool::ConnectionPool;
use crate::redirects::resolve_location;
use rustls::ClientConfig;
use std::sync::Arc;

/// HTTP(S) fetcher with keep-alive pooling, response caching and redirects.
///
/// # Type Parameters
///
/// * `R` - DNS resolver type implementing `DnsResolver` trait. Defaults to `SystemDnsResolver`.
///
/// # Examples
///
/// ```ignore
/// let fetcher = HttpFetcher::new();
/// let body = fetcher.fetch(&Endpoint::parse("http://example.org/")?)?;
/// ```
pub struct HttpFetcher<R: DnsResolver = SystemDnsResolver> {
    resolver: R,
    config: FetchConfig,
    pool: Arc<ConnectionPool>,
    cache: Arc<ResponseCache>,
    tls: Arc<ClientConfig>,
}

impl<R: DnsResolver> std::fmt::Debug for HttpFetcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl HttpFetcher<SystemDnsResolver> {
    /// Creates a fetcher with the system resolver, default config and fresh
    /// pool and cache.
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(SystemDnsResolver)
    }
}

impl Default for HttpFetcher<SystemDnsResolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DnsResolver> HttpFetcher<R> {
    /// Creates a fetcher with a custom DNS resolver.
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        let config = FetchConfig::default();
        Self {
            resolver,
            pool: Arc::new(ConnectionPool::new(config.max_idle_per_host)),
            cache: Arc::new(ResponseCache::new()),
            tls: default_tls_config(),
            config,
        }
    }

    /// Replaces the configuration.
    ///
    /// The pool is rebuilt with the new per-address cap; call
    /// [`Self::with_pool`] afterwards to share an existing pool instead.
    #[must_use]
    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.pool = Arc::new(ConnectionPool::new(config.max_idle_per_host));
        self.config = config;
        self
    }

    /// Shares an existing connection pool.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<ConnectionPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Shares an existing response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Uses a custom TLS client configuration.
    #[must_use]
    pub fn with_tls_config(mut self, tls: Arc<ClientConfig>) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Fetches `endpoint` and returns its body text.
    ///
    /// A fresh cache entry for the endpoint is returned without any network
    /// activity. Otherwise redirects are followed hop by hop, and the final
    /// (non-3xx) response is cached under the key of the endpoint originally
    /// requested.
    ///
    /// # Errors
    ///
    /// - transport and framing failures of any hop
    /// - [`FetchError::MissingLocation`] / [`FetchError::UnsupportedLocation`]
    ///   for unusable redirects
    /// - [`FetchError::TooManyRedirects`] when the hop bound is reached
    #[tracing::instrument(skip(self, endpoint), fields(endpoint = %endpoint))]
    pub fn fetch(&self, endpoint: &Endpoint) -> Result<String, FetchError> {
        let cache_key = endpoint.cache_key();
        if let Some(entry) = self.cache.lookup(&cache_key) {
            return Ok(entry.body);
        }

        let mut current = endpoint.clone();
        for hop in 1..=self.config.max_redirects {
            let response = self.exchange(&current)?;

            if !response.is_redirect() {
                self.cache
                    .store(&cache_key, response.status, &response.body, &response.headers);
                return Ok(response.body);
            }

            let location = response
                .headers
                .get("location")
                .ok_or(FetchError::MissingLocation {
                    status: response.status,
                })?;

            tracing::info!("Redirect {hop}: {} -> {location}", response.status);
            current = resolve_location(&current, location)?;
        }

        Err(FetchError::TooManyRedirects(self.config.max_redirects))
    }

    /// Runs one request/response exchange against `target`.
    fn exchange(&self, target: &Endpoint) -> Result<Response, FetchError> {
        let address = target.address();

        let mut conn = match self.pool.checkout(&address) {
            Some(conn) => conn,
            None => {
                tracing::debug!("Creating new connection to {address}");
                HttpConnection::connect(target, &self.resolver, &self.tls)?
            }
        };

        match codec::exchange(&mut conn, target, &self.config.user_agent) {
            Ok(response) => {
                if response.reusable {
                    self.pool.checkin(&address, conn);
                } else {
                    tracing::debug!("Connection to {address} not reusable, closing");
                    conn.close();
                }
                Ok(response)
            }
            Err(err) => {
                tracing::warn!("Exchange with {address} failed, closing connection: {err}");
                conn.close();
                Err(FetchError::codec(address, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: Explicit instances replace global state
    /// WHAT: Two fetchers sharing one cache see each other's entries
    #[test]
    fn test_shared_cache_between_fetchers() {
        let cache = Arc::new(ResponseCache::new());
        let first = HttpFetcher::new().with_cache(Arc::clone(&cache));
        let second = HttpFetcher::new().with_cache(Arc::clone(&cache));

        let endpoint = Endpoint::parse("http://cached.invalid/page").unwrap();
        cache.store(
            &endpoint.cache_key(),
            200,
            "from cache",
            &crate::codec::ResponseHeaders::new(),
        );

        assert_eq!(first.fetch(&endpoint).unwrap(), "from cache");
        assert_eq!(second.fetch(&endpoint).unwrap(), "from cache");
    }

    #[test]
    fn test_with_config_resizes_pool() {
        let config = FetchConfig {
            max_idle_per_host: 2,
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::new().with_config(config.clone());
        assert_eq!(fetcher.config(), &config);
        assert_eq!(fetcher.pool().max_per_host(), 2);
    }

    /// WHY: A zero hop bound can never reach a final response
    #[test]
    fn test_zero_redirect_bound_fails_without_network() {
        let config = FetchConfig {
            max_redirects: 0,
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::new().with_config(config);
        let endpoint = Endpoint::parse("http://never.invalid/").unwrap();
        assert!(fetcher.fetch(&endpoint).unwrap_err().is_redirect_limit());
    }
}
