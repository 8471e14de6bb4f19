//! HTTP(S) fetch engine for the ewe-platform project.
//!
//! WHY: Callers holding an already-parsed endpoint need a single blocking call that
//! returns the body text (or a typed error) while connection reuse, response caching
//! and redirect chains are handled for them.
//!
//! WHAT: A small HTTP/1.1 stack split into leaf components and one orchestrator:
//!
//! - [`codec`]: request framing and response parsing (chunked, sized and
//!   read-until-close bodies).
//! - [`pool`]: bounded, per-address LIFO store of idle keep-alive connections.
//! - [`cache`]: URL-keyed response cache driven by `Cache-Control`.
//! - [`fetcher`]: the redirect-following orchestrator tying the above together.
//! - [`resource`]: `file:`, `data:` and `view-source:` loading on top of the fetcher.
//!
//! HOW: Everything is synchronous. Shared state (pool and cache) lives behind one
//! mutex each and is injected into [`HttpFetcher`] instead of living in globals.

pub mod cache;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dns;
pub mod endpoint;
pub mod errors;
pub mod fetcher;
pub mod pool;
pub mod redirects;
pub mod resource;

pub use cache::{CacheEntry, CachePolicy, Clock, Freshness, ManualClock, ResponseCache, SystemClock};
pub use codec::{exchange, Response, ResponseHeaders};
pub use config::FetchConfig;
pub use connection::HttpConnection;
pub use dns::{DnsResolver, StaticSocketAddr, SystemDnsResolver};
pub use endpoint::{Endpoint, Scheme};
pub use errors::{CodecError, ConfigError, DnsError, FetchError, ResourceError};
pub use fetcher::HttpFetcher;
pub use pool::ConnectionPool;
pub use redirects::resolve_location;
pub use resource::Resource;
