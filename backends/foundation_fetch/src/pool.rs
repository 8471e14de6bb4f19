//! Connection pooling for keep-alive reuse.
//!
//! WHY: Reusing TCP (and TLS) connections across sequential requests to the same
//! host avoids a handshake per request.
//!
//! WHAT: A bounded, thread-safe pool keyed by `host:port`. Each address keeps a
//! stack of idle connections: `checkout` pops the most recently returned one
//! (LIFO), `checkin` pushes one back unless the address is already at capacity,
//! and `evict` drops every idle connection for an address.
//!
//! HOW: A single `Mutex` guards the whole address map and is held only for the
//! in-memory update. Connections are closed by dropping them, so an overflowing
//! checkin or an eviction closes the socket immediately. The pool never probes
//! liveness; a dead connection shows up as an I/O error on its next use.

use crate::connection::HttpConnection;
use std::collections::HashMap;
use std::sync::Mutex;

/// Maximum idle connections kept per address.
pub const MAX_IDLE_PER_HOST: usize = 6;

/// Per-address LIFO store of idle connections.
///
/// Generic over the connection type so the pooling rules can be exercised with
/// lightweight stand-ins; the fetcher uses [`HttpConnection`].
pub struct ConnectionPool<C = HttpConnection> {
    max_per_host: usize,
    inner: Mutex<HashMap<String, Vec<C>>>,
}

impl<C> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // If the lock is poisoned, avoid panicking and represent the pools as "<poisoned>".
        match self.inner.lock() {
            Ok(map) => {
                let pools: Vec<(String, usize)> = map
                    .iter()
                    .map(|(address, idle)| (address.clone(), idle.len()))
                    .collect();

                f.debug_struct("ConnectionPool")
                    .field("max_per_host", &self.max_per_host)
                    .field("pools", &pools)
                    .finish()
            }
            Err(_) => f
                .debug_struct("ConnectionPool")
                .field("max_per_host", &self.max_per_host)
                .field("pools", &"<poisoned>")
                .finish(),
        }
    }
}

impl<C> Default for ConnectionPool<C> {
    fn default() -> Self {
        Self::new(MAX_IDLE_PER_HOST)
    }
}

impl<C> ConnectionPool<C> {
    /// Creates a pool keeping at most `max_per_host` idle connections per address.
    #[must_use]
    pub fn new(max_per_host: usize) -> Self {
        Self {
            max_per_host,
            inner: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn max_per_host(&self) -> usize {
        self.max_per_host
    }

    /// Takes the most recently checked-in connection for `address`.
    ///
    /// Returns `None` when nothing is idle, telling the caller to connect.
    #[must_use]
    pub fn checkout(&self, address: &str) -> Option<C> {
        let Ok(mut map) = self.inner.lock() else {
            return None; // poisoned lock; treat as empty pool
        };

        let idle = map.get_mut(address)?;
        let conn = idle.pop();
        let remaining = idle.len();
        if remaining == 0 {
            map.remove(address);
        }

        if conn.is_some() {
            tracing::debug!("Reusing connection to {address} (remaining: {remaining})");
        }
        conn
    }

    /// Returns a connection to the pool.
    ///
    /// If `address` already holds `max_per_host` idle connections the returned
    /// one is closed instead of stored.
    pub fn checkin(&self, address: &str, conn: C) {
        let overflow = {
            let Ok(mut map) = self.inner.lock() else {
                return; // poisoned lock; drop stream
            };

            let idle = map.entry(address.to_string()).or_default();
            if idle.len() < self.max_per_host {
                idle.push(conn);
                tracing::debug!(
                    "Stored connection to {address} ({}/{})",
                    idle.len(),
                    self.max_per_host
                );
                None
            } else {
                Some(conn)
            }
        };

        // Closing happens after the guard is released.
        if let Some(conn) = overflow {
            drop(conn);
            tracing::debug!(
                "Pool full, closed connection to {address} ({0}/{0})",
                self.max_per_host
            );
        }
    }

    /// Closes and removes every idle connection for `address`.
    ///
    /// Returns how many connections were closed.
    pub fn evict(&self, address: &str) -> usize {
        let removed = match self.inner.lock() {
            Ok(mut map) => map.remove(address).unwrap_or_default(),
            Err(_) => return 0,
        };

        let closed = removed.len();
        drop(removed);
        tracing::debug!("Closed all idle connections to {address} ({closed})");
        closed
    }

    /// Number of idle connections currently held for `address`.
    #[must_use]
    pub fn idle_count(&self, address: &str) -> usize {
        self.inner
            .lock()
            .map(|map| map.get(address).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Closes every idle connection for every address.
    pub fn clear(&self) {
        let drained = match self.inner.lock() {
            Ok(mut map) => std::mem::take(&mut *map),
            Err(_) => return,
        };
        drop(drained);
    }
}
