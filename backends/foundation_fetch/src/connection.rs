//! Connection management for the fetch engine.
//!
//! This module provides TCP/TLS connection establishment and the buffered
//! duplex stream that the pool stores between exchanges.

use crate::dns::DnsResolver;
use crate::endpoint::Endpoint;
use crate::errors::FetchError;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

/// Builds the default TLS client configuration: webpki trust roots, no client auth.
#[must_use]
pub fn default_tls_config() -> Arc<ClientConfig> {
    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

/// Plain or TLS transport underneath an [`HttpConnection`].
enum Transport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Transport {
    fn tcp(&self) -> &TcpStream {
        match self {
            Transport::Plain(stream) => stream,
            Transport::Tls(stream) => stream.get_ref(),
        }
    }
}

impl Read for Transport {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(inner) => inner.read(buf),
            Transport::Tls(inner) => inner.read(buf),
        }
    }
}

impl Write for Transport {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(inner) => inner.write(buf),
            Transport::Tls(inner) => inner.write(buf),
        }
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(inner) => inner.flush(),
            Transport::Tls(inner) => inner.flush(),
        }
    }
}

/// An open HTTP connection bound to one `host:port` address.
///
/// Reads go through a buffer that lives as long as the connection, so bytes
/// read past the end of one response stay available for the next one.
/// Dropping the connection closes the socket.
pub struct HttpConnection {
    address: String,
    stream: BufReader<Transport>,
}

impl std::fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.stream.get_ref() {
            Transport::Plain(_) => "plain",
            Transport::Tls(_) => "tls",
        };
        f.debug_struct("HttpConnection")
            .field("address", &self.address)
            .field("transport", &kind)
            .finish()
    }
}

impl HttpConnection {
    /// Establishes a connection to `endpoint`, upgrading to TLS for https.
    ///
    /// Every resolved address is tried in order; the last failure is reported
    /// if none accepts.
    ///
    /// # Errors
    ///
    /// Returns errors for:
    /// - DNS resolution failures
    /// - TCP connection failures
    /// - TLS handshake setup failures
    pub fn connect<R: DnsResolver>(
        endpoint: &Endpoint,
        resolver: &R,
        tls: &Arc<ClientConfig>,
    ) -> Result<Self, FetchError> {
        let address = endpoint.address();
        let addrs = resolver.resolve(endpoint.host(), endpoint.port())?;

        let mut last_error = None;
        let mut connected = None;
        for addr in addrs {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(err) => {
                    tracing::debug!("Connect to {addr} for {address} failed: {err}");
                    last_error = Some(err);
                }
            }
        }

        let Some(tcp) = connected else {
            let reason = last_error.map_or_else(
                || "no addresses resolved".to_string(),
                |err| err.to_string(),
            );
            return Err(FetchError::ConnectionFailed { address, reason });
        };

        let transport = if endpoint.scheme().is_https() {
            Self::upgrade_to_tls(tcp, endpoint.host(), tls)?
        } else {
            Transport::Plain(tcp)
        };

        tracing::info!("Opened new {} connection to {address}", endpoint.scheme());
        Ok(Self {
            address,
            stream: BufReader::new(transport),
        })
    }

    fn upgrade_to_tls(
        tcp: TcpStream,
        host: &str,
        tls: &Arc<ClientConfig>,
    ) -> Result<Transport, FetchError> {
        let handshake_error = |reason: String| FetchError::TlsHandshakeFailed {
            host: host.to_string(),
            reason,
        };

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| handshake_error(e.to_string()))?;
        let session = ClientConnection::new(Arc::clone(tls), server_name)
            .map_err(|e| handshake_error(e.to_string()))?;

        Ok(Transport::Tls(Box::new(StreamOwned::new(session, tcp))))
    }

    /// The `host:port` this connection is bound to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Shuts the socket down in both directions.
    ///
    /// Dropping the connection also closes it; this is for callers that want
    /// the peer to see the close before the value goes away.
    pub fn close(self) {
        if let Err(err) = self.stream.get_ref().tcp().shutdown(Shutdown::Both) {
            tracing::debug!("Shutdown of connection to {} failed: {err}", self.address);
        }
    }
}

impl Read for HttpConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl BufRead for HttpConnection {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.stream.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.stream.consume(amt);
    }
}

impl Write for HttpConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.get_mut().flush()
    }
}
