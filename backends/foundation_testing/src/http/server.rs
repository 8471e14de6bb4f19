//! Test HTTP server implementation.
//!
//! WHY: Provides real HTTP server for integration tests without external dependencies.
//! Built on stdlib TCP with hand-crafted HTTP responses for simplicity.
//!
//! WHAT: `TestHttpServer` that listens on localhost, accepts requests, and sends responses.
//! It counts accepted connections and served requests so tests can assert on
//! connection reuse and on cache hits that never touch the network.
//!
//! HOW: Uses stdlib's `TcpListener` and threading with manually crafted HTTP/1.1 responses.
//! Connections are kept alive: a connection thread keeps reading requests until
//! the client closes, or until it sends a response whose framing requires
//! closing the connection.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

type ResponseHandler = Arc<Mutex<Box<dyn Fn(&HttpRequest) -> HttpResponse + Send>>>;

/// Idle connections are dropped after this long without a request.
const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Simple HTTP request representation for testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request target (e.g., "/test?x=1")
    pub path: String,
    /// HTTP version (e.g., "HTTP/1.1")
    pub proto: String,
    /// Request headers in arrival order
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Returns the first header value named `name`, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// How the server delimits a response body on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyFraming {
    /// `Content-Length` is added automatically.
    Sized,
    /// `Transfer-Encoding: chunked`, one chunk per entry.
    Chunked(Vec<Vec<u8>>),
    /// No length information; the server closes the connection after the body.
    UntilClose,
    /// `body` is written verbatim as the whole response and the connection is
    /// closed. Used for malformed responses.
    Raw,
}

/// Simple HTTP response representation for testing.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code (e.g., 200)
    pub status: u16,
    /// Status text (e.g., "OK")
    pub status_text: String,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
    /// Body delimitation
    pub framing: BodyFraming,
}

impl HttpResponse {
    /// Create 200 OK response with body.
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: body.into(),
            framing: BodyFraming::Sized,
        }
    }

    /// Create 302 redirect response.
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        Self::status(302, "Found").with_header("Location", location)
    }

    /// Create custom status response.
    #[must_use]
    pub fn status(code: u16, text: &str) -> Self {
        Self {
            status: code,
            status_text: text.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            framing: BodyFraming::Sized,
        }
    }

    /// Create 200 OK response sent with chunked transfer encoding.
    #[must_use]
    pub fn chunked<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            framing: BodyFraming::Chunked(chunks.into_iter().map(Into::into).collect()),
            ..Self::ok(Vec::new())
        }
    }

    /// Create 200 OK response whose body ends when the connection closes.
    #[must_use]
    pub fn until_close(body: impl Into<Vec<u8>>) -> Self {
        Self {
            framing: BodyFraming::UntilClose,
            ..Self::ok(body)
        }
    }

    /// Create a response that is exactly `bytes` on the wire.
    #[must_use]
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 0,
            status_text: String::new(),
            headers: Vec::new(),
            body: bytes.into(),
            framing: BodyFraming::Raw,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Whether the connection must be closed after this response.
    fn closes_connection(&self) -> bool {
        matches!(self.framing, BodyFraming::UntilClose | BodyFraming::Raw)
            || self.headers.iter().any(|(key, value)| {
                key.eq_ignore_ascii_case("connection") && value.eq_ignore_ascii_case("close")
            })
    }

    /// Render response to HTTP/1.1 format.
    fn render(&self) -> Vec<u8> {
        if self.framing == BodyFraming::Raw {
            return self.body.clone();
        }

        let mut response = format!("HTTP/1.1 {} {}\r\n", self.status, self.status_text);
        for (key, value) in &self.headers {
            response.push_str(&format!("{key}: {value}\r\n"));
        }

        match &self.framing {
            BodyFraming::Sized => {
                response.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));
                let mut bytes = response.into_bytes();
                bytes.extend_from_slice(&self.body);
                bytes
            }
            BodyFraming::Chunked(chunks) => {
                response.push_str("Transfer-Encoding: chunked\r\n\r\n");
                let mut bytes = response.into_bytes();
                for chunk in chunks.iter().filter(|chunk| !chunk.is_empty()) {
                    bytes.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                    bytes.extend_from_slice(chunk);
                    bytes.extend_from_slice(b"\r\n");
                }
                bytes.extend_from_slice(b"0\r\n\r\n");
                bytes
            }
            BodyFraming::UntilClose | BodyFraming::Raw => {
                response.push_str("\r\n");
                let mut bytes = response.into_bytes();
                bytes.extend_from_slice(&self.body);
                bytes
            }
        }
    }
}

/// Test HTTP server for integration testing.
///
/// # Purpose (WHY)
///
/// Provides a real HTTP server for testing HTTP clients without external dependencies.
/// Uses stdlib TCP with manually crafted HTTP responses for simplicity.
///
/// # What it does
///
/// Starts a local HTTP server on a random port, accepts incoming requests, and responds
/// with configurable responses. Runs in background thread to not block test execution.
///
/// # Examples
///
/// ```rust
/// use foundation_testing::http::TestHttpServer;
///
/// let server = TestHttpServer::start();
/// assert!(server.url("/test").ends_with("/test"));
/// // Server automatically stops when dropped
/// ```
pub struct TestHttpServer {
    addr: String,
    _handle: Option<thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
    connections: Arc<AtomicUsize>,
}

impl TestHttpServer {
    /// Start a new test HTTP server on random port.
    ///
    /// # Returns
    ///
    /// A running `TestHttpServer` that will respond with 200 OK to all requests.
    #[must_use]
    pub fn start() -> Self {
        Self::with_response(|_req| HttpResponse::ok("OK"))
    }

    /// Start server with custom response handler.
    ///
    /// # Purpose (WHY)
    ///
    /// Allows tests to customize server behavior for specific scenarios
    /// (redirects, errors, custom headers, etc.)
    ///
    /// # Panics
    ///
    /// Panics if no localhost port can be bound.
    #[must_use]
    pub fn with_response<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + 'static,
    {
        let listener =
            TcpListener::bind("127.0.0.1:0").expect("Failed to bind test HTTP server to localhost");
        let addr = listener
            .local_addr()
            .expect("bound listener has a local address")
            .to_string();

        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(AtomicUsize::new(0));
        let connections = Arc::new(AtomicUsize::new(0));
        let handler: ResponseHandler = Arc::new(Mutex::new(
            Box::new(handler) as Box<dyn Fn(&HttpRequest) -> HttpResponse + Send>
        ));

        let running_clone = Arc::clone(&running);
        let requests_clone = Arc::clone(&requests);
        let connections_clone = Arc::clone(&connections);

        let handle = thread::spawn(move || {
            // Set non-blocking so we can check running flag
            listener
                .set_nonblocking(true)
                .expect("Failed to set non-blocking");

            while running_clone.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, sock_addr)) => {
                        tracing::info!("Got a client connection: {sock_addr:?}");
                        connections_clone.fetch_add(1, Ordering::SeqCst);
                        let handler = Arc::clone(&handler);
                        let requests = Arc::clone(&requests_clone);
                        thread::spawn(move || {
                            if let Err(e) = Self::handle_connection(stream, &handler, &requests) {
                                tracing::info!("TestHttpServer connection error: {e}");
                            }
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(e) => {
                        tracing::info!("TestHttpServer accept error: {e}");
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            _handle: Some(handle),
            running,
            requests,
            connections,
        }
    }

    /// Get full URL for a path on this test server.
    ///
    /// # Returns
    ///
    /// Full URL string (e.g., "<http://127.0.0.1:54321/test>")
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Get base URL of this test server (e.g., "<http://127.0.0.1:54321>").
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The `ip:port` the server listens on.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.addr
    }

    /// The port the server listens on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr
            .rsplit(':')
            .next()
            .and_then(|port| port.parse().ok())
            .unwrap_or_default()
    }

    /// Number of requests answered so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of TCP connections accepted so far.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Serves requests on one connection until it closes.
    fn handle_connection(
        mut stream: TcpStream,
        handler: &ResponseHandler,
        requests: &AtomicUsize,
    ) -> std::io::Result<()> {
        stream.set_read_timeout(Some(IDLE_TIMEOUT))?;
        let mut reader = BufReader::new(stream.try_clone()?);

        while let Some(request) = Self::read_request(&mut reader)? {
            tracing::info!(
                "Received http request: method: {}, path: {}, proto: {}",
                request.method,
                request.path,
                request.proto,
            );

            let response = {
                let handler_guard = handler.lock().unwrap_or_else(PoisonError::into_inner);
                handler_guard(&request)
            };
            requests.fetch_add(1, Ordering::SeqCst);

            stream.write_all(&response.render())?;
            stream.flush()?;

            if response.closes_connection() {
                tracing::debug!("Closing connection after response");
                stream.shutdown(std::net::Shutdown::Both)?;
                break;
            }
        }

        Ok(())
    }

    /// Reads a request line and headers; `None` when the client closed.
    fn read_request(reader: &mut impl BufRead) -> std::io::Result<Option<HttpRequest>> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let mut parts = line.split_whitespace();
        let (Some(method), Some(path), Some(proto)) = (parts.next(), parts.next(), parts.next())
        else {
            tracing::error!("Malformed request line: {line:?}");
            return Ok(None);
        };
        let mut request = HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            proto: proto.to_string(),
            headers: Vec::new(),
        };

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let header = line.trim_end_matches(['\r', '\n']);
            if header.is_empty() {
                break;
            }
            if let Some((key, value)) = header.split_once(':') {
                request
                    .headers
                    .push((key.trim().to_string(), value.trim().to_string()));
            }
        }

        Ok(Some(request))
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        // Signal server thread to stop
        self.running.store(false, Ordering::Relaxed);
    }
}
