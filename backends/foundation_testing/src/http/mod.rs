//! HTTP test server utilities.
//!
//! WHY: Fetch engine tests need a real peer on a real socket to observe
//! keep-alive reuse, redirect chains and body framing end to end.
//!
//! WHAT: `TestHttpServer` for integration testing HTTP clients.
//!
//! HOW: Uses stdlib's `TcpListener` with manually crafted HTTP/1.1 responses.
//! Each accepted connection is served on its own thread until the client
//! closes it or a response ends the connection.

mod server;

pub use server::{BodyFraming, HttpRequest, HttpResponse, TestHttpServer};
