//! Test infrastructure for the fetch engine.
//!
//! This crate provides:
//! - **HTTP test server**: a real localhost HTTP/1.1 server with scriptable
//!   responses, keep-alive support and request/connection counters
//!
//! # Examples
//!
//! ```rust
//! use foundation_testing::http::{HttpResponse, TestHttpServer};
//!
//! let server = TestHttpServer::with_response(|req| {
//!     if req.path == "/old" {
//!         HttpResponse::redirect("/new")
//!     } else {
//!         HttpResponse::ok("Final")
//!     }
//! });
//!
//! assert!(server.url("/old").starts_with("http://127.0.0.1:"));
//! assert_eq!(server.request_count(), 0);
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod http;
