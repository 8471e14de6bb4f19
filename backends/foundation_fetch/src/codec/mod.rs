//! HTTP/1.1 codec for a single GET exchange.
//!
//! WHY: Keep-alive only works if we know exactly where one response ends and the
//! next begins, so body framing has to be decoded precisely.
//!
//! WHAT: [`exchange`] writes one GET request to an open stream and parses one
//! response (status line, headers, body) back from it.
//!
//! HOW: The stream is any `BufRead + Write`. The caller owns the buffered reader
//! for the whole connection lifetime, so bytes read ahead of one response are
//! still there for the next exchange on the same connection.

mod body;
mod headers;
mod request;
mod status;

pub use body::{read_body, read_chunked_body, BodyFraming};
pub use headers::{read_headers, ResponseHeaders};
pub use request::{render_request, HTTP_VERSION};
pub use status::parse_status_line;

use crate::endpoint::Endpoint;
use crate::errors::CodecError;
use std::io::{BufRead, Write};

/// One parsed HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
    pub headers: ResponseHeaders,
    /// Whether the connection may carry another exchange.
    pub reusable: bool,
}

impl Response {
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Sends a GET request for `target` and reads the response from `stream`.
///
/// # Errors
///
/// Any write/read failure or malformed framing is returned as a [`CodecError`];
/// the connection must then be closed instead of reused.
pub fn exchange<S: BufRead + Write>(
    stream: &mut S,
    target: &Endpoint,
    user_agent: &str,
) -> Result<Response, CodecError> {
    let request = render_request(target, user_agent);
    stream.write_all(request.as_bytes())?;
    stream.flush()?;
    tracing::debug!("Request sent to {}: {} bytes", target.address(), request.len());

    read_response(stream)
}

/// Reads one response: status line, headers, then the framed body.
///
/// # Errors
///
/// Returns [`CodecError`] on I/O failure or malformed status/header/body framing.
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response, CodecError> {
    let status_line = read_line(reader)?.ok_or(CodecError::EmptyResponse)?;
    let status = parse_status_line(&status_line)?;
    let headers = read_headers(reader)?;

    let framing = BodyFraming::for_response(status, &headers)?;
    let (raw_body, clean_end) = read_body(reader, framing)?;

    let closing = headers
        .get("connection")
        .is_some_and(|value| value.to_ascii_lowercase().contains("close"));
    if closing {
        tracing::debug!("Server asked to close the connection");
    }

    Ok(Response {
        status,
        body: String::from_utf8_lossy(&raw_body).into_owned(),
        headers,
        reusable: clean_end && !closing,
    })
}

/// Reads one line, stripping the trailing `\r\n` or `\n`.
///
/// Returns `Ok(None)` if the stream ended before any byte was read.
pub(crate) fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, CodecError> {
    let mut buf = Vec::new();
    let read = reader.read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
