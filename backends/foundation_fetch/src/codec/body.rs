use super::{read_line, ResponseHeaders};
use crate::errors::CodecError;
use std::io::{self, BufRead, Read};

/// How the body of a response is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// 1xx, 204 and 304 responses carry no body.
    Empty,
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// `Content-Length: N`.
    Sized(usize),
    /// Neither header present: the body runs until the peer closes.
    UntilClose,
}

impl BodyFraming {
    /// Picks the framing for a response; the first matching rule wins.
    ///
    /// # Errors
    ///
    /// [`CodecError::InvalidContentLength`] when `Content-Length` is not a
    /// non-negative integer.
    pub fn for_response(status: u16, headers: &ResponseHeaders) -> Result<Self, CodecError> {
        if (100..200).contains(&status) || status == 204 || status == 304 {
            return Ok(Self::Empty);
        }

        let chunked = headers.get("transfer-encoding").is_some_and(|value| {
            value
                .rsplit(',')
                .next()
                .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        });
        if chunked {
            return Ok(Self::Chunked);
        }

        if let Some(value) = headers.get("content-length") {
            let digits = value.trim();
            let length = Some(digits)
                .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|d| d.parse::<usize>().ok())
                .ok_or_else(|| CodecError::InvalidContentLength(value.to_string()))?;
            return Ok(Self::Sized(length));
        }

        Ok(Self::UntilClose)
    }
}

/// Reads a body using the given framing.
///
/// Returns the raw bytes and whether the body ended at a clean message boundary,
/// i.e. whether the connection can carry another exchange.
///
/// # Errors
///
/// Returns [`CodecError`] on I/O failure, short reads or malformed chunks.
pub fn read_body<R: BufRead>(
    reader: &mut R,
    framing: BodyFraming,
) -> Result<(Vec<u8>, bool), CodecError> {
    match framing {
        BodyFraming::Empty => Ok((Vec::new(), true)),
        BodyFraming::Chunked => {
            let result = read_chunked_body(reader)?;
            tracing::debug!("Read chunked body ({} bytes)", result.0.len());
            Ok(result)
        }
        BodyFraming::Sized(length) => {
            let body = read_exact_bytes(reader, length)?;
            tracing::debug!("Read {length} bytes (Content-Length)");
            Ok((body, true))
        }
        BodyFraming::UntilClose => {
            tracing::debug!("No Content-Length or Transfer-Encoding, reading until close");
            let mut body = Vec::new();
            reader.read_to_end(&mut body)?;
            Ok((body, false))
        }
    }
}

/// Decodes a chunked body.
///
/// Each chunk is a hex size line (optionally followed by `;extensions`), exactly
/// that many bytes, then a line break. A zero-size chunk ends the body; any
/// trailer lines after it are read and discarded up to the blank line.
///
/// Returns the reassembled bytes and whether the trailer section was terminated
/// before the stream ended.
///
/// # Errors
///
/// [`CodecError::InvalidChunkSize`] for a non-hex size,
/// [`CodecError::MissingChunkTerminator`] when chunk data is not followed by a
/// line break, and [`CodecError::Io`] for short reads.
pub fn read_chunked_body<R: BufRead>(reader: &mut R) -> Result<(Vec<u8>, bool), CodecError> {
    let mut body = Vec::new();

    loop {
        let size_line = read_line(reader)?.ok_or_else(|| {
            CodecError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended before chunk size",
            ))
        })?;
        let size = parse_chunk_size(&size_line)?;
        tracing::trace!("Read chunk size: {size} ({size_line:?})");

        if size == 0 {
            return Ok((body, skip_trailers(reader)?));
        }

        body.extend(read_exact_bytes(reader, size)?);

        match read_line(reader)? {
            Some(line) if line.is_empty() => {}
            _ => return Err(CodecError::MissingChunkTerminator),
        }
    }
}

/// Parses the hex size of a chunk-size line; only hex digits are accepted.
fn parse_chunk_size(line: &str) -> Result<usize, CodecError> {
    let digits = line.split(';').next().unwrap_or_default().trim();
    Some(digits)
        .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_hexdigit()))
        .and_then(|d| u64::from_str_radix(d, 16).ok())
        .and_then(|size| usize::try_from(size).ok())
        .ok_or_else(|| CodecError::InvalidChunkSize(line.to_string()))
}

/// Returns true when the blank line ending the trailers was seen.
fn skip_trailers<R: BufRead>(reader: &mut R) -> Result<bool, CodecError> {
    while let Some(line) = read_line(reader)? {
        if line.is_empty() {
            return Ok(true);
        }
        tracing::debug!("Ignoring chunked trailer: {line:?}");
    }
    Ok(false)
}

fn read_exact_bytes<R: Read>(reader: &mut R, length: usize) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    let limit = u64::try_from(length).unwrap_or(u64::MAX);
    let read = reader.by_ref().take(limit).read_to_end(&mut buf)?;
    if read != length {
        return Err(CodecError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {length} body bytes, got {read}"),
        )));
    }
    Ok(buf)
}
