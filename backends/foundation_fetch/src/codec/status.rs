use crate::errors::CodecError;

/// Parses a status line such as `HTTP/1.1 200 OK` into its status code.
///
/// The line is split on whitespace into at most three tokens (version, code,
/// reason); only the code is interpreted.
///
/// # Errors
///
/// [`CodecError::MalformedStatusLine`] for fewer than two tokens and
/// [`CodecError::InvalidStatusCode`] for a non-numeric code.
pub fn parse_status_line(line: &str) -> Result<u16, CodecError> {
    let mut tokens = line.split_whitespace();
    let (Some(_version), Some(code)) = (tokens.next(), tokens.next()) else {
        return Err(CodecError::MalformedStatusLine(line.to_string()));
    };

    code.parse::<u16>()
        .map_err(|_| CodecError::InvalidStatusCode(code.to_string()))
}
