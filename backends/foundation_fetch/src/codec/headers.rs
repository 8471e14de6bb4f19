use super::read_line;
use crate::errors::CodecError;
use std::collections::BTreeMap;
use std::io::BufRead;

/// Response headers with case-insensitive names and one value per name.
///
/// Names are stored lower-cased. When a name repeats the last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders(BTreeMap<String, String>);

impl ResponseHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any earlier value for the same name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ResponseHeaders {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Reads header lines up to the blank line that ends the header block.
///
/// Lines without a colon are skipped.
///
/// # Errors
///
/// Returns [`CodecError::Io`] if reading fails and
/// [`CodecError::TruncatedHeaders`] if the stream ends before the blank line.
pub fn read_headers<R: BufRead>(reader: &mut R) -> Result<ResponseHeaders, CodecError> {
    let mut headers = ResponseHeaders::new();

    loop {
        let line = read_line(reader)?.ok_or(CodecError::TruncatedHeaders)?;
        if line.is_empty() {
            break;
        }

        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                headers.insert(name.trim(), value.trim());
            }
            _ => tracing::debug!("Skipping header line without a name: {line:?}"),
        }
    }

    tracing::debug!("Read {} response headers", headers.len());
    Ok(headers)
}
