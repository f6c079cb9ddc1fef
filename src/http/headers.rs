//! HTTP headers handling
//!
//! This module provides a type for managing response headers with
//! case-insensitive lookups and support for multiple values per header name,
//! plus the framing accessors the response parser consults once the header
//! block is complete.

use super::line::trim_ows;
use super::{message::truncate, Error, Result};
use bytes::{BufMut, Bytes};
use std::fmt;

/// A single parsed header line
///
/// The value keeps the bytes exactly as received; it may hold obs-text that
/// is not UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: Bytes,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        Header {
            name: name.into(),
            value: Bytes::copy_from_slice(value.as_ref()),
        }
    }

    /// Parse a raw header line (without its CRLF) into name and value
    pub fn parse(line: &[u8]) -> Result<Self> {
        let colon = line.iter().position(|&b| b == b':').ok_or_else(|| {
            Error::InvalidHeader(format!("No colon in header: {}", truncate(line)))
        })?;

        let name = trim_ows(&line[..colon]);
        if name.is_empty() {
            return Err(Error::InvalidHeader("Empty header name".to_string()));
        }
        let name = std::str::from_utf8(name)
            .ok()
            .filter(|n| n.is_ascii())
            .ok_or_else(|| Error::InvalidHeader(format!("Non-ASCII name: {}", truncate(name))))?;

        Ok(Header::new(name, trim_ows(&line[colon + 1..])))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value as text, `None` when it is not valid UTF-8
    pub fn value(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// The value as received
    pub fn value_bytes(&self) -> &[u8] {
        &self.value
    }

    /// Case-insensitive name comparison
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_slice(self.name.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(&self.value);
        buf.put_slice(b"\r\n");
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, String::from_utf8_lossy(&self.value))
    }
}

/// Value of the `Transfer-Encoding` header as far as framing is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    None,
    Chunked,
}

/// Value of the `Connection` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirective {
    KeepAlive,
    Close,
}

/// HTTP headers collection
///
/// Headers are stored in insertion order and support:
/// - Case-insensitive header name lookups
/// - Multiple values for the same header name
/// - Iteration over all headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<Header>,
}

impl Headers {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Parse a raw header line and append it
    ///
    /// Returns the parsed header, or `InvalidHeader` when the line has no
    /// `name: value` shape.
    pub fn add(&mut self, line: &[u8]) -> Result<&Header> {
        let header = Header::parse(line)?;
        let idx = self.headers.len();
        self.headers.push(header);
        Ok(&self.headers[idx])
    }

    /// Insert a header
    ///
    /// If a header with the same name (case-insensitive) already exists,
    /// this adds another value rather than replacing it.
    pub fn insert(&mut self, name: impl Into<String>, value: impl AsRef<[u8]>) {
        self.headers.push(Header::new(name, value));
    }

    fn find(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.is(name))
    }

    /// First value of a header as text (case-insensitive)
    ///
    /// `None` when the header is absent or its first value is not UTF-8;
    /// [`get_bytes`](Self::get_bytes) returns it regardless.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name)?.value()
    }

    /// First value of a header as received
    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.find(name).map(Header::value_bytes)
    }

    /// All UTF-8 values for a header (case-insensitive)
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.is(name))
            .filter_map(Header::value)
            .collect()
    }

    /// Check if a header exists
    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.is(name))
    }

    /// Get the number of headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Clear all headers
    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// Iterate over all headers
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter()
    }

    /// Append every header line, as received, to `buf`
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        for header in &self.headers {
            header.write_to(buf);
        }
    }

    /// Declared body length
    ///
    /// Returns `None` when the header is absent or its value is not a
    /// non-negative decimal integer.
    pub fn content_length(&self) -> Option<usize> {
        let raw = self.get_bytes("Content-Length")?;
        let len = std::str::from_utf8(raw)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok());
        if len.is_none() {
            log::warn!(
                "ignoring malformed Content-Length: {:?}",
                String::from_utf8_lossy(raw)
            );
        }
        len
    }

    /// Whether any `Transfer-Encoding` header lists `chunked`
    pub fn transfer_encoding(&self) -> TransferEncoding {
        let chunked = self
            .get_all("Transfer-Encoding")
            .iter()
            .flat_map(|v| v.split(','))
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));

        if chunked {
            TransferEncoding::Chunked
        } else {
            TransferEncoding::None
        }
    }

    /// The `Connection` directive, if it is one of `keep-alive` or `close`
    pub fn connection(&self) -> Option<ConnectionDirective> {
        let value = self.get("Connection")?;
        value.split(',').map(str::trim).find_map(|token| {
            if token.eq_ignore_ascii_case("close") {
                Some(ConnectionDirective::Close)
            } else if token.eq_ignore_ascii_case("keep-alive") {
                Some(ConnectionDirective::KeepAlive)
            } else {
                None
            }
        })
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.headers {
            write!(f, "{}\r\n", header)?;
        }
        Ok(())
    }
}
