//! HTTP message value types
//!
//! Method, version and status as they appear on a response's path through
//! the receiver, plus the status-line sub-parser.

use super::line::trim_ows;
use super::{Error, Result};
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// Method of the request a response answers
///
/// Only `HEAD` changes how a response is framed; the others are carried so
/// callers can name what they sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

const METHODS: [Method; 9] = [
    Method::Get,
    Method::Head,
    Method::Post,
    Method::Put,
    Method::Delete,
    Method::Connect,
    Method::Options,
    Method::Trace,
    Method::Patch,
];

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }

    /// Responses to this method never carry a body
    pub fn forbids_response_body(&self) -> bool {
        *self == Method::Head
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        METHODS
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                Error::Protocol(format!("unknown method {:?}", truncate(s.as_bytes())))
            })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(truncate(s.as_bytes()))),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First digit of a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

/// Response status code, always in 100..=599
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

/// Canonical reason phrases, sorted by code
const REASONS: &[(u16, &str)] = &[
    (100, "Continue"),
    (101, "Switching Protocols"),
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (204, "No Content"),
    (206, "Partial Content"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (303, "See Other"),
    (304, "Not Modified"),
    (307, "Temporary Redirect"),
    (308, "Permanent Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (413, "Content Too Large"),
    (414, "URI Too Long"),
    (415, "Unsupported Media Type"),
    (429, "Too Many Requests"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
];

impl Status {
    pub const OK: Status = Status { code: 200 };
    pub const NOT_FOUND: Status = Status { code: 404 };
    pub const INTERNAL_SERVER_ERROR: Status = Status { code: 500 };

    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(code.to_string()))
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn class(&self) -> StatusClass {
        match self.code / 100 {
            1 => StatusClass::Informational,
            2 => StatusClass::Success,
            3 => StatusClass::Redirection,
            4 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    /// Canonical reason phrase, "Unknown" for unlisted codes
    pub fn reason_phrase(&self) -> &'static str {
        REASONS
            .binary_search_by_key(&self.code, |(code, _)| *code)
            .map(|i| REASONS[i].1)
            .unwrap_or("Unknown")
    }
}

impl FromStr for Status {
    type Err = Error;

    /// Exactly three ASCII digits
    fn from_str(s: &str) -> Result<Self> {
        let digits = s.as_bytes();
        if digits.len() != 3 || !digits.iter().all(u8::is_ascii_digit) {
            return Err(Error::InvalidStatus(truncate(digits)));
        }
        let code = digits
            .iter()
            .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
        Status::new(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// Split a status line into version, status and reason
///
/// `HTTP/1.1 200 OK`. The reason may contain spaces or be missing, in which
/// case the canonical phrase for the code stands in. Its bytes are kept as
/// received.
pub fn parse_status_line(line: &[u8]) -> Result<(Version, Status, Bytes)> {
    let space = line
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::InvalidStatusLine(truncate(line)))?;
    let version = &line[..space];
    let version: Version = std::str::from_utf8(version)
        .map_err(|_| Error::InvalidVersion(truncate(version)))?
        .parse()?;

    let rest = &line[space + 1..];
    let rest = &rest[rest.iter().take_while(|&&b| b == b' ').count()..];
    let (code, reason) = match rest.iter().position(|&b| b == b' ') {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, &b""[..]),
    };
    let status: Status = std::str::from_utf8(code)
        .map_err(|_| Error::InvalidStatus(truncate(code)))?
        .trim_end()
        .parse()?;

    let reason = trim_ows(reason);
    let reason = if reason.is_empty() {
        Bytes::from_static(status.reason_phrase().as_bytes())
    } else {
        Bytes::copy_from_slice(reason)
    };
    Ok((version, status, reason))
}

/// Cap a malformed line before it goes into an error message
pub(crate) fn truncate(line: &[u8]) -> String {
    String::from_utf8_lossy(&line[..line.len().min(32)]).into_owned()
}
