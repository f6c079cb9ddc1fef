//! HTTP/1.x response reception
//!
//! This module turns a sequence of raw transport reads into a structured
//! [`Response`], for all three body framings: `Content-Length`, chunked
//! transfer encoding and read-until-close.
//!
//! # Architecture
//!
//! - [`ResponseParser`] is a resumable state machine. Every call to
//!   [`ResponseParser::feed`] appends bytes to a working buffer and advances
//!   as far as the buffered bytes allow. It never blocks: "need more data"
//!   is a return value.
//! - [`ResponseObserver`] is notified at each parsing milestone and can veto
//!   further parsing. [`CookieCapture`] is the default observer and forwards
//!   `Set-Cookie` headers to a [`CookieStore`].
//! - [`HttpClient`] drives the read loop over any [`SessionOps`] transport.
//!
//! # Examples
//!
//! ```
//! use httprx::http::{Method, Progress, ResponseParser};
//!
//! let mut parser = ResponseParser::new();
//! let progress = parser
//!     .feed(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhe", Method::Get)
//!     .unwrap();
//! assert_eq!(progress, Progress::NeedMore);
//!
//! let progress = parser.feed(b"llo", Method::Get).unwrap();
//! assert_eq!(progress, Progress::Complete);
//!
//! let response = parser.into_response();
//! assert_eq!(response.status().code(), 200);
//! assert_eq!(response.body().as_bytes(), Some(&b"hello"[..]));
//! ```

pub mod body;
pub mod chunked;
pub mod client;
pub mod config;
pub mod cookie;
pub mod headers;
pub mod line;
pub mod message;
pub mod observer;
pub mod parser;
pub mod response;
pub mod session;

pub use body::Body;
pub use chunked::{Chunk, ChunkedDecoder};
pub use client::{HttpClient, Outcome};
pub use config::ParserConfig;
pub use cookie::{Cookie, CookieStore, SameSite, SessionCookies};
pub use headers::{ConnectionDirective, Header, Headers, TransferEncoding};
pub use message::{Method, Status, StatusClass, Version};
pub use observer::{Approve, CookieCapture, ResponseObserver};
pub use parser::{BodyMode, ParsePhase, Progress, ResponseParser};
pub use response::{Response, ResponseState};
pub use session::{FdSessionOps, HttpSession, PollEvents, SessionOps};

use std::fmt;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// The part of a response the transport ended before delivering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Status,
    Headers,
    Body,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Status => write!(f, "status line"),
            Missing::Headers => write!(f, "headers"),
            Missing::Body => write!(f, "body"),
        }
    }
}

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid status line: {0}")]
    InvalidStatusLine(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Too many headers (limit {0})")]
    TooManyHeaders(usize),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Chunk of {size} bytes exceeds limit of {limit}")]
    ChunkTooLarge { size: usize, limit: usize },

    #[error("Expected CRLF after chunk data")]
    InvalidChunkTerminator,

    #[error("Line exceeds {0} bytes without CRLF")]
    LineTooLong(usize),

    #[error("Incomplete response: connection ended before {0} was received")]
    Incomplete(Missing),

    #[error("Cannot append received data to a file-backed body")]
    BodyNotAppendable,

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Whether the error is a violation of HTTP/1.x response framing.
    ///
    /// Framing errors are fatal to the response being received and are never
    /// worth retrying on the same connection.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Error::InvalidStatusLine(_)
                | Error::InvalidVersion(_)
                | Error::InvalidStatus(_)
                | Error::InvalidHeader(_)
                | Error::TooManyHeaders(_)
                | Error::InvalidChunkSize(_)
                | Error::ChunkTooLarge { .. }
                | Error::InvalidChunkTerminator
                | Error::LineTooLong(_)
        )
    }

    /// Whether the transport ended before the response was complete
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::Incomplete(_))
    }
}

/// CRLF line ending
pub const CRLF: &str = "\r\n";
