//! The response document filled in by the parser

use super::{
    Body, Error, Headers, Method, Missing, Progress, ResponseParser, Result, Status, Version, CRLF,
};
use bytes::{BufMut, Bytes};
use std::fmt::Write as _;

/// Reception state of a [`Response`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    InProgress,
    Complete,
    /// An observer ended reception early
    Stopped,
    Failed,
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    version: Version,
    status: Status,
    reason: Bytes,
    headers: Headers,
    body: Body,
    state: ResponseState,
    error: Option<String>,
}

impl Response {
    /// Create an empty response awaiting reception
    pub fn new() -> Self {
        let status = Status::INTERNAL_SERVER_ERROR;
        Response {
            version: Version::default(),
            status,
            reason: Bytes::from_static(status.reason_phrase().as_bytes()),
            headers: Headers::new(),
            body: Body::new(),
            state: ResponseState::InProgress,
            error: None,
        }
    }

    /// Parse a response that is already fully buffered
    ///
    /// The bytes run through the same state machine as a network reception
    /// of a `GET` response. A body without length framing ends with the input.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut parser = ResponseParser::new();
        let progress = match parser.feed(input, Method::Get)? {
            Progress::NeedMore => parser.finish()?,
            done => done,
        };
        match progress {
            Progress::Complete => Ok(parser.into_response()),
            // Approve never vetoes and finish never asks for more
            _ => Err(Error::Incomplete(Missing::Body)),
        }
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the status code
    pub fn status(&self) -> Status {
        self.status
    }

    /// Reason phrase, `None` when the server sent bytes that are not UTF-8
    pub fn reason(&self) -> Option<&str> {
        std::str::from_utf8(&self.reason).ok()
    }

    /// Reason phrase as received
    pub fn reason_bytes(&self) -> &[u8] {
        &self.reason
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the body
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replace the body storage
    ///
    /// Only useful before reception starts or when building a response to
    /// render; received bytes cannot be appended to a file-backed body.
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ResponseState::Complete
    }

    /// The error that failed reception, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn set_status_line(&mut self, version: Version, status: Status, reason: Bytes) {
        self.version = version;
        self.status = status;
        self.reason = reason;
    }

    pub(crate) fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub(crate) fn set_state(&mut self, state: ResponseState) {
        self.state = state;
    }

    pub(crate) fn fail(&mut self, error: &Error) {
        self.state = ResponseState::Failed;
        self.error = Some(error.to_string());
    }

    /// Convert the response to wire format
    ///
    /// Reason and header values are written back byte for byte. File-backed
    /// bodies are not read; only status line and headers are written for
    /// them.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_slice(self.version.as_str().as_bytes());
        buf.put_slice(format!(" {} ", self.status.code()).as_bytes());
        buf.put_slice(&self.reason);
        buf.put_slice(CRLF.as_bytes());
        self.headers.write_to(&mut buf);
        buf.put_slice(CRLF.as_bytes());
        if let Some(bytes) = self.body.as_bytes() {
            buf.put_slice(bytes);
        }
        buf
    }

    /// Human readable form of the response
    ///
    /// The body is shown only when `show_content` is set; a file-backed body
    /// is shown as its path. Bytes that are not UTF-8 are shown replaced.
    pub fn render(&self, show_content: bool) -> String {
        let mut out = self.head();
        match &self.body {
            Body::InMemory(bytes) => {
                if show_content {
                    out.push_str(&String::from_utf8_lossy(bytes));
                }
            }
            Body::FileBacked(path) => {
                let _ = write!(out, "File: {}", path.display());
            }
        }
        out
    }

    fn head(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "{} {} {}{}",
            self.version,
            self.status.code(),
            String::from_utf8_lossy(&self.reason),
            CRLF
        );
        let _ = write!(out, "{}{}", self.headers, CRLF);
        out
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
