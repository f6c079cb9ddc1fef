//! HTTP response parsing
//!
//! [`ResponseParser`] is a resumable state machine fed with whatever the
//! transport returned from its latest read. It moves through the status
//! line, the header block and the body, completing as many of these as the
//! buffered bytes allow in a single [`feed`](ResponseParser::feed) call.

use super::chunked::ChunkedDecoder;
use super::headers::{ConnectionDirective, TransferEncoding};
use super::line::WorkingBuffer;
use super::message::parse_status_line;
use super::{
    Approve, Error, Method, Missing, ParserConfig, Response, ResponseObserver, ResponseState,
    Result,
};
use bytes::Bytes;

/// Framing discipline of the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// `Content-Length: n` with n > 0
    KnownLength(usize),
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// Neither of the above
    UntilClose,
}

/// Where the parser is in the status, headers, body sequence
///
/// Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePhase {
    AwaitingStatus,
    AwaitingHeaders,
    ReadingBody(BodyMode),
    Complete,
    ForceStopped,
}

/// Outcome of one [`ResponseParser::feed`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// All buffered bytes were used; read more from the transport
    NeedMore,
    /// The response is complete
    Complete,
    /// An observer stopped parsing
    Stopped,
}

impl Progress {
    /// Whether the caller should stop reading
    pub fn is_done(&self) -> bool {
        !matches!(self, Progress::NeedMore)
    }
}

/// Result of one parsing step
enum Step {
    Advanced,
    Wait,
    Stopped,
    /// No body will follow
    Finished,
}

/// HTTP response parser
pub struct ResponseParser<O: ResponseObserver = Approve> {
    phase: ParsePhase,
    buffer: WorkingBuffer,
    response: Response,
    chunked: ChunkedDecoder,
    observer: O,
    config: ParserConfig,
    failed: bool,
}

impl ResponseParser<Approve> {
    /// Create a new response parser that approves every milestone
    pub fn new() -> Self {
        Self::with_observer(Approve)
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self::with_observer_and_config(Approve, config)
    }
}

impl Default for ResponseParser<Approve> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ResponseObserver> ResponseParser<O> {
    pub fn with_observer(observer: O) -> Self {
        Self::with_observer_and_config(observer, ParserConfig::default())
    }

    pub fn with_observer_and_config(observer: O, config: ParserConfig) -> Self {
        ResponseParser {
            phase: ParsePhase::AwaitingStatus,
            buffer: WorkingBuffer::new(),
            response: Response::new(),
            chunked: ChunkedDecoder::with_limits(config.max_chunk_size, config.max_line_length),
            observer,
            config,
            failed: false,
        }
    }

    pub fn phase(&self) -> ParsePhase {
        self.phase
    }

    /// The response as parsed so far
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn into_response(self) -> Response {
        self.response
    }

    pub fn into_parts(self) -> (Response, O) {
        (self.response, self.observer)
    }

    /// Feed data to the parser
    ///
    /// `method` is the method of the request this response answers; a
    /// `HEAD` response never has a body. Returns `NeedMore` when the
    /// response is not complete yet, `Complete` or `Stopped` once parsing
    /// has ended. Calls after the end return the same value and ignore
    /// `data`.
    ///
    /// A framing error fails the response: it is recorded in the response's
    /// error slot and every later call returns an error.
    pub fn feed(&mut self, data: &[u8], method: Method) -> Result<Progress> {
        if self.failed {
            return Err(Error::Protocol(
                "response parser already failed".to_string(),
            ));
        }
        match self.phase {
            ParsePhase::Complete => return Ok(Progress::Complete),
            ParsePhase::ForceStopped => return Ok(Progress::Stopped),
            _ => {}
        }

        self.buffer.extend(data);
        match self.advance(method) {
            Ok(progress) => Ok(progress),
            Err(e) => {
                log::debug!("response parsing failed: {}", e);
                self.failed = true;
                self.response.fail(&e);
                Err(e)
            }
        }
    }

    /// Signal that the transport reached end-of-stream
    ///
    /// A body delimited by connection close is complete now. In any other
    /// unfinished phase the response is incomplete.
    pub fn finish(&mut self) -> Result<Progress> {
        let missing = match self.phase {
            ParsePhase::Complete => return Ok(Progress::Complete),
            ParsePhase::ForceStopped => return Ok(Progress::Stopped),
            ParsePhase::ReadingBody(BodyMode::UntilClose) if !self.failed => {
                self.complete();
                return Ok(Progress::Complete);
            }
            ParsePhase::AwaitingStatus => Missing::Status,
            ParsePhase::AwaitingHeaders => Missing::Headers,
            ParsePhase::ReadingBody(_) => Missing::Body,
        };

        let err = Error::Incomplete(missing);
        if !self.failed {
            self.failed = true;
            self.response.fail(&err);
        }
        Err(err)
    }

    /// Reset the parser for the next response
    pub fn reset(&mut self) {
        self.phase = ParsePhase::AwaitingStatus;
        self.buffer.clear();
        self.response = Response::new();
        self.chunked.reset();
        self.failed = false;
    }

    fn advance(&mut self, method: Method) -> Result<Progress> {
        if self.phase == ParsePhase::AwaitingStatus {
            match self.parse_status()? {
                Step::Advanced => {}
                Step::Wait => return Ok(Progress::NeedMore),
                Step::Stopped => return Ok(self.force_stop()),
                Step::Finished => return Ok(self.complete()),
            }
        }

        if self.phase == ParsePhase::AwaitingHeaders {
            match self.parse_headers(method)? {
                Step::Advanced => {}
                Step::Wait => return Ok(Progress::NeedMore),
                Step::Stopped => return Ok(self.force_stop()),
                Step::Finished => return Ok(self.complete()),
            }
        }

        let done = match self.phase {
            ParsePhase::ReadingBody(BodyMode::KnownLength(len)) => self.read_known_length(len)?,
            ParsePhase::ReadingBody(BodyMode::Chunked) => {
                let progress = self
                    .chunked
                    .decode(&mut self.buffer, &mut self.response, &mut self.observer)?;
                match progress {
                    Progress::NeedMore => false,
                    Progress::Complete => true,
                    Progress::Stopped => return Ok(self.force_stop()),
                }
            }
            ParsePhase::ReadingBody(BodyMode::UntilClose) => self.read_until_close()?,
            _ => false,
        };

        if done {
            Ok(self.complete())
        } else {
            Ok(Progress::NeedMore)
        }
    }

    /// Take one line from the working buffer
    ///
    /// Returns `None` (and keeps the unconsumed tail) when its CRLF has not
    /// arrived. A lone trailing CR is not counted against the length limit.
    /// Bytes are handed on untouched; the sub-parsers decide what must be
    /// text.
    fn take_line(&mut self) -> Result<Option<Bytes>> {
        let limit = self.config.max_line_length;
        match self.buffer.next_line() {
            Some(line) if line.len() > limit => Err(Error::LineTooLong(limit)),
            Some(line) => Ok(Some(Bytes::copy_from_slice(line))),
            None => {
                if self.buffer.remaining_len() > limit + 1 {
                    return Err(Error::LineTooLong(limit));
                }
                self.buffer.compact();
                Ok(None)
            }
        }
    }

    fn parse_status(&mut self) -> Result<Step> {
        let line = match self.take_line()? {
            Some(line) => line,
            None => return Ok(Step::Wait),
        };

        let (version, status, reason) = parse_status_line(&line)?;
        log::trace!(
            "status: {} {} {}",
            version,
            status.code(),
            String::from_utf8_lossy(&reason)
        );
        self.response.set_status_line(version, status, reason);
        self.phase = ParsePhase::AwaitingHeaders;

        if !self.observer.on_status(status, &self.response) {
            return Ok(Step::Stopped);
        }
        Ok(Step::Advanced)
    }

    fn parse_headers(&mut self, method: Method) -> Result<Step> {
        loop {
            let line = match self.take_line()? {
                Some(line) => line,
                None => return Ok(Step::Wait),
            };
            if line.is_empty() {
                break;
            }

            if self.response.headers().len() >= self.config.max_headers {
                return Err(Error::TooManyHeaders(self.config.max_headers));
            }
            let header = self.response.headers_mut().add(&line)?.clone();
            log::trace!("header: {}", header);

            if !self.observer.on_header(&header, &self.response) {
                return Ok(Step::Stopped);
            }
        }

        if !self
            .observer
            .on_headers_complete(self.response.headers(), &self.response)
        {
            return Ok(Step::Stopped);
        }

        if method.forbids_response_body() {
            log::debug!("{} response: no body", method);
            self.buffer.clear();
            return Ok(Step::Finished);
        }

        let mode = self.select_body_mode();
        log::debug!("body mode: {:?}", mode);
        self.phase = ParsePhase::ReadingBody(mode);
        self.buffer.compact();
        Ok(Step::Advanced)
    }

    /// Pick the body framing once, right after the header block
    fn select_body_mode(&self) -> BodyMode {
        let headers = self.response.headers();
        if headers.transfer_encoding() == TransferEncoding::Chunked {
            return BodyMode::Chunked;
        }
        match headers.content_length() {
            Some(len) if len > 0 => BodyMode::KnownLength(len),
            _ => BodyMode::UntilClose,
        }
    }

    fn read_known_length(&mut self, len: usize) -> Result<bool> {
        self.response.body_mut().append(self.buffer.remaining())?;
        self.buffer.clear();
        Ok(self.response.body().len() >= len)
    }

    /// Body without length framing
    ///
    /// With `Connection: close` the body runs until end-of-stream (see
    /// [`finish`](Self::finish)). Without it, whatever arrived together with
    /// or right after the headers is taken as the whole body.
    fn read_until_close(&mut self) -> Result<bool> {
        self.response.body_mut().append(self.buffer.remaining())?;
        self.buffer.clear();
        Ok(self.response.headers().connection() != Some(ConnectionDirective::Close))
    }

    fn complete(&mut self) -> Progress {
        self.phase = ParsePhase::Complete;
        self.response.set_state(ResponseState::Complete);
        log::trace!("response complete: {} body bytes", self.response.body().len());
        if !self.observer.on_complete(&self.response) {
            log::warn!("observer rejected an already complete response; ignored");
        }
        Progress::Complete
    }

    fn force_stop(&mut self) -> Progress {
        log::debug!("observer stopped parsing in phase {:?}", self.phase);
        self.phase = ParsePhase::ForceStopped;
        self.response.set_state(ResponseState::Stopped);
        self.buffer.clear();
        Progress::Stopped
    }
}
