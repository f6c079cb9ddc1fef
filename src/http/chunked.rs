//! Chunked transfer encoding support
//!
//! This module decodes an HTTP chunked body incrementally. The decoder works
//! directly on the parser's [`WorkingBuffer`] and tolerates a read boundary
//! at any byte: inside the chunk-size line, inside the payload, or between
//! the two bytes of the CRLF that ends a chunk.

use super::config::{DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_LINE_LENGTH};
use super::line::WorkingBuffer;
use super::message::truncate;
use super::{Approve, Error, Missing, Progress, Response, ResponseObserver, Result, CRLF};
use bytes::BytesMut;

/// Chunk extension: `name` or `name=value`
pub type ChunkExtension = (String, Option<String>);

/// The chunk currently being decoded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    length: usize,
    extensions: Vec<ChunkExtension>,
    data: BytesMut,
}

impl Chunk {
    /// Declared length from the chunk-size line
    pub fn length(&self) -> usize {
        self.length
    }

    /// Extensions that followed the size on the chunk-size line
    pub fn extensions(&self) -> &[ChunkExtension] {
        &self.extensions
    }

    /// Payload received so far
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether this is the zero-length chunk that ends the body
    pub fn is_last(&self) -> bool {
        self.length == 0
    }

    fn clear(&mut self) {
        self.length = 0;
        self.extensions.clear();
        self.data.clear();
    }
}

/// Decoding position within the chunk stream
///
/// One signed counter tracks two things. A positive value is the number of
/// payload bytes still owed for the current chunk. A negative value is the
/// number of bytes of the previous chunk's CRLF that have not arrived yet.
#[derive(Debug, Default)]
pub struct ChunkCursor {
    chunk: Chunk,
    owed: isize,
}

impl ChunkCursor {
    /// Payload bytes still owed for the current chunk
    pub fn owes_payload(&self) -> usize {
        if self.owed > 0 {
            self.owed as usize
        } else {
            0
        }
    }

    /// Bytes of the previous chunk's CRLF still outstanding (0..=2)
    pub fn owes_terminator_bytes(&self) -> usize {
        if self.owed < 0 {
            self.owed.unsigned_abs()
        } else {
            0
        }
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    fn begin(&mut self, length: usize, extensions: Vec<ChunkExtension>) -> Result<()> {
        self.owed = isize::try_from(length).map_err(|_| Error::ChunkTooLarge {
            size: length,
            limit: isize::MAX as usize,
        })?;
        self.chunk.length = length;
        self.chunk.extensions = extensions;
        self.chunk.data.clear();
        Ok(())
    }

    fn take_payload(&mut self, data: &[u8]) {
        debug_assert!(data.len() <= self.owes_payload());
        self.chunk.data.extend_from_slice(data);
        self.owed -= data.len() as isize;
    }

    fn await_terminator(&mut self, missing: usize) {
        debug_assert!(missing <= 2);
        self.owed = -(missing as isize);
    }

    fn settle_terminator(&mut self, n: usize) {
        debug_assert!(n <= self.owes_terminator_bytes());
        self.owed += n as isize;
    }

    fn reset_chunk(&mut self) {
        self.chunk.clear();
    }
}

/// Parse a chunk-size line (without CRLF)
///
/// Format: HEX-SIZE [ ";" NAME [ "=" VALUE ] ]*
///
/// The size must be plain hexadecimal digits; whitespace around it is
/// tolerated. Sizes above `limit` are rejected with `ChunkTooLarge`.
pub fn parse_chunk_size_line(line: &str, limit: usize) -> Result<(usize, Vec<ChunkExtension>)> {
    let mut parts = line.split(';');
    let size_str = parts.next().unwrap_or_default().trim();

    if size_str.is_empty() || !size_str.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidChunkSize(size_str.chars().take(10).collect()));
    }

    let size = size_str
        .bytes()
        .try_fold(0usize, |acc, b| {
            let digit = (b as char).to_digit(16)? as usize;
            acc.checked_mul(16)?.checked_add(digit)
        })
        .ok_or(Error::ChunkTooLarge {
            size: usize::MAX,
            limit,
        })?;

    if size > limit {
        return Err(Error::ChunkTooLarge { size, limit });
    }

    let extensions = parts
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(|ext| match ext.split_once('=') {
            Some((name, value)) => (
                name.trim().to_string(),
                Some(value.trim().trim_matches('"').to_string()),
            ),
            None => (ext.to_string(), None),
        })
        .collect();

    Ok((size, extensions))
}

/// Chunked body decoder
///
/// Decodes HTTP chunked transfer encoding into a response body, one chunk
/// at a time, firing the chunk observer callbacks as chunks start and end.
/// Trailer headers after the last chunk are not parsed.
#[derive(Debug)]
pub struct ChunkedDecoder {
    cursor: ChunkCursor,
    max_chunk_size: usize,
    max_line_length: usize,
    complete: bool,
}

impl ChunkedDecoder {
    /// Create a new chunked decoder with default limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_limits(max_chunk_size: usize, max_line_length: usize) -> Self {
        ChunkedDecoder {
            cursor: ChunkCursor::default(),
            max_chunk_size,
            max_line_length,
            complete: false,
        }
    }

    pub fn cursor(&self) -> &ChunkCursor {
        &self.cursor
    }

    /// Check if the last chunk has been decoded
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Decode as much of the buffered input as possible
    ///
    /// Completed chunk payloads are appended to the response body. Returns
    /// `NeedMore` when the buffer runs dry, `Complete` after the last chunk,
    /// or `Stopped` when the observer vetoes a chunk milestone.
    pub fn decode<O: ResponseObserver>(
        &mut self,
        buf: &mut WorkingBuffer,
        response: &mut Response,
        observer: &mut O,
    ) -> Result<Progress> {
        if self.complete {
            return Ok(Progress::Complete);
        }

        loop {
            if self.cursor.owes_payload() == 0 {
                if !self.settle_terminator(buf)? {
                    buf.clear();
                    return Ok(Progress::NeedMore);
                }

                let limit = self.max_line_length;
                let line = match buf.next_line() {
                    Some(line) if line.len() > limit => return Err(Error::LineTooLong(limit)),
                    Some(line) => std::str::from_utf8(line)
                        .map_err(|_| Error::InvalidChunkSize(truncate(line)))?
                        .to_owned(),
                    None => {
                        if buf.remaining_len() > limit + 1 {
                            return Err(Error::LineTooLong(limit));
                        }
                        buf.compact();
                        return Ok(Progress::NeedMore);
                    }
                };

                let (length, extensions) = parse_chunk_size_line(&line, self.max_chunk_size)?;
                self.cursor.begin(length, extensions)?;
                log::trace!("chunk start: {} bytes", length);

                if !observer.on_chunk_start(self.cursor.chunk(), response) {
                    log::debug!("observer stopped parsing at chunk start");
                    return Ok(Progress::Stopped);
                }

                if self.cursor.chunk().is_last() {
                    let approved = observer.on_chunk_end(self.cursor.chunk(), response);
                    self.cursor.reset_chunk();
                    if !approved {
                        return Ok(Progress::Stopped);
                    }
                    // Trailers, if any, are left unread
                    buf.clear();
                    self.complete = true;
                    return Ok(Progress::Complete);
                }
            }

            let owed = self.cursor.owes_payload();
            let available = buf.remaining_len();
            if available < owed {
                self.cursor.take_payload(buf.remaining());
                buf.clear();
                return Ok(Progress::NeedMore);
            }

            self.cursor.take_payload(&buf.remaining()[..owed]);
            buf.consume(owed);

            let balance = available - owed;
            let wait = if balance <= 2 {
                check_terminator(buf.remaining(), 0)?;
                buf.clear();
                self.cursor.await_terminator(2 - balance);
                true
            } else {
                check_terminator(&buf.remaining()[..2], 0)?;
                buf.consume(2);
                self.cursor.await_terminator(0);
                false
            };

            response.body_mut().append(self.cursor.chunk().data())?;
            log::trace!("chunk end: {} bytes", self.cursor.chunk().data().len());
            let approved = observer.on_chunk_end(self.cursor.chunk(), response);
            self.cursor.reset_chunk();
            if !approved {
                log::debug!("observer stopped parsing at chunk end");
                return Ok(Progress::Stopped);
            }
            if wait {
                return Ok(Progress::NeedMore);
            }
        }
    }

    /// Consume CRLF bytes the previous chunk still owes
    ///
    /// Returns false when the buffer ran out before the terminator did.
    fn settle_terminator(&mut self, buf: &mut WorkingBuffer) -> Result<bool> {
        let outstanding = self.cursor.owes_terminator_bytes();
        if outstanding == 0 {
            return Ok(true);
        }
        let present = outstanding.min(buf.remaining_len());
        check_terminator(&buf.remaining()[..present], 2 - outstanding)?;
        buf.consume(present);
        self.cursor.settle_terminator(present);
        Ok(self.cursor.owes_terminator_bytes() == 0)
    }

    /// Reset the decoder for reuse
    pub fn reset(&mut self) {
        self.cursor = ChunkCursor::default();
        self.complete = false;
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that `bytes` match the chunk CRLF starting at terminator offset `from`
fn check_terminator(bytes: &[u8], from: usize) -> Result<()> {
    let expected = &CRLF.as_bytes()[from..from + bytes.len()];
    if bytes == expected {
        Ok(())
    } else {
        Err(Error::InvalidChunkTerminator)
    }
}

/// Decode complete chunked body from bytes
pub fn decode_chunked_body(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ChunkedDecoder::new();
    let mut buf = WorkingBuffer::new();
    let mut response = Response::new();

    buf.extend(input);
    match decoder.decode(&mut buf, &mut response, &mut Approve)? {
        Progress::Complete => Ok(response
            .body()
            .as_bytes()
            .map(<[u8]>::to_vec)
            .unwrap_or_default()),
        _ => Err(Error::Incomplete(Missing::Body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIKI: &[u8] = b"4\r\nWiki\r\n5\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\n\r\n";

    fn decode_split(input: &[u8], cuts: &[usize]) -> Result<(Progress, Vec<u8>)> {
        let mut decoder = ChunkedDecoder::new();
        let mut buf = WorkingBuffer::new();
        let mut response = Response::new();
        let mut progress = Progress::NeedMore;
        let mut start = 0;

        for &end in cuts.iter().chain(std::iter::once(&input.len())) {
            buf.extend(&input[start..end]);
            start = end;
            progress = decoder.decode(&mut buf, &mut response, &mut Approve)?;
            if progress != Progress::NeedMore {
                break;
            }
        }
        let body = response.body().as_bytes().unwrap().to_vec();
        Ok((progress, body))
    }

    #[test]
    fn test_parse_chunk_size_line() {
        assert_eq!(parse_chunk_size_line("1a", 1024).unwrap(), (26, vec![]));
        assert_eq!(parse_chunk_size_line(" FF ", 1024).unwrap().0, 255);
        assert_eq!(parse_chunk_size_line("0", 1024).unwrap().0, 0);

        let (size, ext) = parse_chunk_size_line("5;name=\"value\"; flag", 1024).unwrap();
        assert_eq!(size, 5);
        assert_eq!(
            ext,
            vec![
                ("name".to_string(), Some("value".to_string())),
                ("flag".to_string(), None)
            ]
        );
    }

    #[test]
    fn test_parse_chunk_size_line_errors() {
        assert!(matches!(
            parse_chunk_size_line("xyz", 1024),
            Err(Error::InvalidChunkSize(_))
        ));
        assert!(matches!(
            parse_chunk_size_line("", 1024),
            Err(Error::InvalidChunkSize(_))
        ));
        assert!(matches!(
            parse_chunk_size_line("+5", 1024),
            Err(Error::InvalidChunkSize(_))
        ));
        assert!(matches!(
            parse_chunk_size_line("401", 1024),
            Err(Error::ChunkTooLarge { size: 1025, limit: 1024 })
        ));
        assert!(matches!(
            parse_chunk_size_line("fffffffffffffffffffff", usize::MAX),
            Err(Error::ChunkTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_single_chunk() {
        let output = decode_chunked_body(b"5\r\nHello\r\n0\r\n\r\n").unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_multiple_chunks() {
        let output = decode_chunked_body(WIKI).unwrap();
        assert_eq!(output, b"Wikipedia in\r\n\r\nchunks.");
    }

    #[test]
    fn test_decode_with_extension() {
        let output = decode_chunked_body(b"5;extension=value\r\nHello\r\n0\r\n\r\n").unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(
            decode_chunked_body(b"5\r\nHel"),
            Err(Error::Incomplete(Missing::Body))
        ));
    }

    #[test]
    fn test_every_single_split() {
        for cut in 0..=WIKI.len() {
            let (progress, body) = decode_split(WIKI, &[cut]).unwrap();
            assert_eq!(progress, Progress::Complete, "split at {}", cut);
            assert_eq!(body, b"Wikipedia in\r\n\r\nchunks.", "split at {}", cut);
        }
    }

    #[test]
    fn test_every_double_split() {
        for first in 0..=WIKI.len() {
            for second in first..=WIKI.len() {
                let (progress, body) = decode_split(WIKI, &[first, second]).unwrap();
                assert_eq!(progress, Progress::Complete, "splits at {}/{}", first, second);
                assert_eq!(body, b"Wikipedia in\r\n\r\nchunks.");
            }
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let cuts: Vec<usize> = (1..WIKI.len()).collect();
        let (progress, body) = decode_split(WIKI, &cuts).unwrap();
        assert_eq!(progress, Progress::Complete);
        assert_eq!(body, b"Wikipedia in\r\n\r\nchunks.");
    }

    #[test]
    fn test_cursor_owes_terminator_between_reads() {
        let mut decoder = ChunkedDecoder::new();
        let mut buf = WorkingBuffer::new();
        let mut response = Response::new();

        // Payload complete, CR present, LF missing
        buf.extend(b"4\r\nWiki\r");
        let progress = decoder.decode(&mut buf, &mut response, &mut Approve).unwrap();
        assert_eq!(progress, Progress::NeedMore);
        assert_eq!(decoder.cursor().owes_payload(), 0);
        assert_eq!(decoder.cursor().owes_terminator_bytes(), 1);
        assert_eq!(response.body().as_bytes(), Some(&b"Wiki"[..]));

        buf.extend(b"\n0\r\n\r\n");
        let progress = decoder.decode(&mut buf, &mut response, &mut Approve).unwrap();
        assert_eq!(progress, Progress::Complete);
        assert!(decoder.is_complete());
        assert_eq!(decoder.cursor().owes_terminator_bytes(), 0);
    }

    #[test]
    fn test_cursor_owes_payload() {
        let mut decoder = ChunkedDecoder::new();
        let mut buf = WorkingBuffer::new();
        let mut response = Response::new();

        buf.extend(b"a\r\n0123");
        decoder.decode(&mut buf, &mut response, &mut Approve).unwrap();
        assert_eq!(decoder.cursor().owes_payload(), 6);
        assert_eq!(decoder.cursor().chunk().data(), b"0123");
        // Nothing reaches the body before the chunk is complete
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_bad_terminator() {
        assert!(matches!(
            decode_chunked_body(b"4\r\nWikiXX5\r\npedia\r\n0\r\n\r\n"),
            Err(Error::InvalidChunkTerminator)
        ));
        // Wrong byte arriving in a later read
        assert!(matches!(
            decode_split(b"4\r\nWiki\rX0\r\n\r\n", &[8]),
            Err(Error::InvalidChunkTerminator)
        ));
    }

    #[test]
    fn test_malformed_size_appends_nothing() {
        let mut decoder = ChunkedDecoder::new();
        let mut buf = WorkingBuffer::new();
        let mut response = Response::new();

        buf.extend(b"4\r\nWiki\r\nzz\r\npedia\r\n");
        let err = decoder
            .decode(&mut buf, &mut response, &mut Approve)
            .unwrap_err();
        assert!(err.is_framing());
        assert_eq!(response.body().as_bytes(), Some(&b"Wiki"[..]));
    }

    #[test]
    fn test_non_utf8_size_line_rejected() {
        let err = decode_chunked_body(b"5;name=caf\xe9\r\nHello\r\n0\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::InvalidChunkSize(_)));
        assert!(err.is_framing());
    }

    #[test]
    fn test_size_line_too_long() {
        let mut decoder = ChunkedDecoder::with_limits(1024, 8);
        let mut buf = WorkingBuffer::new();
        let mut response = Response::new();

        buf.extend(b"000000000005");
        assert!(matches!(
            decoder.decode(&mut buf, &mut response, &mut Approve),
            Err(Error::LineTooLong(8))
        ));
    }

    #[test]
    fn test_observer_sees_chunks() {
        #[derive(Default)]
        struct Recorder {
            starts: Vec<(usize, Vec<ChunkExtension>)>,
            ends: Vec<Vec<u8>>,
        }
        impl ResponseObserver for Recorder {
            fn on_chunk_start(&mut self, chunk: &Chunk, _response: &Response) -> bool {
                assert!(chunk.data().is_empty());
                assert_eq!(chunk.is_last(), chunk.length() == 0);
                self.starts.push((chunk.length(), chunk.extensions().to_vec()));
                true
            }
            fn on_chunk_end(&mut self, chunk: &Chunk, _response: &Response) -> bool {
                self.ends.push(chunk.data().to_vec());
                true
            }
        }

        let mut decoder = ChunkedDecoder::new();
        let mut buf = WorkingBuffer::new();
        let mut response = Response::new();
        let mut recorder = Recorder::default();

        buf.extend(b"2;a=1\r\nab\r\n1\r\nc\r\n0\r\n\r\n");
        let progress = decoder.decode(&mut buf, &mut response, &mut recorder).unwrap();

        assert_eq!(progress, Progress::Complete);
        assert_eq!(recorder.starts.len(), 3);
        assert_eq!(
            recorder.starts[0],
            (2, vec![("a".to_string(), Some("1".to_string()))])
        );
        assert_eq!(recorder.starts[2].0, 0);
        assert_eq!(recorder.ends, vec![b"ab".to_vec(), b"c".to_vec(), Vec::new()]);
    }

    #[test]
    fn test_veto_at_chunk_end_stops() {
        struct StopAfterFirst(usize);
        impl ResponseObserver for StopAfterFirst {
            fn on_chunk_end(&mut self, _chunk: &Chunk, _response: &Response) -> bool {
                self.0 += 1;
                false
            }
        }

        let mut decoder = ChunkedDecoder::new();
        let mut buf = WorkingBuffer::new();
        let mut response = Response::new();
        let mut observer = StopAfterFirst(0);

        buf.extend(WIKI);
        let progress = decoder.decode(&mut buf, &mut response, &mut observer).unwrap();
        assert_eq!(progress, Progress::Stopped);
        assert_eq!(observer.0, 1);
        assert_eq!(response.body().as_bytes(), Some(&b"Wiki"[..]));
    }

    #[test]
    fn test_reset() {
        let mut decoder = ChunkedDecoder::new();
        let mut buf = WorkingBuffer::new();
        let mut response = Response::new();

        buf.extend(b"0\r\n\r\n");
        decoder.decode(&mut buf, &mut response, &mut Approve).unwrap();
        assert!(decoder.is_complete());

        decoder.reset();
        assert!(!decoder.is_complete());
        assert_eq!(decoder.cursor().owes_payload(), 0);
    }
}
