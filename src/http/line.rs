//! Working buffer and line cursor
//!
//! The parser keeps every received byte that has not yet been folded into a
//! completed field in a [`WorkingBuffer`]. Lines are taken from it with
//! [`WorkingBuffer::next_line`], which never consumes anything when the line
//! terminator has not arrived yet. That guarantee is what lets the parser
//! resume after an arbitrary split.

use bytes::{Buf, BytesMut};

/// Find the next CRLF in a buffer
pub fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Strip leading and trailing spaces and tabs
pub(crate) fn trim_ows(bytes: &[u8]) -> &[u8] {
    let is_ows = |b: &u8| *b == b' ' || *b == b'\t';
    let start = bytes.iter().position(|b| !is_ows(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_ows(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Unconsumed transport bytes plus a read cursor
///
/// Invariant: `pos <= buf.len()`. Bytes before `pos` are consumed and may be
/// discarded by [`compact`](WorkingBuffer::compact).
#[derive(Debug, Default)]
pub struct WorkingBuffer {
    buf: BytesMut,
    pos: usize,
}

impl WorkingBuffer {
    pub fn new() -> Self {
        WorkingBuffer {
            buf: BytesMut::new(),
            pos: 0,
        }
    }

    /// Append newly received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the next CRLF-terminated line at or after the cursor
    ///
    /// On success the line (without CRLF) is returned and the cursor moves
    /// past the terminator. Returns `None` and leaves the cursor untouched
    /// when no CRLF is buffered yet.
    pub fn next_line(&mut self) -> Option<&[u8]> {
        let start = self.pos;
        let len = find_crlf(&self.buf[start..])?;
        self.pos = start + len + 2;
        Some(&self.buf[start..start + len])
    }

    /// Bytes after the cursor
    pub fn remaining(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn remaining_len(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Move the cursor forward by `n` bytes (clamped to the buffer end)
    pub fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buf.len());
    }

    /// Drop consumed bytes so the unconsumed tail starts at offset 0
    pub fn compact(&mut self) {
        self.buf.advance(self.pos);
        self.pos = 0;
    }

    /// Discard everything, consumed or not
    pub fn clear(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
