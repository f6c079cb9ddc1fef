//! Response body storage

use super::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::path::{Path, PathBuf};

/// Where a response body lives
///
/// Received bytes can only be appended to an in-memory body. A file-backed
/// body refers to content that already exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    InMemory(BytesMut),
    FileBacked(PathBuf),
}

impl Body {
    /// Create an empty in-memory body
    pub fn new() -> Self {
        Body::InMemory(BytesMut::new())
    }

    /// Create a body referring to a file on disk
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Body::FileBacked(path.into())
    }

    /// Append received bytes
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Body::InMemory(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            Body::FileBacked(_) => Err(Error::BodyNotAppendable),
        }
    }

    /// Number of bytes held in memory (0 for file-backed bodies)
    pub fn len(&self) -> usize {
        match self {
            Body::InMemory(buf) => buf.len(),
            Body::FileBacked(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The in-memory bytes, if any
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::InMemory(buf) => Some(&buf[..]),
            Body::FileBacked(_) => None,
        }
    }

    /// The backing file, if any
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Body::InMemory(_) => None,
            Body::FileBacked(path) => Some(path.as_path()),
        }
    }

    /// Freeze the in-memory bytes
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Body::InMemory(buf) => Some(buf.freeze()),
            Body::FileBacked(_) => None,
        }
    }

    pub fn clear(&mut self) {
        *self = Body::new();
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::new()
    }
}
