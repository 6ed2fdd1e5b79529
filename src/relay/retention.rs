//! Local chunk retention
//!
//! Chunks are retained in arrival order for the lifetime of the session and
//! can be assembled into one recording at any point, independent of whether
//! relaying them succeeded.

use crate::error::{RelayError, RelayResult};
use crate::relay::state::Recording;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};

/// One immutable captured chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in emission order
    pub index: u64,

    /// Chunk payload
    pub data: Bytes,

    /// Capture timestamp
    pub timestamp: DateTime<Utc>,
}

/// Append-only, ordered chunk store
#[derive(Debug, Default)]
pub struct RetentionBuffer {
    chunks: Vec<Chunk>,
    total_bytes: usize,
}

impl RetentionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, preserving arrival order
    pub fn append(&mut self, chunk: Chunk) {
        self.total_bytes += chunk.data.len();
        self.chunks.push(chunk);
    }

    /// Number of retained chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total retained payload bytes
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Concatenate all retained payloads into one recording
    ///
    /// Does not mutate the buffer; calling mid-session returns a snapshot of
    /// the data retained so far.
    pub fn assemble(&self, content_type: &str) -> RelayResult<Recording> {
        if self.chunks.is_empty() {
            return Err(RelayError::NoDataAvailable);
        }

        let mut data = BytesMut::with_capacity(self.total_bytes);
        for chunk in &self.chunks {
            data.extend_from_slice(&chunk.data);
        }

        Ok(Recording {
            data: data.freeze(),
            content_type: content_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u64, data: &'static [u8]) -> Chunk {
        Chunk {
            index,
            data: Bytes::from_static(data),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_assemble_preserves_order() {
        let mut buffer = RetentionBuffer::new();
        buffer.append(chunk(0, b"alpha"));
        buffer.append(chunk(1, b"-"));
        buffer.append(chunk(2, b"omega"));

        let recording = buffer.assemble("video/webm").unwrap();
        assert_eq!(&recording.data[..], b"alpha-omega");
        assert_eq!(recording.content_type, "video/webm");
    }

    #[test]
    fn test_assemble_empty_fails() {
        let buffer = RetentionBuffer::new();
        let err = buffer.assemble("video/webm").unwrap_err();
        assert_eq!(err.code(), "NO_DATA_AVAILABLE");
    }

    #[test]
    fn test_assemble_is_a_snapshot() {
        let mut buffer = RetentionBuffer::new();
        buffer.append(chunk(0, b"one"));

        let first = buffer.assemble("audio/ogg").unwrap();
        assert_eq!(first.len(), 3);

        // Appending afterwards does not disturb the earlier snapshot
        buffer.append(chunk(1, b"two"));
        assert_eq!(first.len(), 3);

        let second = buffer.assemble("audio/ogg").unwrap();
        assert_eq!(&second.data[..], b"onetwo");
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_total_bytes_tracks_appends() {
        let mut buffer = RetentionBuffer::new();
        assert_eq!(buffer.total_bytes(), 0);
        buffer.append(chunk(0, b"abcd"));
        buffer.append(chunk(1, b"ef"));
        assert_eq!(buffer.total_bytes(), 6);
    }
}
