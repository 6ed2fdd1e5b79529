//! Chunk source trait definitions
//!
//! A chunk source is the capture side of the pipeline: once started it emits
//! binary chunks at a configured interval until it is stopped or fails.

use crate::error::RelayResult;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;

/// Event emitted by a chunk source
///
/// The order of `Chunk` events on the channel defines chunk sequence order.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// A captured chunk of media data
    Chunk {
        /// Chunk payload
        data: Bytes,
        /// Capture timestamp
        timestamp: DateTime<Utc>,
    },
    /// The source stopped producing; no further chunks follow
    Stopped,
    /// The source failed; no further chunks follow
    Error(String),
}

/// A source of timed media chunks
///
/// After `stop()` the source must eventually emit [`SourceEvent::Stopped`]
/// and emit no further chunks. Chunks that slip out late are tolerated; the
/// controller drops them.
#[async_trait]
pub trait ChunkSource: Send {
    /// Configure the source for the given MIME type
    ///
    /// Called once before `start`. Errors should be
    /// [`RelayError::Recorder`](crate::RelayError::Recorder).
    fn configure(&mut self, mime_type: &str) -> RelayResult<()>;

    /// Begin emitting chunks at the given interval onto `events`
    async fn start(
        &mut self,
        interval: Duration,
        events: mpsc::Sender<SourceEvent>,
    ) -> RelayResult<()>;

    /// Stop producing chunks
    async fn stop(&mut self) -> RelayResult<()>;
}
