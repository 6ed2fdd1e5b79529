//! Relay lifecycle state and session bookkeeping

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of a relay session
///
/// `Closed` is terminal: a new session requires a new controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// No session started yet
    Idle,
    /// Waiting for transport readiness and the outbound stream
    Connecting,
    /// Accepting and relaying chunks
    Streaming,
    /// Teardown in progress
    Stopping,
    /// Session finished; resources released
    Closed,
    /// A runtime failure occurred; teardown pending or in progress
    Failed,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Idle
    }
}

impl LifecycleState {
    /// Whether chunks are accepted in this state
    pub fn accepts_chunks(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}

/// Counters and timestamps for one relay session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Session identifier
    pub session_id: Uuid,

    /// Chunks accepted while streaming
    pub chunks_accepted: u64,

    /// Chunks dropped because the session was not streaming
    pub chunks_dropped: u64,

    /// Total payload bytes retained locally
    pub bytes_retained: u64,

    /// When streaming began
    pub started_at: Option<DateTime<Utc>>,

    /// When the session reached Closed
    pub stopped_at: Option<DateTime<Utc>>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            chunks_accepted: 0,
            chunks_dropped: 0,
            bytes_retained: 0,
            started_at: None,
            stopped_at: None,
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// One assembled recording: all retained chunk payloads, concatenated in
/// emission order and tagged with the configured content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// Concatenated payload bytes
    pub data: Bytes,

    /// MIME type of the payload
    pub content_type: String,
}

impl Recording {
    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(LifecycleState::default(), LifecycleState::Idle);
    }

    #[test]
    fn test_only_streaming_accepts_chunks() {
        assert!(LifecycleState::Streaming.accepts_chunks());
        for state in [
            LifecycleState::Idle,
            LifecycleState::Connecting,
            LifecycleState::Stopping,
            LifecycleState::Closed,
            LifecycleState::Failed,
        ] {
            assert!(!state.accepts_chunks(), "{:?} should not accept chunks", state);
        }
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&LifecycleState::Streaming).unwrap();
        assert_eq!(json, "\"streaming\"");
    }
}
