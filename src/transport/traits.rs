//! Transport trait definitions
//!
//! The relay writes chunk payloads verbatim, in emission order, onto a single
//! outbound stream. Reliability and ordering on the wire are the transport's
//! concern; no framing is added above it.

use crate::error::RelayResult;
use async_trait::async_trait;
use bytes::Bytes;

/// A reliable transport connection
#[async_trait]
pub trait Transport: Send {
    /// Connect to the given URL and wait for the session to become ready
    ///
    /// Errors should be [`RelayError::TransportConnect`](crate::RelayError::TransportConnect).
    async fn connect(&mut self, url: &str) -> RelayResult<()>;

    /// Open the single ordered outbound byte stream
    ///
    /// Errors should be [`RelayError::StreamOpen`](crate::RelayError::StreamOpen).
    async fn open_outbound(&mut self) -> RelayResult<Box<dyn OutboundStream>>;

    /// Close the connection
    async fn close(&mut self) -> RelayResult<()>;
}

/// An ordered outbound byte sink
#[async_trait]
pub trait OutboundStream: Send {
    /// Write one payload; completes once the transport has accepted the bytes
    ///
    /// Errors should be [`RelayError::Write`](crate::RelayError::Write).
    async fn write(&mut self, data: Bytes) -> RelayResult<()>;

    /// Close the stream
    async fn close(&mut self) -> RelayResult<()>;
}
