//! Interval-driven chunk source over a pushed byte feed
//!
//! Embedders that capture media themselves push encoded bytes into a
//! [`ByteFeed`]; the source drains the feed on a fixed interval, emitting one
//! chunk per tick when data is pending.

use super::traits::{ChunkSource, SourceEvent};
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Handle for pushing captured bytes into a [`TickerSource`]
///
/// Cheap to clone; all clones feed the same source.
#[derive(Debug, Clone, Default)]
pub struct ByteFeed {
    pending: Arc<Mutex<VecDeque<Bytes>>>,
}

impl ByteFeed {
    /// Queue one captured payload for emission on the next tick
    pub fn push(&self, data: impl Into<Bytes>) {
        self.pending.lock().push_back(data.into());
    }

    /// Number of payloads waiting for a tick
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    fn pop(&self) -> Option<Bytes> {
        self.pending.lock().pop_front()
    }
}

/// Chunk source that emits feed contents on a fixed interval
pub struct TickerSource {
    feed: ByteFeed,

    /// Whether the emission loop should keep running
    running: Arc<AtomicBool>,

    /// Wakes the emission loop out of its tick wait on stop
    stop_signal: Arc<Notify>,

    /// Emission task handle
    task: Option<tokio::task::JoinHandle<()>>,

    /// MIME type set by `configure`
    mime_type: Option<String>,
}

impl TickerSource {
    /// Create a source and the feed that supplies it
    pub fn new() -> (Self, ByteFeed) {
        let feed = ByteFeed::default();
        let source = Self {
            feed: feed.clone(),
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(Notify::new()),
            task: None,
            mime_type: None,
        };
        (source, feed)
    }
}

#[async_trait]
impl ChunkSource for TickerSource {
    fn configure(&mut self, mime_type: &str) -> RelayResult<()> {
        if mime_type.is_empty() {
            return Err(RelayError::Recorder("empty MIME type".to_string()));
        }
        self.mime_type = Some(mime_type.to_string());
        Ok(())
    }

    async fn start(
        &mut self,
        interval: Duration,
        events: mpsc::Sender<SourceEvent>,
    ) -> RelayResult<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RelayError::AlreadyStarted);
        }
        if interval.is_zero() {
            return Err(RelayError::Recorder("emission interval must be non-zero".to_string()));
        }

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let stop_signal = self.stop_signal.clone();
        let feed = self.feed.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut emitted = 0u64;

            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_signal.notified() => break,
                }

                if !running.load(Ordering::SeqCst) {
                    break;
                }

                if let Some(data) = feed.pop() {
                    let event = SourceEvent::Chunk {
                        data,
                        timestamp: Utc::now(),
                    };
                    if events.send(event).await.is_err() {
                        // Receiver gone, nobody left to emit to
                        break;
                    }
                    emitted += 1;
                }
            }

            let _ = events.send(SourceEvent::Stopped).await;
            tracing::info!("Ticker source stopped. Emitted {} chunks", emitted);
        });

        self.task = Some(handle);

        tracing::info!(
            "Ticker source started at {:?} interval ({})",
            interval,
            self.mime_type.as_deref().unwrap_or("unconfigured"),
        );
        Ok(())
    }

    async fn stop(&mut self) -> RelayResult<()> {
        self.running.store(false, Ordering::SeqCst);
        self.stop_signal.notify_waiters();

        // Wait for the emission task to finish
        if let Some(handle) = self.task.take() {
            let _ = handle.await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emits_pushed_bytes_in_order() {
        let (mut source, feed) = TickerSource::new();
        source.configure("video/webm").unwrap();

        feed.push(&b"first"[..]);
        feed.push(&b"second"[..]);

        let (tx, mut rx) = mpsc::channel(16);
        source.start(Duration::from_millis(5), tx).await.unwrap();

        let mut seen = Vec::new();
        while seen.len() < 2 {
            match rx.recv().await {
                Some(SourceEvent::Chunk { data, .. }) => seen.push(data),
                Some(_) | None => break,
            }
        }
        source.stop().await.unwrap();

        assert_eq!(seen, vec![Bytes::from(&b"first"[..]), Bytes::from(&b"second"[..])]);
    }

    #[tokio::test]
    async fn test_stop_emits_stopped_event() {
        let (mut source, _feed) = TickerSource::new();
        let (tx, mut rx) = mpsc::channel(16);
        source.start(Duration::from_millis(5), tx).await.unwrap();
        source.stop().await.unwrap();

        let mut stopped = false;
        while let Some(event) = rx.recv().await {
            if matches!(event, SourceEvent::Stopped) {
                stopped = true;
            }
        }
        assert!(stopped);
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let (mut source, _feed) = TickerSource::new();
        let (tx, _rx) = mpsc::channel(16);
        source.start(Duration::from_millis(5), tx.clone()).await.unwrap();

        let err = source.start(Duration::from_millis(5), tx).await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_STARTED");

        source.stop().await.unwrap();
    }

    #[test]
    fn test_configure_rejects_empty_mime() {
        let (mut source, _feed) = TickerSource::new();
        assert!(source.configure("").is_err());
    }
}
