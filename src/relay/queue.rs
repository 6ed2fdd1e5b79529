//! Outbound write serialization
//!
//! Chunk payloads may arrive while a previous write is still in flight; the
//! write queue feeds them one at a time to the outbound stream so wire order
//! always matches emission order.

use crate::error::{RelayError, RelayResult};
use crate::transport::OutboundStream;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Serializes writes to the outbound stream
///
/// Owns the stream for the session: a spawned writer task performs the
/// writes and closes the stream exactly once when the queue ends, whether by
/// [`drain`](WriteQueue::drain) or by a write failure. The first write
/// failure discards everything still queued and is pushed on the failure
/// channel given at spawn; a torn stream makes the rest undeliverable.
pub struct WriteQueue {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    task: tokio::task::JoinHandle<RelayResult<u64>>,
}

impl WriteQueue {
    /// Take ownership of the stream and start the writer task
    pub fn spawn(
        mut stream: Box<dyn OutboundStream>,
        failure_tx: mpsc::UnboundedSender<RelayError>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();

        let task = tokio::spawn(async move {
            let mut written = 0u64;
            let mut failure: Option<RelayError> = None;

            while let Some(data) = rx.recv().await {
                match stream.write(data).await {
                    Ok(()) => written += 1,
                    Err(err) => {
                        tracing::error!("Outbound write failed after {} writes: {}", written, err);

                        // Abort: discard everything still queued
                        rx.close();
                        let mut discarded = 0usize;
                        while rx.try_recv().is_ok() {
                            discarded += 1;
                        }
                        if discarded > 0 {
                            tracing::warn!("Discarded {} queued writes", discarded);
                        }

                        let _ = failure_tx.send(RelayError::Write(err.to_string()));
                        failure = Some(err);
                        break;
                    }
                }
            }

            if let Err(err) = stream.close().await {
                tracing::warn!("Outbound stream close failed: {}", err);
                if failure.is_none() {
                    failure = Some(RelayError::Teardown(err.to_string()));
                }
            }

            match failure {
                None => Ok(written),
                Some(err) => Err(err),
            }
        });

        Self { tx: Some(tx), task }
    }

    /// Queue one payload for writing; never blocks
    ///
    /// Returns false if the writer has already failed and the payload was
    /// not queued.
    pub fn enqueue(&self, data: Bytes) -> bool {
        match &self.tx {
            Some(tx) => tx.send(data).is_ok(),
            None => false,
        }
    }

    /// Finish the queue: complete outstanding writes and close the stream
    ///
    /// Returns the number of writes completed, or the first failure.
    pub async fn drain(mut self) -> RelayResult<u64> {
        // Closing the feed lets the writer task run to completion
        drop(self.tx.take());

        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(RelayError::Teardown(format!("writer task failed: {}", err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Stream that records writes and can be scripted to fail
    struct ScriptedStream {
        writes: Arc<Mutex<Vec<Bytes>>>,
        closes: Arc<AtomicUsize>,
        fail_on: Option<usize>,
        seen: usize,
    }

    impl ScriptedStream {
        fn new(fail_on: Option<usize>) -> (Self, Arc<Mutex<Vec<Bytes>>>, Arc<AtomicUsize>) {
            let writes = Arc::new(Mutex::new(Vec::new()));
            let closes = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    writes: writes.clone(),
                    closes: closes.clone(),
                    fail_on,
                    seen: 0,
                },
                writes,
                closes,
            )
        }
    }

    #[async_trait]
    impl OutboundStream for ScriptedStream {
        async fn write(&mut self, data: Bytes) -> RelayResult<()> {
            let index = self.seen;
            self.seen += 1;
            if self.fail_on == Some(index) {
                return Err(RelayError::Write(format!("scripted failure at {}", index)));
            }
            // Yield so a later enqueue can race an in-flight write
            tokio::task::yield_now().await;
            self.writes.lock().push(data);
            Ok(())
        }

        async fn close(&mut self) -> RelayResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writes_complete_in_enqueue_order() {
        let (stream, writes, closes) = ScriptedStream::new(None);
        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();
        let queue = WriteQueue::spawn(Box::new(stream), fail_tx);

        assert!(queue.enqueue(Bytes::from_static(b"a")));
        assert!(queue.enqueue(Bytes::from_static(b"bb")));
        assert!(queue.enqueue(Bytes::from_static(b"ccc")));

        let written = queue.drain().await.unwrap();
        assert_eq!(written, 3);

        let seen = writes.lock().clone();
        assert_eq!(
            seen,
            vec![
                Bytes::from_static(b"a"),
                Bytes::from_static(b"bb"),
                Bytes::from_static(b"ccc"),
            ]
        );
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_aborts_queued_writes() {
        let (stream, writes, closes) = ScriptedStream::new(Some(1));
        let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();
        let queue = WriteQueue::spawn(Box::new(stream), fail_tx);

        queue.enqueue(Bytes::from_static(b"first"));
        queue.enqueue(Bytes::from_static(b"second"));
        queue.enqueue(Bytes::from_static(b"third"));

        let err = queue.drain().await.unwrap_err();
        assert_eq!(err.code(), "WRITE_ERROR");

        // Only the write before the failure made it out
        assert_eq!(writes.lock().clone(), vec![Bytes::from_static(b"first")]);

        // Failure was surfaced asynchronously too
        let surfaced = fail_rx.recv().await.unwrap();
        assert_eq!(surfaced.code(), "WRITE_ERROR");

        // Stream still closed exactly once
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drain_with_nothing_queued() {
        let (stream, _writes, closes) = ScriptedStream::new(None);
        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();
        let queue = WriteQueue::spawn(Box::new(stream), fail_tx);

        assert_eq!(queue.drain().await.unwrap(), 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
