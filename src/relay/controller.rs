//! Relay controller
//!
//! Owns the session lifecycle state machine and coordinates the chunk source
//! with the transport: every produced chunk is retained locally and relayed
//! on the outbound stream, in emission order.

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::relay::queue::WriteQueue;
use crate::relay::retention::{Chunk, RetentionBuffer};
use crate::relay::state::{LifecycleState, Recording, SessionStats};
use crate::source::{ChunkSource, SourceEvent};
use crate::transport::Transport;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Events emitted during a relay session
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Streaming began
    Started,
    /// A chunk was retained and handed to the write queue
    ChunkRelayed { index: u64, bytes: usize },
    /// The session reached Closed
    Stopped,
    /// A runtime failure occurred
    Error(String),
}

/// State shared with the event pump
///
/// The write queue lives here, next to the lifecycle state, so a produced
/// chunk is appended and enqueued under one state read guard: a chunk racing
/// a stop is either fully accepted before the Stopping transition or fully
/// dropped after it.
struct Shared {
    state: RwLock<LifecycleState>,
    retention: Mutex<RetentionBuffer>,
    queue: Mutex<Option<WriteQueue>>,
    stats: Mutex<SessionStats>,
    event_tx: broadcast::Sender<RelayEvent>,
}

/// Collaborators held for the duration of one streaming session
///
/// Behind a single async mutex so the stop path and the pump's failure path
/// run teardown at most once: whichever takes the session out performs the
/// cleanup, the other finds it gone.
struct ActiveSession {
    source: Box<dyn ChunkSource>,
    transport: Box<dyn Transport>,
}

/// Drives one capture→buffer→relay session
///
/// `Closed` is terminal; a new session requires a new controller.
pub struct RelayController {
    config: RelayConfig,
    shared: Arc<Shared>,
    session: Arc<tokio::sync::Mutex<Option<ActiveSession>>>,
    collaborators: Option<(Box<dyn ChunkSource>, Box<dyn Transport>)>,
    pump: Option<tokio::task::JoinHandle<()>>,
}

impl RelayController {
    /// Create a controller over the given collaborators
    pub fn new(
        config: RelayConfig,
        source: Box<dyn ChunkSource>,
        transport: Box<dyn Transport>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            shared: Arc::new(Shared {
                state: RwLock::new(LifecycleState::Idle),
                retention: Mutex::new(RetentionBuffer::new()),
                queue: Mutex::new(None),
                stats: Mutex::new(SessionStats::new()),
                event_tx,
            }),
            session: Arc::new(tokio::sync::Mutex::new(None)),
            collaborators: Some((source, transport)),
            pump: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.shared.state.read()
    }

    /// Session counters
    pub fn stats(&self) -> SessionStats {
        self.shared.stats.lock().clone()
    }

    /// Number of chunks retained so far
    pub fn retained_chunks(&self) -> usize {
        self.shared.retention.lock().len()
    }

    /// Subscribe to relay events
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Start the session: connect, open the outbound stream, begin capture
    ///
    /// Valid only from Idle; any other state fails fast with
    /// [`RelayError::AlreadyStarted`]. A failure while connecting or opening
    /// the stream releases whatever was acquired and leaves the controller
    /// in Failed, never half-initialized.
    pub async fn start(&mut self, interval: Option<Duration>) -> RelayResult<()> {
        {
            let mut state = self.shared.state.write();
            if *state != LifecycleState::Idle {
                return Err(RelayError::AlreadyStarted);
            }
            *state = LifecycleState::Connecting;
        }

        let interval = interval.unwrap_or(self.config.chunk_interval);

        let (mut source, mut transport) = match self.collaborators.take() {
            Some(pair) => pair,
            None => return Err(RelayError::AlreadyStarted),
        };

        if let Err(err) = source.configure(&self.config.mime_type) {
            tracing::error!("Chunk source rejected configuration: {}", err);
            self.fail(&err);
            return Err(err);
        }

        tracing::info!("Connecting to {}", self.config.url);
        if let Err(err) = transport.connect(&self.config.url).await {
            tracing::error!("Transport connect failed: {}", err);
            self.fail(&err);
            return Err(err);
        }

        tracing::info!("Connected. Opening outbound stream");
        let stream = match transport.open_outbound().await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!("Stream open failed: {}", err);
                if let Err(close_err) = transport.close().await {
                    tracing::warn!("Connection close failed during unwind: {}", close_err);
                }
                self.fail(&err);
                return Err(err);
            }
        };

        let (fail_tx, fail_rx) = mpsc::unbounded_channel();
        *self.shared.queue.lock() = Some(WriteQueue::spawn(stream, fail_tx));
        let (source_tx, source_rx) = mpsc::channel(64);

        *self.session.lock().await = Some(ActiveSession { transport, source });

        // Transition before the source starts so its first chunk is accepted
        *self.shared.state.write() = LifecycleState::Streaming;
        self.shared.stats.lock().started_at = Some(Utc::now());

        tracing::info!("Starting chunk source at {:?} interval", interval);
        let started = {
            let mut guard = self.session.lock().await;
            match guard.as_mut() {
                Some(session) => session.source.start(interval, source_tx).await,
                None => Ok(()),
            }
        };
        if let Err(err) = started {
            tracing::error!("Chunk source failed to start: {}", err);
            self.fail(&err);
            let _ = Self::teardown(&self.shared, &self.session, self.config.close_timeout).await;
            return Err(err);
        }

        self.pump = Some(tokio::spawn(Self::pump(
            self.shared.clone(),
            self.session.clone(),
            source_rx,
            fail_rx,
            self.config.close_timeout,
        )));

        let _ = self.shared.event_tx.send(RelayEvent::Started);
        tracing::info!("Relay streaming");
        Ok(())
    }

    /// Stop the session and release all resources
    ///
    /// Idempotent: stopping an Idle, Stopping or Closed controller is a
    /// no-op that reports success. Teardown always reaches Closed; the first
    /// error any cleanup step raised is returned once cleanup is complete.
    pub async fn stop(&mut self) -> RelayResult<()> {
        let state = self.state();
        match state {
            LifecycleState::Idle => {
                tracing::debug!("Stop requested before start; nothing to do");
                return Ok(());
            }
            LifecycleState::Stopping | LifecycleState::Closed => {
                tracing::debug!("Stop requested in {:?} state", state);
                self.join_pump().await;
                return Ok(());
            }
            LifecycleState::Connecting | LifecycleState::Streaming | LifecycleState::Failed => {}
        }

        let result = Self::teardown(&self.shared, &self.session, self.config.close_timeout).await;
        self.join_pump().await;
        result
    }

    /// Assemble everything retained so far into one recording
    ///
    /// Callable in any state; fails with [`RelayError::NoDataAvailable`]
    /// until at least one chunk has been retained.
    pub fn recording(&self) -> RelayResult<Recording> {
        self.shared.retention.lock().assemble(&self.config.mime_type)
    }

    fn fail(&self, err: &RelayError) {
        *self.shared.state.write() = LifecycleState::Failed;
        let _ = self.shared.event_tx.send(RelayEvent::Error(err.to_string()));
    }

    async fn join_pump(&mut self) {
        if let Some(mut handle) = self.pump.take() {
            match tokio::time::timeout(self.config.close_timeout, &mut handle).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!("Timed out waiting for event pump; aborting it");
                    handle.abort();
                }
            }
        }
    }

    /// Single consumer of source events and write failures
    ///
    /// All retention mutations for produced chunks happen here, so no two
    /// chunk mutations can interleave.
    async fn pump(
        shared: Arc<Shared>,
        session: Arc<tokio::sync::Mutex<Option<ActiveSession>>>,
        mut source_rx: mpsc::Receiver<SourceEvent>,
        mut fail_rx: mpsc::UnboundedReceiver<RelayError>,
        close_timeout: Duration,
    ) {
        let mut next_index = 0u64;
        let mut failures_open = true;

        loop {
            tokio::select! {
                event = source_rx.recv() => match event {
                    Some(SourceEvent::Chunk { data, timestamp }) => {
                        Self::handle_chunk(&shared, &mut next_index, data, timestamp);
                    }
                    Some(SourceEvent::Error(message)) => {
                        let err = RelayError::Recorder(message);
                        Self::fail_and_close(&shared, &session, err, close_timeout).await;
                        break;
                    }
                    Some(SourceEvent::Stopped) | None => break,
                },
                failure = fail_rx.recv(), if failures_open => match failure {
                    Some(err) => {
                        Self::fail_and_close(&shared, &session, err, close_timeout).await;
                        break;
                    }
                    None => failures_open = false,
                },
            }
        }
    }

    /// Accept or drop one produced chunk
    ///
    /// Append-then-enqueue, both under the state read guard; the enqueue is
    /// fire-and-forget and never waits on network I/O.
    fn handle_chunk(
        shared: &Arc<Shared>,
        next_index: &mut u64,
        data: Bytes,
        timestamp: DateTime<Utc>,
    ) {
        let state = shared.state.read();
        if !state.accepts_chunks() {
            tracing::warn!("Dropping chunk received in {:?} state", *state);
            shared.stats.lock().chunks_dropped += 1;
            return;
        }

        let index = *next_index;
        *next_index += 1;
        let bytes = data.len();

        shared.retention.lock().append(Chunk {
            index,
            data: data.clone(),
            timestamp,
        });
        {
            let mut stats = shared.stats.lock();
            stats.chunks_accepted += 1;
            stats.bytes_retained += bytes as u64;
        }

        let enqueued = match shared.queue.lock().as_ref() {
            Some(queue) => queue.enqueue(data),
            None => false,
        };
        if enqueued {
            let _ = shared
                .event_tx
                .send(RelayEvent::ChunkRelayed { index, bytes });
        } else {
            tracing::warn!("Write queue unavailable; chunk {} retained only", index);
        }
    }

    async fn fail_and_close(
        shared: &Arc<Shared>,
        session: &Arc<tokio::sync::Mutex<Option<ActiveSession>>>,
        err: RelayError,
        close_timeout: Duration,
    ) {
        tracing::error!("Relay failure: {}", err);
        *shared.state.write() = LifecycleState::Failed;
        let _ = shared.event_tx.send(RelayEvent::Error(err.to_string()));

        if let Err(teardown_err) = Self::teardown(shared, session, close_timeout).await {
            tracing::warn!("Teardown after failure reported: {}", teardown_err);
        }
    }

    /// Release session resources and reach Closed
    ///
    /// Every step runs even if an earlier one fails; each wait is bounded by
    /// the configured close timeout so an unresponsive peer cannot hang the
    /// stop path. Returns the first error encountered.
    async fn teardown(
        shared: &Arc<Shared>,
        session: &Arc<tokio::sync::Mutex<Option<ActiveSession>>>,
        close_timeout: Duration,
    ) -> RelayResult<()> {
        {
            let mut state = shared.state.write();
            if matches!(*state, LifecycleState::Stopping | LifecycleState::Closed) {
                return Ok(());
            }
            *state = LifecycleState::Stopping;
        }

        tracing::info!("Stopping relay");
        let mut first_error: Option<RelayError> = None;

        let taken = session.lock().await.take();
        if let Some(mut active) = taken {
            if let Err(err) = active.source.stop().await {
                tracing::warn!("Chunk source stop failed: {}", err);
                first_error.get_or_insert(err);
            }

            // No further enqueues are possible past the Stopping transition
            let queue = shared.queue.lock().take();
            if let Some(queue) = queue {
                match tokio::time::timeout(close_timeout, queue.drain()).await {
                    Ok(Ok(written)) => {
                        tracing::info!("Write queue drained; {} writes completed", written);
                    }
                    Ok(Err(err)) => {
                        tracing::warn!("Write queue drain reported: {}", err);
                        first_error.get_or_insert(err);
                    }
                    Err(_) => {
                        tracing::warn!("Timed out draining write queue");
                        first_error.get_or_insert(RelayError::Teardown(
                            "timed out draining write queue".to_string(),
                        ));
                    }
                }
            }

            match tokio::time::timeout(close_timeout, active.transport.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!("Connection close failed: {}", err);
                    first_error.get_or_insert(err);
                }
                Err(_) => {
                    tracing::warn!("Timed out closing connection");
                    first_error.get_or_insert(RelayError::Teardown(
                        "timed out closing connection".to_string(),
                    ));
                }
            }
        }

        shared.stats.lock().stopped_at = Some(Utc::now());
        *shared.state.write() = LifecycleState::Closed;
        let _ = shared.event_tx.send(RelayEvent::Stopped);
        tracing::info!("Relay closed");

        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}
