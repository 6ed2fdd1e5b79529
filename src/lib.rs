//! media-relay - Capture, retain and relay live media chunks.
//!
//! Relays a time-ordered sequence of media chunks over a single outbound
//! transport stream while retaining them locally for later assembly into one
//! recording. The capture side ([`ChunkSource`]) and the network side
//! ([`Transport`]) are collaborator traits supplied by the embedder; this
//! crate owns the lifecycle state machine, the ordered write path and the
//! retention buffer.
//!
//! ```no_run
//! use media_relay::{RelayConfig, RelayController};
//! use media_relay::source::TickerSource;
//!
//! # async fn example(transport: Box<dyn media_relay::Transport>) -> anyhow::Result<()> {
//! let config = RelayConfig::new("https://relay.example.com:4433/ingest", "video/webm")?;
//! let (source, feed) = TickerSource::new();
//! let mut relay = RelayController::new(config, Box::new(source), transport);
//!
//! relay.start(None).await?;
//! feed.push(&b"encoded media bytes"[..]);
//! relay.stop().await?;
//!
//! let recording = relay.recording()?;
//! println!("{} bytes of {}", recording.len(), recording.content_type);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod relay;
pub mod source;
pub mod transport;

pub use config::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use relay::{Chunk, LifecycleState, Recording, RelayController, RelayEvent, SessionStats};
pub use source::{ChunkSource, SourceEvent};
pub use transport::{OutboundStream, Transport};
