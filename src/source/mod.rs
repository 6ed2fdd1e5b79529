//! Chunk source module
//!
//! Capture-side collaborators that produce timed binary chunks:
//! - ChunkSource trait consumed by the relay controller
//! - TickerSource, an interval-driven source over a pushed byte feed

pub mod ticker;
pub mod traits;

pub use ticker::{ByteFeed, TickerSource};
pub use traits::{ChunkSource, SourceEvent};
