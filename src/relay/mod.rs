//! Relay core module
//!
//! This module implements the capture→buffer→relay pipeline:
//! - RetentionBuffer for local, ordered chunk accumulation
//! - WriteQueue to serialize asynchronous outbound writes
//! - RelayController to drive the session lifecycle state machine

pub mod controller;
pub mod queue;
pub mod retention;
pub mod state;

pub use controller::{RelayController, RelayEvent};
pub use queue::WriteQueue;
pub use retention::{Chunk, RetentionBuffer};
pub use state::{LifecycleState, Recording, SessionStats};
