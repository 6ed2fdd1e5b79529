//! Transport module
//!
//! Network-side collaborator traits: a connection that can open one ordered
//! outbound byte stream.

pub mod traits;

pub use traits::{OutboundStream, Transport};
