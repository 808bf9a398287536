//! Samsung remote-control channel protocol.
//!
//! - [`constants`]: method and event names.
//! - [`messages`]: the outbound encoder and the inbound decoder.

pub mod constants;
pub mod messages;

pub use messages::{InboundEvent, OutboundMessage, decode};
