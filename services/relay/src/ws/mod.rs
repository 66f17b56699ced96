//! WebSocket Relay
//!
//! The bidirectional audio relay between the telephony provider and the voice
//! agent, structured into submodules:
//!
//! - `wire`: Bridges library-specific sockets onto plain frame channels.
//! - `telephony`: The provider-facing leg (stream id latch, chunking, outbound media).
//! - `agent`: The agent-facing leg (settings handshake, audio forwarding).
//! - `session`: Owns both legs for one call and tears them down together.

pub mod agent;
pub mod session;
pub mod telephony;
pub mod wire;

pub use session::{EndReason, SessionOptions, SessionReport, run_session};
