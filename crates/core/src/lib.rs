//! Call bridge core
//!
//! I/O-free building blocks for relaying a phone call's media stream to a
//! conversational voice agent: the telephony envelope codec, fixed-size audio
//! framing, the per-call telephony state machine, the agent's session
//! configuration message, and outbound number validation.

pub mod agent_settings;
pub mod chunker;
pub mod codec;
pub mod phone;
pub mod telephony;
