//! Call Bridge Relay Library Crate
//!
//! This library contains the service side of the call bridge: configuration,
//! application state, HTTP handlers and routing, the external collaborators
//! (call creation, instructions fetch), and the WebSocket audio relay. The
//! `relay` binary is a thin wrapper around it.

pub mod calls;
pub mod config;
pub mod error;
pub mod handlers;
pub mod instructions;
pub mod router;
pub mod state;
pub mod ws;
