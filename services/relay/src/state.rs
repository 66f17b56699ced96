//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the configuration
//! and the external collaborators every request handler needs.

use crate::{
    calls::CallInitiator, config::Config, instructions::InstructionsSource,
    ws::agent::AgentConnector,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub calls: Arc<dyn CallInitiator>,
    /// `None` when no instructions URL is configured.
    pub instructions: Option<Arc<dyn InstructionsSource>>,
    pub agent: Arc<dyn AgentConnector>,
}
