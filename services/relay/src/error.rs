//! Error taxonomy for the relay service.
//!
//! None of these are fatal to the process: transport errors drop a frame,
//! upstream failures degrade the session, and validation or call-creation
//! failures are reported back to the HTTP caller as a structured result.

use callbridge_core::phone::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0} socket is not open")]
    TransportNotReady(&'static str),
    #[error("Instructions fetch failed: {0}")]
    UpstreamFetchFailure(String),
    #[error("{0}")]
    CallCreationFailure(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Agent connection failed: {0}")]
    AgentConnect(String),
}
