//! Session Orchestrator: one task per call owning both legs.
//!
//! All handlers for a session run on this single task, so the inbound audio
//! accumulator has exactly one writer and frames reach the agent in arrival
//! order. The agent connection is opened concurrently with the telephony
//! stream; caller audio produced before it is open is dropped.

use super::{
    agent::{AgentAdapter, AgentConnector, AgentInbound},
    telephony::TelephonyAdapter,
    wire::{Connection, WireFrame},
};
use crate::error::RelayError;
use callbridge_core::{
    agent_settings::AgentSettings,
    telephony::{DEFAULT_PENDING_LIMIT, Inbound},
};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tunables for one relay session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub chunk_len: NonZeroUsize,
    pub pending_limit: usize,
    /// Upper bound on waiting for a closing socket to flush.
    pub teardown_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk_len: NonZeroUsize::new(callbridge_core::chunker::DEFAULT_CHUNK_LEN)
                .unwrap_or(NonZeroUsize::MIN),
            pending_limit: DEFAULT_PENDING_LIMIT,
            teardown_grace: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The provider sent `stop`.
    TelephonyStopped,
    /// The telephony socket closed without `stop`.
    TelephonyClosed,
    AgentClosed,
    /// The agent connection could not be established.
    AgentUnavailable,
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub stream_sid: Option<String>,
    pub frames_to_agent: u64,
    pub frames_to_caller: u64,
    /// Audio discarded in either direction.
    pub frames_dropped: u64,
    pub ended_by: EndReason,
}

async fn next_agent_frame(agent: &mut Option<Connection>) -> Option<WireFrame> {
    match agent {
        Some(connection) => connection.rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Runs one call: relays audio both ways until either side ends, then closes
/// the other side.
pub async fn run_session(
    mut telephony_conn: Connection,
    connector: Arc<dyn AgentConnector>,
    settings: AgentSettings,
    options: SessionOptions,
) -> SessionReport {
    let mut telephony = TelephonyAdapter::new(
        telephony_conn.tx.clone(),
        options.chunk_len,
        options.pending_limit,
    );
    let mut agent = AgentAdapter::new(settings);
    let mut agent_conn: Option<Connection> = None;

    let connect = connector.connect();
    tokio::pin!(connect);
    let mut connecting = true;

    let ended_by = loop {
        tokio::select! {
            result = &mut connect, if connecting => {
                connecting = false;
                match result {
                    Ok(connection) => {
                        let tx = connection.tx.clone();
                        agent_conn = Some(connection);
                        if let Err(e) = agent.open(tx).await {
                            error!(error = %e, "Agent socket closed before settings were sent");
                            break EndReason::AgentClosed;
                        }
                    }
                    Err(e) => {
                        error!(error = %RelayError::AgentConnect(format!("{e:#}")), "Ending session");
                        break EndReason::AgentUnavailable;
                    }
                }
            },
            frame = telephony_conn.rx.recv() => {
                match frame {
                    Some(WireFrame::Text(text)) => {
                        let inbound = match telephony.handle_text(&text).await {
                            Ok(inbound) => inbound,
                            Err(e) => {
                                warn!(error = %e, "Telephony socket unavailable");
                                break EndReason::TelephonyClosed;
                            }
                        };
                        match inbound {
                            Inbound::Frames(frames) => {
                                for frame in frames {
                                    if let Err(e) = agent.forward_audio(frame).await {
                                        warn!(error = %e, "Dropping caller audio frame");
                                    }
                                }
                            }
                            Inbound::Stopped => break EndReason::TelephonyStopped,
                            Inbound::Started { .. } | Inbound::Ignored => {}
                        }
                    }
                    Some(WireFrame::Binary(data)) => {
                        debug!(bytes = data.len(), "Ignoring binary frame on telephony socket");
                    }
                    Some(WireFrame::Close) | None => break EndReason::TelephonyClosed,
                }
            },
            frame = next_agent_frame(&mut agent_conn) => {
                match AgentInbound::from(frame) {
                    AgentInbound::Control(text) => info!(agent_event = %text, "Agent event"),
                    AgentInbound::Audio(audio) => {
                        if let Err(e) = telephony.relay_agent_audio(audio).await {
                            warn!(error = %e, "Telephony socket unavailable");
                            break EndReason::TelephonyClosed;
                        }
                    }
                    AgentInbound::Closed => break EndReason::AgentClosed,
                }
            },
        }
    };

    let report = SessionReport {
        stream_sid: telephony.stream_sid().map(str::to_owned),
        frames_to_agent: agent.frames_sent(),
        frames_to_caller: telephony.frames_sent(),
        frames_dropped: agent.frames_dropped() + telephony.frames_dropped(),
        ended_by,
    };
    info!(reason = ?ended_by, "Session ending, closing both legs");

    telephony.close();
    agent.close();
    let grace = options.teardown_grace;
    match agent_conn {
        Some(agent_conn) => {
            tokio::join!(telephony_conn.shutdown(grace), agent_conn.shutdown(grace));
        }
        None => telephony_conn.shutdown(grace).await,
    }
    report
}
