//! Agent Socket Adapter: the outbound leg to the voice agent.

use super::wire::{Connection, WireFrame};
use crate::error::RelayError;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use callbridge_core::agent_settings::AgentSettings;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::client::IntoClientRequest};
use tracing::{info, warn};

/// Opens connections to the voice agent.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self) -> anyhow::Result<Connection>;
}

/// Connects to a Deepgram-style agent endpoint, authenticating with the
/// `token` WebSocket sub-protocol.
pub struct DeepgramConnector {
    url: String,
    token: SecretString,
}

impl DeepgramConnector {
    pub fn new(url: String, token: SecretString) -> Self {
        Self { url, token }
    }
}

#[async_trait]
impl AgentConnector for DeepgramConnector {
    async fn connect(&self) -> anyhow::Result<Connection> {
        let mut request = self.url.as_str().into_client_request()?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            format!("token, {}", self.token.expose_secret()).parse()?,
        );

        let (ws_stream, _) = connect_async(request)
            .await
            .context("Failed to connect to agent WebSocket")?;
        info!(url = %self.url, "Connected to voice agent.");
        Ok(Connection::spawn(ws_stream, "agent"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentLinkState {
    Connecting,
    Open,
    Closed,
}

/// A classified frame received from the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentInbound {
    /// Diagnostic JSON describing what the agent is doing.
    Control(String),
    /// Synthesized speech for the caller.
    Audio(Bytes),
    Closed,
}

impl From<Option<WireFrame>> for AgentInbound {
    fn from(frame: Option<WireFrame>) -> Self {
        match frame {
            Some(WireFrame::Text(text)) => AgentInbound::Control(text),
            Some(WireFrame::Binary(audio)) => AgentInbound::Audio(audio),
            Some(WireFrame::Close) | None => AgentInbound::Closed,
        }
    }
}

/// Owns the outbound half of the agent connection.
///
/// The settings message is always the first frame written. Audio offered
/// while the link is not open is dropped, never queued.
#[derive(Debug)]
pub struct AgentAdapter {
    settings: AgentSettings,
    state: AgentLinkState,
    tx: Option<mpsc::Sender<WireFrame>>,
    frames_sent: u64,
    frames_dropped: u64,
}

impl AgentAdapter {
    pub fn new(settings: AgentSettings) -> Self {
        Self {
            settings,
            state: AgentLinkState::Connecting,
            tx: None,
            frames_sent: 0,
            frames_dropped: 0,
        }
    }

    pub fn state(&self) -> AgentLinkState {
        self.state
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Marks the link open and sends the session settings.
    pub async fn open(&mut self, tx: mpsc::Sender<WireFrame>) -> Result<(), RelayError> {
        let settings = self
            .settings
            .to_json()
            .map_err(|e| RelayError::AgentConnect(e.to_string()))?;
        if tx.send(WireFrame::Text(settings)).await.is_err() {
            self.state = AgentLinkState::Closed;
            return Err(RelayError::TransportNotReady("agent"));
        }
        info!("Sent agent settings configuration.");
        self.tx = Some(tx);
        self.state = AgentLinkState::Open;
        Ok(())
    }

    /// Forwards one caller audio frame to the agent.
    pub async fn forward_audio(&mut self, frame: Bytes) -> Result<(), RelayError> {
        let tx = match (&self.state, &self.tx) {
            (AgentLinkState::Open, Some(tx)) => tx,
            _ => {
                self.frames_dropped += 1;
                return Err(RelayError::TransportNotReady("agent"));
            }
        };
        if tx.send(WireFrame::Binary(frame)).await.is_err() {
            self.close();
            self.frames_dropped += 1;
            return Err(RelayError::TransportNotReady("agent"));
        }
        self.frames_sent += 1;
        Ok(())
    }

    pub fn close(&mut self) {
        if self.state != AgentLinkState::Closed {
            warn!(
                sent = self.frames_sent,
                dropped = self.frames_dropped,
                "Agent link closed"
            );
        }
        self.state = AgentLinkState::Closed;
        self.tx = None;
    }
}
