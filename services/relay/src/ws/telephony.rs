//! Telephony Socket Adapter: the inbound leg from the phone provider.

use super::wire::WireFrame;
use crate::error::RelayError;
use bytes::Bytes;
use callbridge_core::{
    codec,
    telephony::{Inbound, LegState, Outbound, TelephonyLeg},
};
use std::num::NonZeroUsize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Wraps the provider-facing [`TelephonyLeg`] together with the socket's
/// outbound channel.
#[derive(Debug)]
pub struct TelephonyAdapter {
    leg: TelephonyLeg,
    tx: mpsc::Sender<WireFrame>,
    frames_sent: u64,
    frames_dropped: u64,
}

impl TelephonyAdapter {
    pub fn new(tx: mpsc::Sender<WireFrame>, chunk_len: NonZeroUsize, pending_limit: usize) -> Self {
        Self {
            leg: TelephonyLeg::new(chunk_len, pending_limit),
            tx,
            frames_sent: 0,
            frames_dropped: 0,
        }
    }

    pub fn state(&self) -> &LegState {
        self.leg.state()
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.leg.stream_sid()
    }

    /// Audio frames delivered to the caller so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Agent audio discarded because the leg was closed or the pending
    /// buffer was full.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Decodes and applies one text frame from the provider.
    ///
    /// Undecodable events are skipped; the session carries on.
    pub async fn handle_text(&mut self, text: &str) -> Result<Inbound, RelayError> {
        let event = match codec::decode_event(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable telephony event");
                return Ok(Inbound::Ignored);
            }
        };

        let inbound = self.leg.on_event(event);
        if let Inbound::Started { flushed, .. } = &inbound {
            for message in flushed {
                self.send(message.clone()).await?;
            }
            if !flushed.is_empty() {
                debug!(count = flushed.len(), "Flushed agent audio held before stream start");
            }
        }
        Ok(inbound)
    }

    /// Sends agent audio to the caller, or holds it until the stream starts.
    pub async fn relay_agent_audio(&mut self, audio: Bytes) -> Result<Outbound, RelayError> {
        let outbound = self.leg.outbound_audio(audio);
        match &outbound {
            Outbound::Send(message) => self.send(message.clone()).await?,
            Outbound::Dropped => self.frames_dropped += 1,
            Outbound::Buffered => {}
        }
        Ok(outbound)
    }

    pub fn close(&mut self) {
        self.leg.close();
    }

    async fn send(&mut self, message: String) -> Result<(), RelayError> {
        self.tx
            .send(WireFrame::Text(message))
            .await
            .map_err(|_| RelayError::TransportNotReady("telephony"))?;
        self.frames_sent += 1;
        Ok(())
    }
}
