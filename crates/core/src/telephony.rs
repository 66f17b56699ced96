//! Telephony leg state machine.
//!
//! Tracks the lifecycle of the provider's media stream (`AwaitingStart ->
//! Connected -> Closed`), feeds inbound caller audio through the
//! [`AudioChunker`], and turns agent audio into outbound `media` events once
//! the stream identifier is known. This type performs no I/O; the relay
//! service owns the socket and acts on the values returned here.

use crate::chunker::AudioChunker;
use crate::codec::{self, MediaTrack, TelephonyEvent};
use bytes::Bytes;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use tracing::{debug, info, warn};

/// Outbound audio held while waiting for `start`: 10 s of 8 kHz mulaw.
pub const DEFAULT_PENDING_LIMIT: usize = 80_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegState {
    AwaitingStart,
    Connected { stream_sid: String },
    /// Keeps the latched identifier, if `start` was ever seen.
    Closed { stream_sid: Option<String> },
}

/// What the caller of [`TelephonyLeg::on_event`] should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The stream identifier was latched. `flushed` holds encoded media
    /// events for agent audio that arrived before it, in order.
    Started {
        stream_sid: String,
        flushed: Vec<String>,
    },
    /// Complete frames ready for the agent. May be empty.
    Frames(Vec<Bytes>),
    /// The provider ended the stream.
    Stopped,
    Ignored,
}

/// What the caller of [`TelephonyLeg::outbound_audio`] should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send this text frame on the telephony socket.
    Send(String),
    /// Held until the stream identifier arrives.
    Buffered,
    /// Discarded: the leg is closed or the pending buffer is full.
    Dropped,
}

#[derive(Debug)]
pub struct TelephonyLeg {
    state: LegState,
    chunker: AudioChunker,
    pending: VecDeque<Bytes>,
    pending_bytes: usize,
    pending_limit: usize,
}

impl TelephonyLeg {
    pub fn new(chunk_len: NonZeroUsize, pending_limit: usize) -> Self {
        Self {
            state: LegState::AwaitingStart,
            chunker: AudioChunker::new(chunk_len),
            pending: VecDeque::new(),
            pending_bytes: 0,
            pending_limit,
        }
    }

    pub fn state(&self) -> &LegState {
        &self.state
    }

    pub fn stream_sid(&self) -> Option<&str> {
        match &self.state {
            LegState::Connected { stream_sid } => Some(stream_sid),
            LegState::Closed { stream_sid } => stream_sid.as_deref(),
            LegState::AwaitingStart => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, LegState::Closed { .. })
    }

    /// Bytes of inbound audio not yet forming a full frame.
    pub fn buffered_inbound(&self) -> usize {
        self.chunker.remainder().len()
    }

    /// Bytes of agent audio waiting for the stream identifier.
    pub fn pending_outbound(&self) -> usize {
        self.pending_bytes
    }

    /// Applies one decoded provider event.
    pub fn on_event(&mut self, event: TelephonyEvent) -> Inbound {
        if self.is_closed() {
            debug!(?event, "Telephony leg closed, ignoring event");
            return Inbound::Ignored;
        }

        match event {
            TelephonyEvent::Start(start) => {
                if let Some(current) = self.stream_sid() {
                    warn!(
                        current,
                        ignored = %start.stream_sid,
                        "Duplicate start event, keeping the first stream id"
                    );
                    return Inbound::Ignored;
                }
                info!(stream_sid = %start.stream_sid, call_sid = ?start.call_sid, "Media stream started");
                let flushed = self
                    .pending
                    .drain(..)
                    .map(|audio| codec::encode_media_event(&start.stream_sid, &audio))
                    .collect();
                self.pending_bytes = 0;
                self.state = LegState::Connected {
                    stream_sid: start.stream_sid.clone(),
                };
                Inbound::Started {
                    stream_sid: start.stream_sid,
                    flushed,
                }
            }
            TelephonyEvent::Media(chunk) if chunk.track == MediaTrack::Inbound => {
                self.chunker.feed(&chunk.audio);
                Inbound::Frames(self.chunker.drain().collect())
            }
            TelephonyEvent::Media(_) => Inbound::Ignored,
            TelephonyEvent::Stop => {
                info!(stream_sid = ?self.stream_sid(), "Media stream stopped");
                self.close();
                Inbound::Stopped
            }
            TelephonyEvent::Connected | TelephonyEvent::Other => Inbound::Ignored,
        }
    }

    /// Wraps agent audio for the provider, or holds it until `start`.
    pub fn outbound_audio(&mut self, audio: Bytes) -> Outbound {
        match &self.state {
            LegState::Connected { stream_sid } => {
                Outbound::Send(codec::encode_media_event(stream_sid, &audio))
            }
            LegState::AwaitingStart => {
                if self.pending_bytes + audio.len() > self.pending_limit {
                    warn!(
                        bytes = audio.len(),
                        pending = self.pending_bytes,
                        "Pending agent audio limit reached before stream start, dropping audio"
                    );
                    return Outbound::Dropped;
                }
                self.pending_bytes += audio.len();
                self.pending.push_back(audio);
                Outbound::Buffered
            }
            LegState::Closed { .. } => {
                debug!(bytes = audio.len(), "Telephony leg closed, dropping agent audio");
                Outbound::Dropped
            }
        }
    }

    /// Moves to `Closed` and releases any buffered audio. The stream
    /// identifier stays readable.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        let stream_sid = self.stream_sid().map(str::to_owned);
        self.state = LegState::Closed { stream_sid };
        self.chunker.clear();
        self.pending.clear();
        self.pending_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{MediaChunk, StreamStart};

    fn leg() -> TelephonyLeg {
        TelephonyLeg::new(NonZeroUsize::new(4).unwrap(), 10)
    }

    fn start(sid: &str) -> TelephonyEvent {
        TelephonyEvent::Start(StreamStart {
            stream_sid: sid.to_string(),
            call_sid: None,
        })
    }

    fn media(track: MediaTrack, audio: &'static [u8]) -> TelephonyEvent {
        TelephonyEvent::Media(MediaChunk {
            track,
            audio: Bytes::from_static(audio),
        })
    }

    #[test]
    fn start_latches_the_stream_id_once() {
        let mut leg = leg();
        assert_eq!(leg.state(), &LegState::AwaitingStart);

        assert!(matches!(leg.on_event(start("MZ1")), Inbound::Started { .. }));
        assert_eq!(leg.stream_sid(), Some("MZ1"));

        assert_eq!(leg.on_event(start("MZ2")), Inbound::Ignored);
        assert_eq!(leg.stream_sid(), Some("MZ1"));
    }

    #[test]
    fn only_inbound_track_is_chunked() {
        let mut leg = leg();
        assert_eq!(
            leg.on_event(media(MediaTrack::Outbound, &[9, 9, 9, 9])),
            Inbound::Ignored
        );
        assert_eq!(
            leg.on_event(media(MediaTrack::Inbound, &[1, 2, 3])),
            Inbound::Frames(vec![])
        );
        assert_eq!(
            leg.on_event(media(MediaTrack::Inbound, &[4, 5])),
            Inbound::Frames(vec![Bytes::from_static(&[1, 2, 3, 4])])
        );
        assert_eq!(leg.buffered_inbound(), 1);
    }

    #[test]
    fn agent_audio_before_start_is_flushed_in_order() {
        let mut leg = leg();
        assert_eq!(
            leg.outbound_audio(Bytes::from_static(b"ab")),
            Outbound::Buffered
        );
        assert_eq!(
            leg.outbound_audio(Bytes::from_static(b"cd")),
            Outbound::Buffered
        );
        assert_eq!(leg.pending_outbound(), 4);

        match leg.on_event(start("MZ7")) {
            Inbound::Started {
                stream_sid,
                flushed,
            } => {
                assert_eq!(stream_sid, "MZ7");
                assert_eq!(
                    flushed,
                    vec![
                        codec::encode_media_event("MZ7", b"ab"),
                        codec::encode_media_event("MZ7", b"cd"),
                    ]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(leg.pending_outbound(), 0);
        assert_eq!(
            leg.outbound_audio(Bytes::from_static(b"ef")),
            Outbound::Send(codec::encode_media_event("MZ7", b"ef"))
        );
    }

    #[test]
    fn pending_limit_drops_overflow() {
        let mut leg = leg();
        assert_eq!(
            leg.outbound_audio(Bytes::from_static(b"12345678")),
            Outbound::Buffered
        );
        assert_eq!(
            leg.outbound_audio(Bytes::from_static(b"abc")),
            Outbound::Dropped
        );
        assert_eq!(leg.outbound_audio(Bytes::from_static(b"xy")), Outbound::Buffered);
        assert_eq!(leg.pending_outbound(), 10);
    }

    #[test]
    fn stop_closes_the_leg() {
        let mut leg = leg();
        leg.on_event(start("MZ1"));
        leg.on_event(media(MediaTrack::Inbound, &[1]));

        assert_eq!(leg.on_event(TelephonyEvent::Stop), Inbound::Stopped);
        assert!(leg.is_closed());
        assert_eq!(leg.buffered_inbound(), 0);
        assert_eq!(leg.stream_sid(), Some("MZ1"));
        assert_eq!(
            leg.on_event(media(MediaTrack::Inbound, &[1, 2, 3, 4])),
            Inbound::Ignored
        );
        assert_eq!(
            leg.outbound_audio(Bytes::from_static(b"zz")),
            Outbound::Dropped
        );
    }

    #[test]
    fn stream_id_survives_stop_and_repeated_close() {
        let mut leg = leg();
        leg.on_event(start("MZ1"));
        leg.on_event(TelephonyEvent::Stop);
        leg.close();

        assert_eq!(
            leg.state(),
            &LegState::Closed {
                stream_sid: Some("MZ1".to_string())
            }
        );
        assert_eq!(leg.stream_sid(), Some("MZ1"));
        assert_eq!(leg.on_event(start("MZ2")), Inbound::Ignored);
        assert_eq!(leg.stream_sid(), Some("MZ1"));
    }

    #[test]
    fn closing_before_start_has_no_stream_id() {
        let mut leg = leg();
        leg.close();
        assert_eq!(leg.state(), &LegState::Closed { stream_sid: None });
        assert_eq!(leg.stream_sid(), None);
    }

    #[test]
    fn media_before_start_is_still_chunked() {
        let mut leg = leg();
        assert_eq!(
            leg.on_event(media(MediaTrack::Inbound, &[1, 2, 3, 4])),
            Inbound::Frames(vec![Bytes::from_static(&[1, 2, 3, 4])])
        );
    }
}
