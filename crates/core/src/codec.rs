//! Telephony Frame Codec
//!
//! The telephony provider frames every media-stream message as a JSON text
//! envelope keyed by `event`. Audio travels inside `media` events as a base64
//! string of raw 8 kHz mulaw bytes. The agent side carries the same bytes
//! unwrapped, as binary WebSocket frames, so this module is the only place
//! that knows about the envelope.

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

/// Failures while decoding an inbound telephony message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed telephony event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
    #[error("Media payload is not valid base64: {0}")]
    MalformedPayload(#[from] base64::DecodeError),
}

/// Which leg of the call a media chunk belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTrack {
    /// Audio spoken by the remote call participant.
    Inbound,
    /// Audio played into the call (our own echo).
    Outbound,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Metadata carried by the `start` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStart {
    pub stream_sid: String,
    pub call_sid: Option<String>,
}

/// A decoded `media` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    pub track: MediaTrack,
    pub audio: Bytes,
}

/// A decoded telephony media-stream event.
///
/// Each variant carries only the fields that are meaningful for that kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyEvent {
    Connected,
    Start(StreamStart),
    Media(MediaChunk),
    Stop,
    /// Events we do not act on (`mark`, `dtmf`, ...).
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum Envelope {
    Connected,
    Start { start: StartBody },
    Media { media: MediaBody },
    Stop,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartBody {
    stream_sid: String,
    #[serde(default)]
    call_sid: Option<String>,
}

#[derive(Deserialize)]
struct MediaBody {
    #[serde(default)]
    track: MediaTrack,
    payload: String,
}

/// Decodes one text frame received from the telephony provider.
pub fn decode_event(text: &str) -> Result<TelephonyEvent, CodecError> {
    let event = match serde_json::from_str::<Envelope>(text)? {
        Envelope::Connected => TelephonyEvent::Connected,
        Envelope::Start { start } => TelephonyEvent::Start(StreamStart {
            stream_sid: start.stream_sid,
            call_sid: start.call_sid,
        }),
        Envelope::Media { media } => TelephonyEvent::Media(MediaChunk {
            track: media.track,
            audio: Bytes::from(STANDARD.decode(media.payload.as_bytes())?),
        }),
        Envelope::Stop => TelephonyEvent::Stop,
        Envelope::Other => TelephonyEvent::Other,
    };
    Ok(event)
}

/// Wraps raw audio into a provider-compatible outbound `media` event.
pub fn encode_media_event(stream_sid: &str, audio: &[u8]) -> String {
    json!({
        "event": "media",
        "streamSid": stream_sid,
        "media": { "payload": STANDARD.encode(audio) },
    })
    .to_string()
}
