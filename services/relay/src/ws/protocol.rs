//! Defines the WebSocket message protocol between the browser client and the relay.
//!
//! Inbound frames are parsed in two steps: first as JSON, then by their `type`
//! tag, so each failure maps to its own client-visible error.

use gemini_realtime::{Blob, ClientContent, RealtimeInput};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_AUDIO_MIME_TYPE: &str = "audio/pcm;rate=16000";
pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Sent when forwarding a valid message upstream fails.
pub const FORWARD_FAILED: &str = "Failed to process message.";
/// Sent when the upstream session cannot be established.
pub const SESSION_START_FAILED: &str = "Failed to start AI session.";
/// Sent when the upstream reports an error without a message.
pub const UPSTREAM_ERROR_FALLBACK: &str = "AI session error.";

/// Messages sent from the client (browser) to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Audio {
        chunk: String,
        mime_type: Option<String>,
    },
    Image {
        frame: String,
        mime_type: Option<String>,
    },
    Text {
        text: String,
        turn_complete: Option<bool>,
    },
    AudioEnd,
}

/// Reasons an inbound frame is rejected. `Display` is the exact text sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON message.")]
    InvalidJson,
    #[error("Audio chunk is missing.")]
    MissingAudioChunk,
    #[error("Image frame is missing.")]
    MissingImageFrame,
    #[error("Text input is missing.")]
    MissingText,
    #[error("Unsupported message type: {0}")]
    UnsupportedType(String),
}

/// An upstream call a valid client message translates into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamRequest {
    RealtimeInput(RealtimeInput),
    ClientContent(ClientContent),
}

impl ClientMessage {
    /// Parses and validates a raw frame.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(raw).map_err(|_| ProtocolError::InvalidJson)?;
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let kind = value.get("type");
        match kind.and_then(Value::as_str) {
            Some("audio") => Ok(Self::Audio {
                chunk: non_empty_str(value, "chunk").ok_or(ProtocolError::MissingAudioChunk)?,
                mime_type: non_empty_str(value, "mimeType"),
            }),
            Some("image") => Ok(Self::Image {
                frame: non_empty_str(value, "frame").ok_or(ProtocolError::MissingImageFrame)?,
                mime_type: non_empty_str(value, "mimeType"),
            }),
            Some("text") => {
                let text = value
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or(ProtocolError::MissingText)?;
                Ok(Self::Text {
                    text: text.to_string(),
                    turn_complete: value.get("turnComplete").and_then(Value::as_bool),
                })
            }
            Some("audio_end") => Ok(Self::AudioEnd),
            Some(other) => Err(ProtocolError::UnsupportedType(other.to_string())),
            None => Err(ProtocolError::UnsupportedType(
                kind.unwrap_or(&Value::Null).to_string(),
            )),
        }
    }

    /// Maps the message onto the upstream call that carries it, applying defaults.
    pub fn into_upstream(self) -> UpstreamRequest {
        match self {
            Self::Audio { chunk, mime_type } => UpstreamRequest::RealtimeInput(RealtimeInput::Audio(Blob {
                mime_type: mime_type.unwrap_or_else(|| DEFAULT_AUDIO_MIME_TYPE.to_string()),
                data: chunk,
            })),
            Self::Image { frame, mime_type } => UpstreamRequest::RealtimeInput(RealtimeInput::Media(Blob {
                mime_type: mime_type.unwrap_or_else(|| DEFAULT_IMAGE_MIME_TYPE.to_string()),
                data: frame,
            })),
            Self::Text {
                text,
                turn_complete,
            } => UpstreamRequest::ClientContent(ClientContent::user_text(
                text,
                turn_complete != Some(false),
            )),
            Self::AudioEnd => UpstreamRequest::RealtimeInput(RealtimeInput::AudioStreamEnd),
        }
    }
}

fn non_empty_str(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Messages sent from the relay to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The upstream session is established; the client may start streaming.
    Ready,
    /// A chunk of base64-encoded audio from the AI.
    Audio { chunk: String },
    /// Text produced by the AI.
    Text { text: String },
    /// The AI stopped speaking because the user interrupted.
    Interrupted,
    Error { error: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

impl From<ProtocolError> for ServerMessage {
    fn from(err: ProtocolError) -> Self {
        Self::error(err.to_string())
    }
}
