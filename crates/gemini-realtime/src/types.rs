//! Wire types for the Gemini Live `BidiGenerateContent` protocol.

use serde::{Deserialize, Serialize};

/// Top-level messages sent from the client to Gemini.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(BidiGenerateContentSetup),
    RealtimeInput(BidiGenerateContentRealtimeInput),
    ClientContent(ClientContent),
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentSetup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Text,
    Audio,
}

/// A conversational turn, made of one or more text parts.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub text: String,
}

/// Discrete conversational content with an explicit completion flag.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

impl ClientContent {
    /// A single user turn holding `text`.
    pub fn user_text(text: impl Into<String>, turn_complete: bool) -> Self {
        Self {
            turns: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: text.into() }],
            }],
            turn_complete,
        }
    }
}

/// Base64-encoded media with its MIME type.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// A streamed unit of input, as opposed to a discrete turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeInput {
    Audio(Blob),
    /// Image frames travel on the `video` channel of the Live API.
    Media(Blob),
    AudioStreamEnd,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentRealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

impl From<RealtimeInput> for BidiGenerateContentRealtimeInput {
    fn from(input: RealtimeInput) -> Self {
        match input {
            RealtimeInput::Audio(blob) => Self {
                audio: Some(blob),
                ..Default::default()
            },
            RealtimeInput::Media(blob) => Self {
                video: Some(blob),
                ..Default::default()
            },
            RealtimeInput::AudioStreamEnd => Self {
                audio_stream_end: Some(true),
                ..Default::default()
            },
        }
    }
}

/// Top-level messages received from Gemini. Unknown fields are ignored.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<LiveServerContent>,
    pub go_away: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LiveServerContent {
    pub model_turn: Option<ServerContentTurn>,
    pub interrupted: Option<bool>,
    pub turn_complete: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ServerContentTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    pub text: Option<String>,
    pub inline_data: Option<ServerBlob>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerBlob {
    pub mime_type: Option<String>,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn setup_serializes_with_system_instruction() {
        let msg = ClientMessage::Setup(BidiGenerateContentSetup {
            model: "models/gemini-2.0-flash-live-001".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
            },
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part {
                    text: "Be brief.".to_string(),
                }],
            }),
        });

        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "setup": {
                    "model": "models/gemini-2.0-flash-live-001",
                    "generationConfig": { "responseModalities": ["AUDIO"] },
                    "systemInstruction": { "parts": [{ "text": "Be brief." }] }
                }
            })
        );
    }

    #[test]
    fn realtime_inputs_map_to_their_channels() {
        let blob = Blob {
            mime_type: "image/jpeg".to_string(),
            data: "/9j/".to_string(),
        };
        let media = ClientMessage::RealtimeInput(RealtimeInput::Media(blob).into());
        assert_eq!(
            serde_json::to_value(&media).unwrap(),
            json!({ "realtimeInput": { "video": { "mimeType": "image/jpeg", "data": "/9j/" } } })
        );

        let end = ClientMessage::RealtimeInput(RealtimeInput::AudioStreamEnd.into());
        assert_eq!(
            serde_json::to_value(&end).unwrap(),
            json!({ "realtimeInput": { "audioStreamEnd": true } })
        );
    }

    #[test]
    fn user_text_builds_a_single_user_turn() {
        let msg = ClientMessage::ClientContent(ClientContent::user_text("hi", false));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "clientContent": {
                    "turns": [{ "role": "user", "parts": [{ "text": "hi" }] }],
                    "turnComplete": false
                }
            })
        );
    }

    #[test]
    fn server_content_ignores_unknown_fields() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": { "parts": [{ "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAA=" } }] },
                "turnComplete": true,
                "usageMetadata": { "totalTokenCount": 12 }
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let content = msg.server_content.unwrap();
        assert_eq!(content.turn_complete, Some(true));
        assert_eq!(content.model_turn.unwrap().parts[0].inline_data.as_ref().unwrap().data, "AAA=");
        assert!(msg.setup_complete.is_none());
    }
}
