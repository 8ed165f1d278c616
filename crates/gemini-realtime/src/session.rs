//! Capability traits for a live upstream session and the events it produces.

use crate::types::{ClientContent, LiveServerContent, RealtimeInput, ResponseModality};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Fixed parameters sent when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    /// Model identifier, with or without the `models/` prefix.
    pub model: String,
    pub system_instruction: String,
    pub response_modality: ResponseModality,
}

impl SessionSetup {
    /// The model name in the `models/<id>` form the Live API expects.
    pub fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }
}

/// One decoded `serverContent` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveMessage {
    pub interrupted: bool,
    /// Base64 audio, one entry per inline-data part.
    pub audio: Vec<String>,
    /// All text parts of the turn, concatenated.
    pub text: Option<String>,
}

impl LiveMessage {
    /// True when the message carries nothing a client would see.
    pub fn is_empty(&self) -> bool {
        !self.interrupted && self.audio.is_empty() && self.text.is_none()
    }
}

impl From<LiveServerContent> for LiveMessage {
    fn from(content: LiveServerContent) -> Self {
        let mut audio = Vec::new();
        let mut text = String::new();
        for part in content.model_turn.map(|turn| turn.parts).unwrap_or_default() {
            if let Some(blob) = part.inline_data {
                audio.push(blob.data);
            }
            if let Some(t) = part.text {
                text.push_str(&t);
            }
        }
        Self {
            interrupted: content.interrupted.unwrap_or(false),
            audio,
            text: (!text.is_empty()).then_some(text),
        }
    }
}

/// Asynchronous callbacks from an established session, in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Message(LiveMessage),
    /// An upstream failure, with its message when one was provided.
    Error(Option<String>),
}

/// An established session together with its event stream.
///
/// The event receiver only exists once setup has completed, so no event can
/// be observed before the session is usable.
pub struct LiveConnection {
    pub session: Box<dyn LiveSession>,
    pub events: mpsc::Receiver<LiveEvent>,
}

/// Opens live sessions.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Connects and waits for the upstream to acknowledge `setup`.
    async fn connect(&self, setup: &SessionSetup) -> Result<LiveConnection>;
}

/// Send primitives of an established session.
#[async_trait]
pub trait LiveSession: Send {
    async fn send_realtime_input(&mut self, input: RealtimeInput) -> Result<()>;

    async fn send_client_content(&mut self, content: ClientContent) -> Result<()>;

    /// Closes the session. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}
