//! tokio-tungstenite implementation of the Gemini Live session.

use crate::{
    session::{LiveConnection, LiveConnector, LiveEvent, LiveMessage, LiveSession, SessionSetup},
    types::{
        BidiGenerateContentSetup, ClientContent, ClientMessage, Content, GenerationConfig, Part,
        RealtimeInput, ServerMessage,
    },
};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::time::Duration;
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::protocol::{CloseFrame, Message as WsMessage, frame::coding::CloseCode},
};
use tracing::{debug, error, info, warn};

/// Gemini Live WebSocket endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

const EVENT_CHANNEL_CAPACITY: usize = 128;
const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens Gemini Live sessions with a shared API key.
#[derive(Clone)]
pub struct GeminiLiveConnector {
    endpoint: String,
    api_key: String,
    setup_timeout: Duration,
}

impl GeminiLiveConnector {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: GEMINI_LIVE_URL.to_string(),
            api_key: api_key.into(),
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }

    /// Overrides the WebSocket endpoint, e.g. for a local fake.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    fn url(&self) -> String {
        format!("{}?key={}", self.endpoint, self.api_key)
    }

    async fn handshake(&self, setup: &SessionSetup) -> Result<LiveConnection> {
        let (ws_stream, _) = connect_async(self.url())
            .await
            .context("Failed to connect to Gemini Live WebSocket")?;
        info!("Connected to Gemini Live WebSocket.");
        let (mut gemini_tx, mut gemini_rx) = ws_stream.split();

        let setup_msg = ClientMessage::Setup(BidiGenerateContentSetup {
            model: setup.model_path(),
            generation_config: GenerationConfig {
                response_modalities: vec![setup.response_modality],
            },
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part {
                    text: setup.system_instruction.clone(),
                }],
            }),
        });
        gemini_tx
            .send(WsMessage::Text(serde_json::to_string(&setup_msg)?.into()))
            .await
            .context("Failed to send Gemini setup message")?;

        // Nothing else may be sent until `setupComplete` arrives.
        loop {
            let frame = gemini_rx
                .next()
                .await
                .ok_or_else(|| anyhow!("Gemini closed the connection during setup"))?
                .context("Error reading from Gemini WebSocket during setup")?;
            let payload: &[u8] = match &frame {
                WsMessage::Text(text) => text.as_bytes(),
                WsMessage::Binary(data) => &data[..],
                WsMessage::Close(close_frame) => {
                    let reason = close_frame
                        .as_ref()
                        .map(|f| f.reason.to_string())
                        .unwrap_or_default();
                    bail!("Gemini rejected the session setup: {}", reason);
                }
                _ => continue,
            };
            match serde_json::from_slice::<ServerMessage>(payload) {
                Ok(msg) if msg.setup_complete.is_some() => break,
                Ok(msg) => warn!(?msg, "Received unexpected message during Gemini setup."),
                Err(e) => warn!(error = %e, "Failed to parse Gemini message during setup."),
            }
        }
        info!(model = %setup.model_path(), "Gemini session setup is complete.");

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_events(gemini_rx, events_tx));

        Ok(LiveConnection {
            session: Box::new(GeminiLiveSession {
                sink: gemini_tx,
                reader,
                closed: false,
            }),
            events: events_rx,
        })
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(&self, setup: &SessionSetup) -> Result<LiveConnection> {
        tokio::time::timeout(self.setup_timeout, self.handshake(setup))
            .await
            .map_err(|_| anyhow!("Timed out waiting for Gemini session setup"))?
    }
}

/// The send half of an established Gemini Live session.
///
/// Incoming frames are decoded by a reader task that stops when the session
/// is closed or dropped.
pub struct GeminiLiveSession {
    sink: SplitSink<WsStream, WsMessage>,
    reader: JoinHandle<()>,
    closed: bool,
}

impl GeminiLiveSession {
    async fn send(&mut self, msg: ClientMessage) -> Result<()> {
        if self.closed {
            bail!("Gemini session is closed");
        }
        let payload = serde_json::to_string(&msg)?;
        self.sink
            .send(WsMessage::Text(payload.into()))
            .await
            .context("Failed to send message to Gemini")
    }
}

#[async_trait]
impl LiveSession for GeminiLiveSession {
    async fn send_realtime_input(&mut self, input: RealtimeInput) -> Result<()> {
        self.send(ClientMessage::RealtimeInput(input.into())).await
    }

    async fn send_client_content(&mut self, content: ClientContent) -> Result<()> {
        self.send(ClientMessage::ClientContent(content)).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.reader.abort();
        self.sink
            .send(WsMessage::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })))
            .await
            .context("Failed to close Gemini WebSocket")?;
        debug!("Gemini session closed.");
        Ok(())
    }
}

impl Drop for GeminiLiveSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Decodes server frames into events until the stream ends or the receiver is gone.
async fn read_events(mut gemini_rx: SplitStream<WsStream>, events: mpsc::Sender<LiveEvent>) {
    while let Some(frame) = gemini_rx.next().await {
        let event = match frame {
            Ok(WsMessage::Text(text)) => decode_event(text.as_bytes()),
            Ok(WsMessage::Binary(data)) => decode_event(&data),
            Ok(WsMessage::Close(close_frame)) => {
                info!(?close_frame, "Gemini WebSocket connection closed by server.");
                if let Some(event) = close_event(close_frame) {
                    let _ = events.send(event).await;
                }
                break;
            }
            Ok(_) => None,
            Err(e) => {
                error!("Error reading from Gemini WebSocket: {}", e);
                let _ = events.send(LiveEvent::Error(Some(e.to_string()))).await;
                break;
            }
        };
        if let Some(event) = event {
            if events.send(event).await.is_err() {
                debug!("Event receiver dropped. Stopping Gemini reader.");
                break;
            }
        }
    }
}

fn decode_event(payload: &[u8]) -> Option<LiveEvent> {
    match serde_json::from_slice::<ServerMessage>(payload) {
        Ok(msg) => {
            if let Some(go_away) = msg.go_away {
                warn!(?go_away, "Gemini announced the session will end soon.");
            }
            msg.server_content
                .map(LiveMessage::from)
                .filter(|m| !m.is_empty())
                .map(LiveEvent::Message)
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse Gemini server message.");
            None
        }
    }
}

/// A normal close ends the stream quietly; anything else is reported.
fn close_event(close_frame: Option<CloseFrame>) -> Option<LiveEvent> {
    let frame = close_frame?;
    if frame.code == CloseCode::Normal {
        return None;
    }
    let reason = frame.reason.to_string();
    Some(LiveEvent::Error((!reason.is_empty()).then_some(reason)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_the_api_key() {
        let connector = GeminiLiveConnector::new("secret").with_endpoint("ws://localhost:9000/live");
        assert_eq!(connector.url(), "ws://localhost:9000/live?key=secret");
    }

    #[test]
    fn decode_event_skips_bookkeeping_messages() {
        assert_eq!(decode_event(br#"{"setupComplete":{}}"#), None);
        assert_eq!(decode_event(br#"{"serverContent":{"turnComplete":true}}"#), None);
        assert_eq!(decode_event(b"not json"), None);
    }

    #[test]
    fn decode_event_reports_interruption() {
        let event = decode_event(br#"{"serverContent":{"interrupted":true}}"#);
        assert_eq!(
            event,
            Some(LiveEvent::Message(LiveMessage {
                interrupted: true,
                ..Default::default()
            }))
        );
    }

    #[test]
    fn abnormal_close_becomes_an_error() {
        let normal = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        assert_eq!(close_event(Some(normal)), None);
        assert_eq!(close_event(None), None);

        let quota = CloseFrame {
            code: CloseCode::Policy,
            reason: "Quota exceeded".into(),
        };
        assert_eq!(
            close_event(Some(quota)),
            Some(LiveEvent::Error(Some("Quota exceeded".to_string())))
        );

        let silent = CloseFrame {
            code: CloseCode::Error,
            reason: "".into(),
        };
        assert_eq!(close_event(Some(silent)), Some(LiveEvent::Error(None)));
    }
}
