//! Manages the WebSocket connection lifecycle for one relayed AI session.
//!
//! Each client socket is paired with exactly one upstream session. A single
//! task owns both and multiplexes client frames, upstream events, and the
//! server's shutdown request, so per-connection events are handled in order.

use super::protocol::{
    ClientMessage, FORWARD_FAILED, SESSION_START_FAILED, ServerMessage, UPSTREAM_ERROR_FALLBACK,
    UpstreamRequest,
};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use gemini_realtime::{LiveConnection, LiveEvent, LiveSession};
use std::{sync::Arc, time::Duration};
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Close reason sent to every client when the server stops.
pub const SHUTDOWN_REASON: &str = "Server shutting down";
const SESSION_FAILED_REASON: &str = "AI session unavailable";
/// How long a client-initiated close may take to flush its reply.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the upstream session to be established.
    Connecting,
    /// Upstream is established and `ready` was sent.
    Ready,
    /// At least one client message has been dispatched.
    Active,
    Closing,
    Closed,
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for an individual WebSocket connection.
#[instrument(name = "ws_connection", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", tracing::field::display(connection_id));
    info!("New WebSocket connection.");

    let mut conn = Connection::new(socket);
    let Some(shutdown_rx) = state.registry.register(connection_id).await else {
        warn!("Server is shutting down. Rejecting connection.");
        conn.close_transport(close_code::AWAY, SHUTDOWN_REASON).await;
        conn.transition(ConnectionState::Closed);
        return;
    };

    conn.run(&state, shutdown_rx).await;

    state.registry.unregister(connection_id).await;
    info!("WebSocket connection finished.");
}

/// One client socket and its lifecycle state.
struct Connection {
    socket: WebSocket,
    state: ConnectionState,
    transport_open: bool,
}

impl Connection {
    fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            state: ConnectionState::Connecting,
            transport_open: true,
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = ?self.state, to = ?next, "Connection state changed.");
        self.state = next;
    }

    async fn run(&mut self, state: &AppState, mut shutdown_rx: oneshot::Receiver<()>) {
        // Client frames are not read until setup finishes; anything sent early
        // waits in the transport and is dispatched in order afterwards.
        let connected = tokio::select! {
            result = state.connector.connect(&state.session_setup) => result,
            Ok(()) = &mut shutdown_rx => {
                info!("Server shutting down during upstream setup.");
                self.close_transport(close_code::AWAY, SHUTDOWN_REASON).await;
                self.transition(ConnectionState::Closed);
                return;
            }
        };

        let LiveConnection {
            mut session,
            mut events,
        } = match connected {
            Ok(live) => live,
            Err(e) => {
                error!(error = ?e, "Failed to establish upstream session.");
                self.send(ServerMessage::error(SESSION_START_FAILED)).await;
                self.close_transport(close_code::ERROR, SESSION_FAILED_REASON).await;
                self.transition(ConnectionState::Closed);
                return;
            }
        };

        self.transition(ConnectionState::Ready);
        self.send(ServerMessage::Ready).await;

        let mut upstream_open = true;
        loop {
            tokio::select! {
                Ok(()) = &mut shutdown_rx => {
                    info!("Server shutting down. Closing connection.");
                    self.transition(ConnectionState::Closing);
                    close_upstream(session.as_mut()).await;
                    self.close_transport(close_code::AWAY, SHUTDOWN_REASON).await;
                    self.transition(ConnectionState::Closed);
                    return;
                }
                frame = self.socket.recv() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.dispatch(session.as_mut(), text.as_str().as_bytes()).await;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.dispatch(session.as_mut(), &data).await;
                        }
                        Some(Ok(Message::Close(close_frame))) => {
                            info!(?close_frame, "Client sent close frame.");
                            self.finish_close_handshake().await;
                            break;
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "Error receiving from client WebSocket.");
                            break;
                        }
                        None => {
                            info!("Client disconnected.");
                            break;
                        }
                    }
                }
                event = events.recv(), if upstream_open => {
                    match event {
                        Some(event) => {
                            for msg in translate_event(event) {
                                self.send(msg).await;
                            }
                        }
                        None => {
                            warn!("Upstream session ended. Further messages will fail to forward.");
                            upstream_open = false;
                        }
                    }
                }
            }
        }

        // The client is gone; release the paired upstream session.
        self.transport_open = false;
        self.transition(ConnectionState::Closing);
        close_upstream(session.as_mut()).await;
        self.transition(ConnectionState::Closed);
    }

    async fn dispatch(&mut self, session: &mut dyn LiveSession, raw: &[u8]) {
        if self.state == ConnectionState::Ready {
            self.transition(ConnectionState::Active);
        }
        if let Some(reply) = handle_client_frame(session, raw).await {
            self.send(reply).await;
        }
    }

    /// Sends to the client, silently dropping the message once the transport is gone.
    async fn send(&mut self, msg: ServerMessage) {
        if !self.transport_open {
            debug!(?msg, "Client transport is closed. Dropping outbound message.");
            return;
        }
        if let Err(e) = send_msg(&mut self.socket, &msg).await {
            debug!(error = ?e, "Failed to send to client. Treating transport as closed.");
            self.transport_open = false;
        }
    }

    /// Keeps reading after the client's close frame so the queued reply is written.
    async fn finish_close_handshake(&mut self) {
        self.transport_open = false;
        let socket = &mut self.socket;
        let drained = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
            while let Some(Ok(_)) = socket.recv().await {}
        })
        .await;
        if drained.is_err() {
            debug!("Client did not finish the close handshake in time.");
        }
    }

    async fn close_transport(&mut self, code: u16, reason: &'static str) {
        if !self.transport_open {
            return;
        }
        self.transport_open = false;
        let frame = CloseFrame {
            code,
            reason: Utf8Bytes::from_static(reason),
        };
        if let Err(e) = self.socket.send(Message::Close(Some(frame))).await {
            warn!(error = %e, code, "Failed to close client WebSocket.");
        }
    }
}

/// Validates one client frame and forwards it upstream.
///
/// Returns the error message to report to the client, if any. Failures never
/// escape this function; the connection survives them.
pub async fn handle_client_frame(
    session: &mut dyn LiveSession,
    raw: &[u8],
) -> Option<ServerMessage> {
    let msg = match ClientMessage::parse(raw) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(error = %e, "Rejected client message.");
            return Some(e.into());
        }
    };

    let result = match msg.into_upstream() {
        UpstreamRequest::RealtimeInput(input) => session.send_realtime_input(input).await,
        UpstreamRequest::ClientContent(content) => session.send_client_content(content).await,
    };
    match result {
        Ok(()) => None,
        Err(e) => {
            error!(error = ?e, "Failed to forward message upstream.");
            Some(ServerMessage::error(FORWARD_FAILED))
        }
    }
}

/// Maps one upstream event onto the client messages it produces, in order.
pub fn translate_event(event: LiveEvent) -> Vec<ServerMessage> {
    match event {
        LiveEvent::Message(message) => {
            let mut out = Vec::with_capacity(message.audio.len() + 2);
            if message.interrupted {
                out.push(ServerMessage::Interrupted);
            }
            out.extend(
                message
                    .audio
                    .into_iter()
                    .map(|chunk| ServerMessage::Audio { chunk }),
            );
            if let Some(text) = message.text {
                out.push(ServerMessage::Text { text });
            }
            out
        }
        LiveEvent::Error(message) => {
            warn!(?message, "Upstream session reported an error.");
            vec![ServerMessage::error(
                message.unwrap_or_else(|| UPSTREAM_ERROR_FALLBACK.to_string()),
            )]
        }
    }
}

async fn close_upstream(session: &mut dyn LiveSession) {
    if let Err(e) = session.close().await {
        warn!(error = ?e, "Failed to close upstream session.");
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(socket: &mut WebSocket, msg: &ServerMessage) -> Result<()> {
    let serialized = serde_json::to_string(msg)?;
    socket.send(Message::Text(serialized.into())).await?;
    Ok(())
}
