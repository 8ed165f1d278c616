//! Drives `GeminiLiveConnector` against a local fake of the Live endpoint.

use futures_util::{SinkExt, StreamExt};
use gemini_realtime::{
    Blob, ClientContent, GeminiLiveConnector, LiveConnector, LiveEvent, LiveMessage,
    RealtimeInput, ResponseModality, SessionSetup,
};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    WebSocketStream, accept_async,
    tungstenite::protocol::{CloseFrame, Message, frame::coding::CloseCode},
};

const TIMEOUT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

fn setup() -> SessionSetup {
    SessionSetup {
        model: "gemini-2.0-flash-live-001".to_string(),
        system_instruction: "You are a real-time tutor.".to_string(),
        response_modality: ResponseModality::Audio,
    }
}

/// Binds a fake endpoint and returns its URL and the accepted socket future.
async fn fake_gemini() -> (String, tokio::task::JoinHandle<ServerSocket>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        accept_async(stream).await.unwrap()
    });
    (format!("ws://{addr}/live"), accept)
}

async fn next_json(socket: &mut ServerSocket) -> Value {
    loop {
        let msg = timeout(TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for client frame")
            .expect("client stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn setup_waits_for_setup_complete_and_forwards_inputs() {
    let (url, accept) = fake_gemini().await;
    let connector = GeminiLiveConnector::new("test-key").with_endpoint(url);

    let server = tokio::spawn(async move {
        let mut socket = accept.await.unwrap();
        let setup = next_json(&mut socket).await;
        assert_eq!(setup["setup"]["model"], "models/gemini-2.0-flash-live-001");
        assert_eq!(setup["setup"]["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            setup["setup"]["systemInstruction"]["parts"][0]["text"],
            "You are a real-time tutor."
        );
        // Gemini answers with binary JSON frames.
        socket
            .send(Message::Binary(br#"{"setupComplete":{}}"#.to_vec().into()))
            .await
            .unwrap();

        let audio = next_json(&mut socket).await;
        assert_eq!(
            audio,
            json!({ "realtimeInput": { "audio": { "mimeType": "audio/pcm;rate=16000", "data": "AAA=" } } })
        );
        let turn = next_json(&mut socket).await;
        assert_eq!(turn["clientContent"]["turns"][0]["role"], "user");
        assert_eq!(turn["clientContent"]["turnComplete"], true);

        let reply = json!({
            "serverContent": {
                "modelTurn": { "parts": [
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "UklGRg==" } },
                    { "text": "Hello there" }
                ] }
            }
        });
        socket.send(Message::Text(reply.to_string().into())).await.unwrap();
        socket
            .send(Message::Text(r#"{"serverContent":{"interrupted":true}}"#.into()))
            .await
            .unwrap();
        socket
    });

    let mut connection = timeout(TIMEOUT, connector.connect(&setup()))
        .await
        .unwrap()
        .expect("session should be established");

    connection
        .session
        .send_realtime_input(RealtimeInput::Audio(Blob {
            mime_type: "audio/pcm;rate=16000".to_string(),
            data: "AAA=".to_string(),
        }))
        .await
        .unwrap();
    connection
        .session
        .send_client_content(ClientContent::user_text("hi", true))
        .await
        .unwrap();

    let first = timeout(TIMEOUT, connection.events.recv()).await.unwrap();
    assert_eq!(
        first,
        Some(LiveEvent::Message(LiveMessage {
            interrupted: false,
            audio: vec!["UklGRg==".to_string()],
            text: Some("Hello there".to_string()),
        }))
    );
    let second = timeout(TIMEOUT, connection.events.recv()).await.unwrap();
    assert!(matches!(second, Some(LiveEvent::Message(m)) if m.interrupted));

    let _socket = server.await.unwrap();
    connection.session.close().await.unwrap();
    // A second close is a no-op.
    connection.session.close().await.unwrap();
    assert!(
        connection
            .session
            .send_realtime_input(RealtimeInput::AudioStreamEnd)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn rejected_setup_is_an_error() {
    let (url, accept) = fake_gemini().await;
    let connector = GeminiLiveConnector::new("bad-key").with_endpoint(url);

    tokio::spawn(async move {
        let mut socket = accept.await.unwrap();
        let _setup = next_json(&mut socket).await;
        let _ = socket
            .close(Some(CloseFrame {
                code: CloseCode::Policy,
                reason: "API key not valid".into(),
            }))
            .await;
    });

    let result = timeout(TIMEOUT, connector.connect(&setup())).await.unwrap();
    let err = result.err().expect("setup should fail");
    assert!(err.to_string().contains("API key not valid"));
}

#[tokio::test]
async fn silent_upstream_times_out() {
    let (url, accept) = fake_gemini().await;
    let connector = GeminiLiveConnector::new("test-key")
        .with_endpoint(url)
        .with_setup_timeout(Duration::from_millis(200));

    let server = tokio::spawn(async move {
        let mut socket = accept.await.unwrap();
        let _setup = next_json(&mut socket).await;
        // Never acknowledge.
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let result = timeout(TIMEOUT, connector.connect(&setup())).await.unwrap();
    assert!(result.is_err());
    server.abort();
}

#[tokio::test]
async fn abnormal_close_after_setup_is_reported_once() {
    let (url, accept) = fake_gemini().await;
    let connector = GeminiLiveConnector::new("test-key").with_endpoint(url);

    tokio::spawn(async move {
        let mut socket = accept.await.unwrap();
        let _setup = next_json(&mut socket).await;
        socket
            .send(Message::Text(r#"{"setupComplete":{}}"#.into()))
            .await
            .unwrap();
        let _ = socket
            .close(Some(CloseFrame {
                code: CloseCode::Error,
                reason: "Internal error".into(),
            }))
            .await;
    });

    let mut connection = timeout(TIMEOUT, connector.connect(&setup()))
        .await
        .unwrap()
        .unwrap();

    let event = timeout(TIMEOUT, connection.events.recv()).await.unwrap();
    assert_eq!(event, Some(LiveEvent::Error(Some("Internal error".to_string()))));
    let end = timeout(TIMEOUT, connection.events.recv()).await.unwrap();
    assert_eq!(end, None);
}
