//! Gemini Live Client Crate
//!
//! A small client for the Gemini Live `BidiGenerateContent` WebSocket API.
//! Callers depend on the [`LiveConnector`] and [`LiveSession`] traits and
//! consume upstream callbacks as [`LiveEvent`]s from a channel, so the
//! transport can be swapped for a fake in tests.
//!
//! - `types`: wire format of the Live protocol.
//! - `session`: the capability traits and event types.
//! - `client`: the tokio-tungstenite implementation.

pub mod client;
pub mod session;
pub mod types;

pub use client::{GEMINI_LIVE_URL, GeminiLiveConnector, GeminiLiveSession};
pub use session::{LiveConnection, LiveConnector, LiveEvent, LiveMessage, LiveSession, SessionSetup};
pub use types::{Blob, ClientContent, Content, Part, RealtimeInput, ResponseModality};
