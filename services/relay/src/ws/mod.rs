//! WebSocket Relay
//!
//! This module contains the core logic for relaying a browser client to a live
//! AI session over WebSockets:
//!
//! - `protocol`: Defines the JSON message format for client-relay communication.
//! - `session`: Manages one connection's lifecycle, from upstream setup to close.
//! - `registry`: Tracks active connections so shutdown can close them.

pub mod protocol;
pub mod registry;
pub mod session;

pub use session::ws_handler;
