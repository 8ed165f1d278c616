//! VisionTalk Relay Library Crate
//!
//! This library contains the core logic for the relay service: configuration,
//! shared state, HTTP handlers, WebSocket relay logic, routing, and the
//! serve loop. The `relay` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;
