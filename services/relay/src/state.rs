//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared,
//! clonable resources every connection needs.

use crate::{config::Config, ws::registry::ConnectionRegistry};
use gemini_realtime::{LiveConnector, ResponseModality, SessionSetup};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn LiveConnector>,
    pub registry: Arc<ConnectionRegistry>,
    /// The fixed configuration every upstream session is opened with.
    pub session_setup: Arc<SessionSetup>,
}

impl AppState {
    pub fn new(config: &Config, connector: Arc<dyn LiveConnector>) -> Self {
        let session_setup = SessionSetup {
            model: config.model.clone(),
            system_instruction: config.system_instruction.clone(),
            response_modality: ResponseModality::Audio,
        };
        Self {
            connector,
            registry: Arc::new(ConnectionRegistry::new()),
            session_setup: Arc::new(session_setup),
        }
    }
}
