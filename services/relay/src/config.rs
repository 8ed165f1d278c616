use gemini_realtime::GEMINI_LIVE_URL;
use std::net::{Ipv4Addr, SocketAddr};

/// The instruction every upstream session is opened with.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a real-time tutor.\n\
Stop speaking if interrupted.\n\
Explain clearly using the visible image.";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-live-001";
pub const DEFAULT_PORT: u16 = 8080;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub gemini_api_key: String,
    pub model: String,
    pub system_instruction: String,
    pub gemini_live_url: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), e.to_string()))?,
            Err(_) => DEFAULT_PORT,
        };
        let bind_address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let gemini_api_key = non_empty_var("GEMINI_API_KEY")
            .or_else(|| non_empty_var("GOOGLE_API_KEY"))
            .ok_or_else(|| {
                ConfigError::MissingVar("GEMINI_API_KEY is required to start the relay".to_string())
            })?;

        let model = non_empty_var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let system_instruction = non_empty_var("SYSTEM_INSTRUCTION")
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string());
        let gemini_live_url =
            non_empty_var("GEMINI_LIVE_URL").unwrap_or_else(|| GEMINI_LIVE_URL.to_string());

        Ok(Self {
            bind_address,
            gemini_api_key,
            model,
            system_instruction,
            gemini_live_url,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
