//! Axum Handlers for the HTTP surface.

use axum::response::Json;
use serde::Serialize;

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Liveness probe. Always succeeds, independent of any connection state.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_is_always_ok() {
        let Json(body) = health().await;
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"ok":true}"#);
    }
}
