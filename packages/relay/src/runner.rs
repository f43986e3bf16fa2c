//! Relay server construction and execution.

use std::sync::Arc;

use axum::{Router, http::HeaderValue, routing::get};
use thiserror::Error;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handler::{health_check, websocket_handler};
use crate::signal::shutdown_signal;
use crate::state::AppState;

/// Externally configurable values: bind address, port, and the allowed
/// origin for cross-origin handshakes. Nothing else is configurable.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed to open cross-origin connections. `None` allows any.
    pub allowed_origin: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            allowed_origin: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid allowed origin '{0}'")]
    InvalidOrigin(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the relay router. Public so tests can serve it on an ephemeral
/// port without going through [`run_server`].
pub fn router(state: Arc<AppState>, config: &RelayConfig) -> Result<Router, RelayError> {
    let cors = match &config.allowed_origin {
        Some(origin) => {
            let value = origin
                .parse::<HeaderValue>()
                .map_err(|_| RelayError::InvalidOrigin(origin.clone()))?;
            CorsLayer::new().allow_origin(value)
        }
        None => CorsLayer::new().allow_origin(Any),
    };

    Ok(Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Run the relay server until a shutdown signal arrives.
pub async fn run_server(config: RelayConfig) -> Result<(), RelayError> {
    let state = Arc::new(AppState::new());
    let app = router(state, &config)?;

    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("relay listening on {}", listener.local_addr()?);
    tracing::info!("connect to: ws://{bind_addr}/ws");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("relay shutdown complete");

    Ok(())
}
