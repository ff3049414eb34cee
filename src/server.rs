//! Local control server.
//!
//! This module provides an HTTP server that:
//! - Accepts inbound control messages via `POST /control/{topic}` and drops
//!   them into the pipeline's mailbox
//! - Exposes pipeline telemetry via `GET /stats`
//!
//! # Architecture
//!
//! ```text
//! operator ──→ POST /control/feedback_in ──→ ControlMailbox ──→ pipeline (next cycle)
//!                                                                   │
//! operator ←── GET /stats ←──────────────── TelemetryLog ←──────────┘
//! ```

use crate::control::{ControlMessage, ControlSender};
use crate::telemetry::{SharedTelemetryLog, TelemetryStats};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// The only topic accepted for control messages
    pub control_topic: String,
}

impl ServerConfig {
    pub fn new(port: u16, control_topic: impl Into<String>) -> Self {
        Self {
            port,
            control_topic: control_topic.into(),
        }
    }
}

/// Shared server state
pub struct ServerState {
    sender: ControlSender,
    control_topic: String,
    telemetry: SharedTelemetryLog,
}

/// Response to an accepted control message
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: String,
    pub topic: String,
    pub bytes: usize,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /control/{topic}
///
/// The body is delivered verbatim; its content is never interpreted.
async fn control(
    State(state): State<Arc<ServerState>>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ControlResponse>), (StatusCode, Json<ErrorResponse>)> {
    if topic != state.control_topic {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Not subscribed to topic '{topic}'"),
                code: "UNKNOWN_TOPIC".to_string(),
            }),
        ));
    }

    let bytes = body.len();
    state
        .sender
        .deliver(ControlMessage::new(topic.clone(), body.to_vec()));

    Ok((
        StatusCode::ACCEPTED,
        Json(ControlResponse {
            status: "accepted".to_string(),
            topic,
            bytes,
        }),
    ))
}

/// GET /stats
async fn stats(State(state): State<Arc<ServerState>>) -> Json<TelemetryStats> {
    Json(state.telemetry.stats())
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    sender: ControlSender,
    telemetry: SharedTelemetryLog,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState {
        sender,
        control_topic: config.control_topic.clone(),
        telemetry,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/control/:topic", post(control))
        .route("/stats", get(stats))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!(
        control_topic = %config.control_topic,
        "control server listening on http://{}",
        actual_addr
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
