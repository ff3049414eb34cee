//! HTTP transport to a message gateway.
//!
//! Events are posted to `POST {base}/v1/topics/{topic}`. The session is
//! modelled by a health probe: the transport starts disconnected, probes the
//! gateway from its service step no more often than the reconnect backoff,
//! and drops back to disconnected whenever a publish fails at the network
//! level.

use crate::config::TransportConfig;
use crate::publisher::Transport;
use std::time::{Duration, Instant};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway host (default: 127.0.0.1)
    pub host: String,
    /// Gateway port
    pub port: u16,
    /// Bearer authentication token, omitted when empty
    pub token: String,
    /// Identity sent with every request
    pub client_id: String,
    /// Minimum time between connection probes
    pub reconnect_backoff: Duration,
    /// Upper bound on any single request
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// Create a new gateway configuration with default timings.
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>) -> Self {
        let defaults = TransportConfig::default();
        Self {
            host: host.into(),
            port,
            token: token.into(),
            client_id: defaults.resolved_client_id(),
            reconnect_backoff: defaults.reconnect_backoff,
            request_timeout: defaults.request_timeout,
        }
    }

    pub fn from_transport(transport: &TransportConfig) -> Self {
        Self {
            host: transport.host.clone(),
            port: transport.port,
            token: transport.token.clone(),
            client_id: transport.resolved_client_id(),
            reconnect_backoff: transport.reconnect_backoff,
            request_timeout: transport.request_timeout,
        }
    }

    /// Get the full gateway URL.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get the publish endpoint for `topic`.
    pub fn publish_url(&self, topic: &str) -> String {
        format!("{}/v1/topics/{}", self.url(), topic)
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.url())
    }
}

/// Gateway client error types.
#[derive(Debug)]
pub enum GatewayError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Config(msg) => write!(f, "Gateway config error: {msg}"),
            GatewayError::Network(msg) => write!(f, "Gateway network error: {msg}"),
            GatewayError::Server { status, message } => {
                write!(f, "Gateway server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for GatewayError {}

/// Async gateway client.
pub struct GatewayClient {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl GatewayClient {
    /// Create a new gateway client.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Test connection to the gateway.
    pub async fn test_connection(&self) -> Result<bool, GatewayError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Post one payload to `topic`.
    pub async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), GatewayError> {
        let mut request = self
            .client
            .post(self.config.publish_url(topic))
            .header("Content-Type", "application/json")
            .header("X-Client-Id", &self.config.client_id)
            .body(payload.to_vec());
        if !self.config.token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.config.token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Blocking [`Transport`] over [`GatewayClient`] for the sampling thread.
pub struct GatewayTransport {
    inner: GatewayClient,
    runtime: tokio::runtime::Runtime,
    connected: bool,
    last_attempt: Option<Instant>,
}

impl GatewayTransport {
    /// Build the transport and make the first connection attempt.
    ///
    /// An unreachable gateway is not an error; the service step keeps probing.
    pub fn connect(config: GatewayConfig) -> Result<Self, GatewayError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create runtime: {e}")))?;

        let mut transport = Self {
            inner: GatewayClient::new(config)?,
            runtime,
            connected: false,
            last_attempt: None,
        };
        transport.probe();
        Ok(transport)
    }

    fn probe(&mut self) {
        self.last_attempt = Some(Instant::now());
        let config = self.inner.config();
        match self.runtime.block_on(self.inner.test_connection()) {
            Ok(true) => {
                self.connected = true;
                tracing::info!(
                    gateway = %config.url(),
                    client_id = %config.client_id,
                    "connected to gateway"
                );
            }
            Ok(false) => {
                tracing::warn!(
                    gateway = %config.url(),
                    retry_in_secs = config.reconnect_backoff.as_secs_f64(),
                    "gateway unhealthy"
                );
            }
            Err(e) => {
                tracing::warn!(
                    retry_in_secs = config.reconnect_backoff.as_secs_f64(),
                    "gateway connection failed: {e}"
                );
            }
        }
    }

    fn reconnect_due(&self) -> bool {
        match self.last_attempt {
            Some(at) => at.elapsed() >= self.inner.config().reconnect_backoff,
            None => true,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        self.inner.config()
    }
}

impl Transport for GatewayTransport {
    fn connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        match self.runtime.block_on(self.inner.publish(topic, payload)) {
            Ok(()) => true,
            Err(GatewayError::Network(e)) => {
                tracing::warn!("gateway connection lost: {e}");
                self.connected = false;
                self.last_attempt = Some(Instant::now());
                false
            }
            Err(e) => {
                tracing::warn!("{e}");
                false
            }
        }
    }

    fn service(&mut self) {
        if !self.connected && self.reconnect_due() {
            self.probe();
        }
    }
}
