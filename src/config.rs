//! Configuration for the motion sensor agent.
//!
//! Loaded from a JSON file in the platform config directory, then overridden
//! by `MOTION_*` environment variables. Every value is fixed for the lifetime
//! of a run.

use crate::core::event::PayloadBudget;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Payload budget of the legacy low-memory build.
pub const LEGACY_PAYLOAD_BYTES: usize = 180;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub detection: DetectionConfig,
    pub payload: PayloadConfig,
    pub transport: TransportConfig,
    pub feedback: FeedbackConfig,

    /// Path for telemetry persistence
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-sensor-agent");

        Self {
            sampling: SamplingConfig::default(),
            detection: DetectionConfig::default(),
            payload: PayloadConfig::default(),
            transport: TransportConfig::default(),
            feedback: FeedbackConfig::default(),
            data_path: data_dir,
        }
    }
}

/// Sampling cadence and analysis window geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub sample_rate_hz: f64,
    /// Low-pass corner frequency
    pub corner_frequency_hz: f64,
    /// Samples per analysis window (power of two)
    pub window_len: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 64.0,
            corner_frequency_hz: 10.0,
            window_len: 32,
        }
    }
}

impl SamplingConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.sample_rate_hz)
    }

    /// Width of one spectrum bin in Hz.
    pub fn bin_width_hz(&self) -> f64 {
        self.sample_rate_hz / self.window_len as f64
    }
}

/// Event decision parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub energy_threshold: f64,
    /// Band extent: even bins `2..2 * low_band_bins` are integrated
    pub low_band_bins: usize,
    /// Initial state of realtime reporting
    pub realtime_on_start: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 15.0,
            low_band_bins: 10,
            realtime_on_start: false,
        }
    }
}

/// Payload layout profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadProfile {
    /// Full record including spectrum bins
    Canonical,
    /// Degraded 180-byte layout without spectrum
    Legacy,
}

/// Outbound payload limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadConfig {
    pub profile: PayloadProfile,
    pub max_bytes: usize,
    pub include_spectrum: bool,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            profile: PayloadProfile::Canonical,
            max_bytes: 1024,
            include_spectrum: true,
        }
    }
}

impl PayloadConfig {
    /// Effective budget after applying the profile.
    pub fn budget(&self) -> PayloadBudget {
        match self.profile {
            PayloadProfile::Canonical => PayloadBudget {
                max_bytes: self.max_bytes,
                include_spectrum: self.include_spectrum,
            },
            PayloadProfile::Legacy => PayloadBudget {
                max_bytes: self.max_bytes.min(LEGACY_PAYLOAD_BYTES),
                include_spectrum: false,
            },
        }
    }
}

/// Message transport endpoint and topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    /// Bearer credential for the gateway
    pub token: String,
    /// Identity presented to the broker; derived from the hostname when empty
    pub client_id: String,
    pub publish_topic: String,
    pub control_topic: String,
    /// Fixed wait between reconnect attempts
    #[serde(with = "duration_serde")]
    pub reconnect_backoff: Duration,
    /// Upper bound on one connect or publish request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Local port for inbound control messages (0 picks a free port)
    pub control_port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8883,
            token: String::new(),
            client_id: String::new(),
            publish_topic: "accelerometer_out".to_string(),
            control_topic: "feedback_in".to_string(),
            reconnect_backoff: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            control_port: 7878,
        }
    }
}

impl TransportConfig {
    /// Configured client id, or `sensor-<hostname>-<random>` when unset.
    pub fn resolved_client_id(&self) -> String {
        if !self.client_id.is_empty() {
            return self.client_id.clone();
        }
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        format!(
            "sensor-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().to_string()[..8]
        )
    }
}

/// Threshold-crossing tone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub enabled: bool,
    pub tone_ms: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tone_ms: 200,
        }
    }
}

impl FeedbackConfig {
    pub fn tone(&self) -> Duration {
        Duration::from_millis(self.tone_ms)
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults when it is missing.
    pub fn load_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-sensor-agent")
            .join("config.json")
    }

    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Apply `MOTION_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::ParseError(format!("{key}: invalid value '{value}'")))
        }

        if let Some(v) = lookup("MOTION_SAMPLE_RATE_HZ") {
            self.sampling.sample_rate_hz = parse("MOTION_SAMPLE_RATE_HZ", v)?;
        }
        if let Some(v) = lookup("MOTION_CORNER_HZ") {
            self.sampling.corner_frequency_hz = parse("MOTION_CORNER_HZ", v)?;
        }
        if let Some(v) = lookup("MOTION_WINDOW_LEN") {
            self.sampling.window_len = parse("MOTION_WINDOW_LEN", v)?;
        }
        if let Some(v) = lookup("MOTION_ENERGY_THRESHOLD") {
            self.detection.energy_threshold = parse("MOTION_ENERGY_THRESHOLD", v)?;
        }
        if let Some(v) = lookup("MOTION_LOW_BAND_BINS") {
            self.detection.low_band_bins = parse("MOTION_LOW_BAND_BINS", v)?;
        }
        if let Some(v) = lookup("MOTION_GATEWAY_HOST") {
            self.transport.host = v;
        }
        if let Some(v) = lookup("MOTION_GATEWAY_PORT") {
            self.transport.port = parse("MOTION_GATEWAY_PORT", v)?;
        }
        if let Some(v) = lookup("MOTION_GATEWAY_TOKEN") {
            self.transport.token = v;
        }
        if let Some(v) = lookup("MOTION_PUBLISH_TOPIC") {
            self.transport.publish_topic = v;
        }
        if let Some(v) = lookup("MOTION_CONTROL_TOPIC") {
            self.transport.control_topic = v;
        }
        if let Some(v) = lookup("MOTION_PAYLOAD_MAX_BYTES") {
            self.payload.max_bytes = parse("MOTION_PAYLOAD_MAX_BYTES", v)?;
        }
        Ok(())
    }

    /// Check the constraints the pipeline depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sampling;
        let d = &self.detection;

        if !(s.sample_rate_hz.is_finite() && s.sample_rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sample rate must be positive, got {}",
                s.sample_rate_hz
            )));
        }
        if !(s.corner_frequency_hz.is_finite() && s.corner_frequency_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "corner frequency must be positive, got {}",
                s.corner_frequency_hz
            )));
        }
        if s.sample_rate_hz < 2.0 * s.corner_frequency_hz {
            return Err(ConfigError::Invalid(format!(
                "sample rate {} Hz must be at least twice the corner frequency {} Hz",
                s.sample_rate_hz, s.corner_frequency_hz
            )));
        }
        if s.window_len < 2 || !s.window_len.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "window length {} must be a power of two >= 2",
                s.window_len
            )));
        }
        if d.low_band_bins < 2 || s.window_len < 2 * d.low_band_bins {
            return Err(ConfigError::Invalid(format!(
                "window length {} must be at least twice the low band extent {}",
                s.window_len, d.low_band_bins
            )));
        }
        if !(d.energy_threshold.is_finite() && d.energy_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "energy threshold must be positive, got {}",
                d.energy_threshold
            )));
        }
        if self.payload.max_bytes == 0 {
            return Err(ConfigError::Invalid("payload budget must be non-zero".to_string()));
        }
        if self.transport.publish_topic.is_empty() || self.transport.control_topic.is_empty() {
            return Err(ConfigError::Invalid("topics must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, in whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sampling.sample_rate_hz, 64.0);
        assert_eq!(config.sampling.window_len, 32);
        assert_eq!(config.detection.energy_threshold, 15.0);
        assert_eq!(config.transport.publish_topic, "accelerometer_out");
        assert_eq!(config.transport.control_topic, "feedback_in");
        assert_eq!(config.transport.reconnect_backoff, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bin_width() {
        let config = Config::default();
        assert_eq!(config.sampling.bin_width_hz(), 2.0);
    }

    #[test]
    fn test_rejects_non_power_of_two_window() {
        let mut config = Config::default();
        config.sampling.window_len = 48;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_band_wider_than_window() {
        let mut config = Config::default();
        config.detection.low_band_bins = 17;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_aliasing_corner() {
        let mut config = Config::default();
        config.sampling.corner_frequency_hz = 40.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MOTION_SAMPLE_RATE_HZ", "128"),
            ("MOTION_WINDOW_LEN", "64"),
            ("MOTION_PUBLISH_TOPIC", "vibration/out"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.sampling.sample_rate_hz, 128.0);
        assert_eq!(config.sampling.window_len, 64);
        assert_eq!(config.transport.publish_topic, "vibration/out");
        assert_eq!(config.transport.control_topic, "feedback_in");
    }

    #[test]
    fn test_env_parse_error() {
        let mut config = Config::default();
        let result = config.apply_env(|key| {
            (key == "MOTION_WINDOW_LEN").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_legacy_profile_budget() {
        let payload = PayloadConfig {
            profile: PayloadProfile::Legacy,
            ..PayloadConfig::default()
        };
        let budget = payload.budget();
        assert_eq!(budget.max_bytes, LEGACY_PAYLOAD_BYTES);
        assert!(!budget.include_spectrum);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"detection": {"energy_threshold": 20.0}}"#).unwrap();
        assert_eq!(config.detection.energy_threshold, 20.0);
        assert_eq!(config.detection.low_band_bins, 10);
        assert_eq!(config.sampling.window_len, 32);
    }

    #[test]
    fn test_explicit_client_id_kept() {
        let transport = TransportConfig {
            client_id: "esp-device-01".to_string(),
            ..TransportConfig::default()
        };
        assert_eq!(transport.resolved_client_id(), "esp-device-01");
        assert!(TransportConfig::default()
            .resolved_client_id()
            .starts_with("sensor-"));
    }
}
