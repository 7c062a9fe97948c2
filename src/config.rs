//! Configuration management for the NeuroGuard service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configuration file location
pub const CONFIG_PATH_ENV: &str = "NEUROGUARD_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Mail transport used by the alert dispatcher
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Transactional email HTTP API (Resend-compatible)
    #[default]
    Resend,
    /// Log the message instead of sending it - local development only
    Log,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub inference: InferenceConfig,
    pub alert: AlertConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Directory holding index.html and results.html
    pub static_dir: PathBuf,
    /// Maximum accepted request body for uploads
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Pre-trained artifact locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// ONNX classifier
    pub classifier_path: PathBuf,
    /// JSON scaler artifact
    pub scaler_path: PathBuf,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            classifier_path: PathBuf::from("models/seizure_model.onnx"),
            scaler_path: PathBuf::from("models/scaler.json"),
            onnx_threads: 1,
        }
    }
}

/// Inference request shaping
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Columns echoed back to the caller, in response order
    pub display_columns: Vec<String>,
    /// Class-1 probability at or above which a row is positive, used when the
    /// classifier exposes no label output
    pub probability_threshold: f64,
    /// Label value the classifier uses for "seizure"
    pub positive_label: i64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            display_columns: default_display_columns(),
            probability_threshold: 0.5,
            positive_label: 1,
        }
    }
}

pub fn default_display_columns() -> Vec<String> {
    ["heart_rate", "temperature", "spo2", "vibration_intensity"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Emergency alert delivery
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub transport: TransportKind,
    /// Email API endpoint
    pub api_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Verified sender address
    pub sender: String,
    /// Upper bound on a single send, in milliseconds
    pub timeout_ms: u64,
    /// Name used when the request carries no user
    pub default_user: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Resend,
            api_url: "https://api.resend.com/emails".to_string(),
            api_key_env: "RESEND_API_KEY".to_string(),
            sender: "onboarding@resend.dev".to_string(),
            timeout_ms: 10_000,
            default_user: "Unknown User".to_string(),
        }
    }
}

/// Periodic metrics reporting
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between summaries in the log, 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 300,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file (or `NEUROGUARD_CONFIG`)
    /// layered with `NEUROGUARD__*` environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path. A missing file is not an
    /// error: every section has defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("NEUROGUARD")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("inference.display_columns")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.inference.display_columns.is_empty() {
            anyhow::bail!("inference.display_columns must name at least one column");
        }
        if !(0.0..=1.0).contains(&self.inference.probability_threshold) {
            anyhow::bail!(
                "inference.probability_threshold must be within [0, 1], got {}",
                self.inference.probability_threshold
            );
        }
        if self.artifacts.onnx_threads == 0 {
            anyhow::bail!("artifacts.onnx_threads must be at least 1");
        }
        Ok(())
    }
}
