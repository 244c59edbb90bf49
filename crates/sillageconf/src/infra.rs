//! Infrastructure configuration - fixed for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Network bind address for the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Interface to listen on.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// HTTP port for the API, uploads and health endpoints.
    /// Default: 8000
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_http_port() -> u16 {
        8000
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Filesystem paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding uploaded media, served under `/uploads/`.
    /// Relative paths resolve against the working directory.
    /// Default: uploads
    #[serde(default = "PathsConfig::default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl PathsConfig {
    fn default_upload_dir() -> PathBuf {
        PathBuf::from("uploads")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: Self::default_upload_dir(),
        }
    }
}

/// Store and request size limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of positions kept across all tracks.
    /// Default: 2000
    #[serde(default = "LimitsConfig::default_max_positions")]
    pub max_positions: usize,

    /// Maximum request body size for media uploads, in bytes.
    /// Default: 100 MiB
    #[serde(default = "LimitsConfig::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl LimitsConfig {
    fn default_max_positions() -> usize {
        2000
    }

    fn default_max_upload_bytes() -> usize {
        100 * 1024 * 1024
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_positions: Self::default_max_positions(),
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry. Empty disables export.
    /// Default: "" (console only)
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Log level or filter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Whether traces and logs should be exported over OTLP.
    pub fn otlp_enabled(&self) -> bool {
        !self.otlp_endpoint.trim().is_empty()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}

/// Infrastructure configuration - cannot change at runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfraConfig {
    /// Network bind address.
    #[serde(default)]
    pub bind: BindConfig,

    /// Filesystem paths.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Store and body limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
