//! Configuration loading for the sillage tracking server.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/sillage/config.toml` (system)
//! 2. `~/.config/sillage/config.toml` (user)
//! 3. `./sillage.toml` (local override, replaced by `--config`)
//! 4. Environment variables (`GPS_TOKEN`, `SILLAGE_*`)
//!
//! # Example Config
//!
//! ```toml
//! [bind]
//! host = "0.0.0.0"
//! http_port = 8000
//!
//! [paths]
//! upload_dir = "/var/lib/sillage/uploads"
//!
//! [auth]
//! token = "change-me"
//!
//! [limits]
//! max_positions = 2000
//! max_upload_bytes = 104857600
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = "127.0.0.1:4317"
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use sillageconf::SillageConfig;
//!
//! let config = SillageConfig::load().expect("Failed to load config");
//! println!("listening on {}", config.infra.bind.addr());
//! println!("uploads in {}", config.infra.paths.upload_dir.display());
//! ```

pub mod auth;
pub mod infra;
pub mod loader;

pub use auth::AuthConfig;
pub use infra::{BindConfig, InfraConfig, LimitsConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete sillage configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SillageConfig {
    /// Infrastructure - cannot change at runtime.
    #[serde(flatten)]
    pub infra: InfraConfig,

    /// Shared secret for write endpoints.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl SillageConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./sillage.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = SillageConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML. The shared secret is never written out.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# sillage configuration\n\n");

        output.push_str("[bind]\n");
        output.push_str(&format!("host = \"{}\"\n", self.infra.bind.host));
        output.push_str(&format!("http_port = {}\n", self.infra.bind.http_port));

        output.push_str("\n[paths]\n");
        output.push_str(&format!(
            "upload_dir = \"{}\"\n",
            self.infra.paths.upload_dir.display()
        ));

        output.push_str("\n[auth]\n");
        if self.auth.is_enabled() {
            output.push_str("# token is set (redacted)\n");
        } else {
            output.push_str("# no token: write endpoints are open\n");
        }

        output.push_str("\n[limits]\n");
        output.push_str(&format!(
            "max_positions = {}\n",
            self.infra.limits.max_positions
        ));
        output.push_str(&format!(
            "max_upload_bytes = {}\n",
            self.infra.limits.max_upload_bytes
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.infra.telemetry.log_level
        ));
        output.push_str(&format!(
            "otlp_endpoint = \"{}\"\n",
            self.infra.telemetry.otlp_endpoint
        ));

        output
    }
}
