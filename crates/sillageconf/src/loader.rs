//! Config file discovery, loading, and environment variable overlay.

use crate::infra::{BindConfig, LimitsConfig, PathsConfig, TelemetryConfig};
use crate::{AuthConfig, ConfigError, InfraConfig, SillageConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/sillage/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("sillage/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("sillage.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<SillageConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from TOML string. Missing keys keep their defaults.
fn parse_toml(contents: &str, path: &Path) -> Result<SillageConfig, ConfigError> {
    let mut config: SillageConfig =
        toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let upload_dir = config.infra.paths.upload_dir.to_string_lossy().into_owned();
    config.infra.paths.upload_dir = expand_path(&upload_dir);
    config.auth = AuthConfig::from_raw(config.auth.token.take());

    Ok(config)
}

/// Take `overlay` unless it still holds the compiled default.
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configs, with `overlay` taking precedence field by field.
pub fn merge_configs(base: SillageConfig, overlay: SillageConfig) -> SillageConfig {
    let bind = BindConfig::default();
    let paths = PathsConfig::default();
    let limits = LimitsConfig::default();
    let telemetry = TelemetryConfig::default();

    SillageConfig {
        infra: InfraConfig {
            bind: BindConfig {
                host: pick(base.infra.bind.host, overlay.infra.bind.host, bind.host),
                http_port: pick(
                    base.infra.bind.http_port,
                    overlay.infra.bind.http_port,
                    bind.http_port,
                ),
            },
            paths: PathsConfig {
                upload_dir: pick(
                    base.infra.paths.upload_dir,
                    overlay.infra.paths.upload_dir,
                    paths.upload_dir,
                ),
            },
            limits: LimitsConfig {
                max_positions: pick(
                    base.infra.limits.max_positions,
                    overlay.infra.limits.max_positions,
                    limits.max_positions,
                ),
                max_upload_bytes: pick(
                    base.infra.limits.max_upload_bytes,
                    overlay.infra.limits.max_upload_bytes,
                    limits.max_upload_bytes,
                ),
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: pick(
                    base.infra.telemetry.otlp_endpoint,
                    overlay.infra.telemetry.otlp_endpoint,
                    telemetry.otlp_endpoint,
                ),
                log_level: pick(
                    base.infra.telemetry.log_level,
                    overlay.infra.telemetry.log_level,
                    telemetry.log_level,
                ),
            },
        },
        auth: AuthConfig {
            token: overlay.auth.token.or(base.auth.token),
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut SillageConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides using `lookup` in place of the process environment.
pub fn apply_overrides_from<F>(config: &mut SillageConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Shared secret. GPS_TOKEN is what deployed trackers already use.
    for key in ["SILLAGE_TOKEN", "GPS_TOKEN"] {
        if let Some(v) = lookup(key) {
            config.auth = AuthConfig::from_raw(Some(v));
            sources.env_overrides.push(key.to_string());
        }
    }

    if let Some(v) = lookup("SILLAGE_HOST") {
        config.infra.bind.host = v;
        sources.env_overrides.push("SILLAGE_HOST".to_string());
    }
    if let Some(v) = lookup("SILLAGE_HTTP_PORT") {
        if let Ok(port) = v.parse() {
            config.infra.bind.http_port = port;
            sources.env_overrides.push("SILLAGE_HTTP_PORT".to_string());
        }
    }
    // PaaS hosts hand out the port this way
    if let Some(v) = lookup("PORT") {
        if let Ok(port) = v.parse() {
            config.infra.bind.http_port = port;
            sources.env_overrides.push("PORT".to_string());
        }
    }

    if let Some(v) = lookup("SILLAGE_UPLOAD_DIR") {
        config.infra.paths.upload_dir = expand_path(&v);
        sources.env_overrides.push("SILLAGE_UPLOAD_DIR".to_string());
    }

    if let Some(v) = lookup("SILLAGE_MAX_POSITIONS") {
        if let Ok(n) = v.parse() {
            config.infra.limits.max_positions = n;
            sources.env_overrides.push("SILLAGE_MAX_POSITIONS".to_string());
        }
    }
    if let Some(v) = lookup("SILLAGE_MAX_UPLOAD_BYTES") {
        if let Ok(n) = v.parse() {
            config.infra.limits.max_upload_bytes = n;
            sources.env_overrides.push("SILLAGE_MAX_UPLOAD_BYTES".to_string());
        }
    }

    if let Some(v) = lookup("SILLAGE_OTLP_ENDPOINT") {
        config.infra.telemetry.otlp_endpoint = v;
        sources.env_overrides.push("SILLAGE_OTLP_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.infra.telemetry.otlp_endpoint = v;
        sources.env_overrides.push("OTEL_EXPORTER_OTLP_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("SILLAGE_LOG_LEVEL") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("SILLAGE_LOG_LEVEL".to_string());
    }
    if let Some(v) = lookup("RUST_LOG") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[paths]
upload_dir = "/srv/media"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.infra.paths.upload_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.infra.bind.http_port, 8000);
        assert_eq!(config.infra.limits.max_positions, 2000);
        assert!(!config.auth.is_enabled());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[bind]
host = "127.0.0.1"
http_port = 9000

[paths]
upload_dir = "/data/uploads"

[auth]
token = "abc"

[limits]
max_positions = 50
max_upload_bytes = 1024

[telemetry]
log_level = "debug"
otlp_endpoint = "collector:4317"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.infra.bind.addr(), "127.0.0.1:9000");
        assert_eq!(config.infra.paths.upload_dir, PathBuf::from("/data/uploads"));
        assert_eq!(config.auth.token.as_deref(), Some("abc"));
        assert_eq!(config.infra.limits.max_positions, 50);
        assert_eq!(config.infra.limits.max_upload_bytes, 1024);
        assert_eq!(config.infra.telemetry.log_level, "debug");
        assert!(config.infra.telemetry.otlp_enabled());
    }

    #[test]
    fn test_parse_empty_token_stays_configured() {
        let toml = "[auth]\ntoken = \"\"\n";
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert!(config.auth.is_enabled());
        assert_eq!(config.auth.token.as_deref(), Some(""));

        let config = parse_toml("[bind]\nhttp_port = 1\n", Path::new("test.toml")).unwrap();
        assert!(!config.auth.is_enabled());
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = parse_toml("[bind\nhttp_port = ", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sillage.toml");
        std::fs::write(&path, "[bind]\nhttp_port = 7000\n").unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.infra.bind.http_port, 7000);

        let missing = load_from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_merge_overlay_wins_over_base() {
        let base = parse_toml(
            "[bind]\nhttp_port = 9000\n[auth]\ntoken = \"base\"\n",
            Path::new("base.toml"),
        )
        .unwrap();
        let overlay = parse_toml(
            "[paths]\nupload_dir = \"/tmp/up\"\n[auth]\ntoken = \"overlay\"\n",
            Path::new("overlay.toml"),
        )
        .unwrap();

        let merged = merge_configs(base, overlay);
        // untouched in overlay, so base survives
        assert_eq!(merged.infra.bind.http_port, 9000);
        assert_eq!(merged.infra.paths.upload_dir, PathBuf::from("/tmp/up"));
        assert_eq!(merged.auth.token.as_deref(), Some("overlay"));
    }

    #[test]
    fn test_merge_keeps_base_token_when_overlay_has_none() {
        let base = parse_toml("[auth]\ntoken = \"keep\"\n", Path::new("a.toml")).unwrap();
        let merged = merge_configs(base, SillageConfig::default());
        assert_eq!(merged.auth.token.as_deref(), Some("keep"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SillageConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(
            &mut config,
            &mut sources,
            lookup_in(&[
                ("GPS_TOKEN", "abc"),
                ("SILLAGE_HTTP_PORT", "8123"),
                ("SILLAGE_UPLOAD_DIR", "/var/uploads"),
                ("SILLAGE_MAX_POSITIONS", "10"),
                ("SILLAGE_LOG_LEVEL", "debug"),
            ]),
        );

        assert_eq!(config.auth.token.as_deref(), Some("abc"));
        assert_eq!(config.infra.bind.http_port, 8123);
        assert_eq!(config.infra.paths.upload_dir, PathBuf::from("/var/uploads"));
        assert_eq!(config.infra.limits.max_positions, 10);
        assert_eq!(config.infra.telemetry.log_level, "debug");
        assert!(sources.env_overrides.contains(&"GPS_TOKEN".to_string()));
        assert_eq!(sources.env_overrides.len(), 5);
    }

    #[test]
    fn test_env_empty_token_keeps_auth_enabled() {
        let mut config = parse_toml("[auth]\ntoken = \"abc\"\n", Path::new("a.toml")).unwrap();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, lookup_in(&[("GPS_TOKEN", "")]));
        assert!(config.auth.is_enabled());
        assert_eq!(config.auth.token.as_deref(), Some(""));
    }

    #[test]
    fn test_env_bad_port_ignored() {
        let mut config = SillageConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(
            &mut config,
            &mut sources,
            lookup_in(&[("SILLAGE_HTTP_PORT", "not-a-port")]),
        );
        assert_eq!(config.infra.bind.http_port, 8000);
        assert!(sources.env_overrides.is_empty());
    }
}
