// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_STALL_PASSES, DEFAULT_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for the host driver that polls the scheduler.
///
/// Every field is optional in the file; missing fields take the built-in
/// defaults, so an empty document is a valid config.
///
/// # Fields
/// * `tick_interval_ms` - Delay between two `tick_all` passes
/// * `stall_passes` - Consecutive passes without progress before giving up (0 = never)
/// * `max_passes` - Hard bound on the number of passes (optional)
/// * `log_active_changes` - Log the active node ids whenever they change
///
/// # Example
/// ```yaml
/// tick_interval_ms: 100
/// stall_passes: 50
/// max_passes: 10000
/// log_active_changes: true
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    pub tick_interval_ms: u64,
    pub stall_passes: u32,
    pub max_passes: Option<u64>,
    pub log_active_changes: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            stall_passes: DEFAULT_STALL_PASSES,
            max_passes: None,
            log_active_changes: true,
        }
    }
}

impl DriverConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Check the values a parser cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: format!("must be at most {}", MAX_TICK_INTERVAL_MS),
            });
        }
        if self.max_passes == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_passes",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}

/// Config file syntax, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Parse a config document without touching the filesystem.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<DriverConfig, ConfigError> {
    // serde_yaml reads an empty document as null, not as an empty map.
    if content.trim().is_empty() {
        return Ok(DriverConfig::default());
    }
    let cfg = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    Ok(cfg)
}

/// Load a config from a YAML or TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DriverConfig, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, format)
}

/// Load a config file and reject values the driver cannot run with
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<DriverConfig, ConfigError> {
    let cfg = load_config(path)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_basic_yaml_config() {
        let yaml = r#"
tick_interval_ms: 25
stall_passes: 40
max_passes: 1000
log_active_changes: false
"#;

        let cfg = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.tick_interval(), Duration::from_millis(25));
        assert_eq!(cfg.stall_passes, 40);
        assert_eq!(cfg.max_passes, Some(1000));
        assert!(!cfg.log_active_changes);
    }

    #[test]
    fn parse_partial_toml_config_uses_defaults() {
        let cfg = parse_config("stall_passes = 12\n", ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.stall_passes, 12);
        assert_eq!(cfg.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert_eq!(cfg.max_passes, None);
        assert!(cfg.log_active_changes);
    }

    #[test]
    fn empty_document_is_default_config() {
        assert_eq!(
            parse_config("", ConfigFormat::Yaml).unwrap(),
            DriverConfig::default()
        );
        assert_eq!(
            parse_config("  \n", ConfigFormat::Toml).unwrap(),
            DriverConfig::default()
        );
    }

    #[test]
    fn test_load_and_validate_valid_yaml_file() {
        let file = write_temp(".yaml", "tick_interval_ms: 10\n");
        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.tick_interval_ms, 10);
    }

    #[test]
    fn test_load_and_validate_valid_toml_file() {
        let file = write_temp(".toml", "tick_interval_ms = 10\nmax_passes = 5\n");
        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.max_passes, Some(5));
    }

    #[test]
    fn test_load_and_validate_zero_interval() {
        let file = write_temp(".yml", "tick_interval_ms: 0\n");
        let err = load_and_validate_config(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "tick_interval_ms",
                ..
            }
        ));
        assert!(err.to_string().contains("must be greater than zero"));
    }

    #[test]
    fn test_zero_max_passes_rejected() {
        let cfg = DriverConfig {
            max_passes: Some(0),
            ..DriverConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid {
                field: "max_passes",
                ..
            })
        ));
    }

    #[test]
    fn test_interval_upper_bound() {
        let cfg = DriverConfig {
            tick_interval_ms: MAX_TICK_INTERVAL_MS + 1,
            ..DriverConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".json", "{}");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = parse_config("tick_interval_ms: [not, a, number]", ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = parse_config("tick_interval_ms = \"soon\"", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
