// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating driver configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file extension does not name a supported format
    #[error("unsupported config format for '{}': expected .yaml, .yml or .toml", .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// A field parsed but holds a value the driver cannot use
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
