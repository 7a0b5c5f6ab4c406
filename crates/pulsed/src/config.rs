//! Daemon configuration.
//!
//! Loaded from a TOML file with environment overrides:
//! - `PULSE_CONFIG` - path to the config file
//! - `PULSE_ADDR` - listen address, overrides the file
//!
//! Everything has a default, so a bare `pulsed start` works with no
//! config file at all (anonymous ingestion only, loopback listener).

use std::collections::HashMap;
use std::path::Path;

use pulse_core::{DomainError, DomainResult, TelemetryConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_LISTEN: &str = "127.0.0.1:7171";

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Socket address the HTTP server binds.
    pub listen: String,

    /// Bearer token to user id map. Tokens not present here resolve to
    /// an anonymous caller; ingestion still accepts their samples.
    pub tokens: HashMap<String, String>,

    /// Timing knobs shared with the client side.
    pub telemetry: TelemetryConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            tokens: HashMap::new(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Loads configuration: file (if any), then environment overrides.
    ///
    /// `PULSE_CONFIG` names an explicit file (missing is an error);
    /// otherwise `pulse/pulsed.toml` under the user config dir is used
    /// when present, falling back to compiled-in defaults.
    pub fn load() -> DomainResult<Self> {
        let mut config = match std::env::var("PULSE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        if let Ok(addr) = std::env::var("PULSE_ADDR") {
            config.listen = addr;
        }

        config.validate()?;
        Ok(config)
    }

    /// Default config file location under the user config dir.
    fn default_config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pulse").join("pulsed.toml"))
    }

    /// Parses a TOML config file.
    pub fn from_file(path: &Path) -> DomainResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| DomainError::InvalidConfig {
            field: "config file".to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| DomainError::InvalidConfig {
            field: "config file".to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), tokens = config.tokens.len(), "Loaded config file");
        Ok(config)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.listen.is_empty() {
            return Err(DomainError::InvalidConfig {
                field: "listen".to_string(),
                reason: "listen address must not be empty".to_string(),
            });
        }
        self.telemetry.validate()
    }
}
