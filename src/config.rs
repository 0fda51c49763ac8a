use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::lint::Severity;
use crate::models::normalize_name;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "pin-raider.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Lint settings, read from `pin-raider.toml` and overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintConfig {
    /// Do not report requirements without an exact `==` pin.
    pub allow_unpinned: bool,
    /// Report identical duplicate pins as errors instead of warnings.
    pub deny_duplicates: bool,
    /// Lowest severity that makes `check` fail.
    pub fail_on: Severity,
    /// Package names excluded from every check.
    pub ignore: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            allow_unpinned: false,
            deny_duplicates: false,
            fail_on: Severity::Error,
            ignore: vec![],
        }
    }
}

impl LintConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads `explicit` if given, else `pin-raider.toml` from the working
    /// directory if present, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    debug!("No {} found, using default lint config", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config =
            Self::from_toml_str(&text).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;

        info!("Loaded lint config from {}", path.display());
        Ok(config)
    }

    pub fn is_ignored(&self, normalized: &str) -> bool {
        self.ignore.iter().any(|name| normalize_name(name) == normalized)
    }
}
