//! Runtime configuration for casdb.
//!
//! Configuration is read from TOML. Every section and field is optional; a
//! missing value falls back to the defaults below, and unknown keys are
//! rejected so typos surface at startup instead of being silently ignored.

use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error as ThisError;

///
/// CONSTANTS
///

/// Upper bound on the encoded size of one conditional predicate.
pub const DEFAULT_MAX_PREDICATE_BYTES: usize = 64 * 1024;

/// Upper bound on predicate tree nesting accepted by the decoder.
pub const DEFAULT_MAX_PREDICATE_DEPTH: usize = 128;

/// How long an apply step waits for a contended row lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

///
/// CasdbConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CasdbConfig {
    pub codec: CodecConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
}

impl CasdbConfig {
    /// Parse and validate a configuration document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse, and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    /// Reject values that would make the runtime unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.codec.max_predicate_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "codec.max_predicate_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.codec.max_predicate_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "codec.max_predicate_depth",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.store.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "store.lock_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

///
/// CodecConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    pub max_predicate_bytes: usize,
    pub max_predicate_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_predicate_bytes: DEFAULT_MAX_PREDICATE_BYTES,
            max_predicate_depth: DEFAULT_MAX_PREDICATE_DEPTH,
        }
    }
}

///
/// StoreConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

///
/// SessionConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub debug: bool,
}

///
/// TESTS
///
