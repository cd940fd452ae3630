//! Runtime Configuration
//!
//! Limits that keep a misbehaving graph from looping forever. Every field has
//! a default, so an empty JSON object is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of flush rounds before cascading writes are rejected.
pub const DEFAULT_MAX_FLUSH_ROUNDS: usize = 100;

/// Default maximum nesting of computed/effect evaluations.
pub const DEFAULT_MAX_EVALUATION_DEPTH: usize = 256;

/// Errors raised while loading a [`RuntimeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// How many rounds of queued effects a single flush may drain.
    ///
    /// Each round runs every effect queued by the previous one. An effect
    /// that keeps writing a signal it depends on never empties the queue;
    /// this bound turns that into a `PropagationOverflow` error.
    pub max_flush_rounds: usize,

    /// How deeply computed values and effects may nest their evaluations.
    pub max_evaluation_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_rounds: DEFAULT_MAX_FLUSH_ROUNDS,
            max_evaluation_depth: DEFAULT_MAX_EVALUATION_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        tracing::debug!(path = %path.display(), ?config, "loaded runtime config");
        Ok(config)
    }

    /// Check that every limit is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_flush_rounds == 0 {
            return Err(ConfigError::Invalid(
                "max_flush_rounds must be at least 1".to_string(),
            ));
        }
        if self.max_evaluation_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_evaluation_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = RuntimeConfig::from_json(r#"{"max_flush_rounds": 4}"#).unwrap();
        assert_eq!(config.max_flush_rounds, 4);
        assert_eq!(config.max_evaluation_depth, DEFAULT_MAX_EVALUATION_DEPTH);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = RuntimeConfig::from_json(r#"{"max_rounds": 4}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_limits_are_invalid() {
        let err = RuntimeConfig::from_json(r#"{"max_flush_rounds": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RuntimeConfig::from_json(r#"{"max_evaluation_depth": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!(
            "ripple-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"max_evaluation_depth": 32}"#).unwrap();

        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(config.max_evaluation_depth, 32);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RuntimeConfig::load("/nonexistent/ripple.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
