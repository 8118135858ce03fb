//! Error types for macrotoggle-core.

use crate::{Key, ValidationError};
use std::path::PathBuf;
use thiserror::Error;

/// Loading or validating a macro configuration failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration:\n{}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

impl ConfigError {
    /// Validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            ConfigError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single input operation was rejected by the backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("input injection failed: {0}")]
    Failed(String),
    #[error("key {0} is not supported by this backend")]
    UnsupportedKey(Key),
}

/// Fatal error of a single macro run.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A control operation was called in a state where it has no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("invalid control state: no trigger listener attached")]
    NoListener,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("key hook disconnected")]
    HookDisconnected,
}
