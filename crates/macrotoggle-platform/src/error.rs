//! Common error types for macrotoggle-platform.

use thiserror::Error;

/// Platform-level errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("input backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

impl From<PlatformError> for macrotoggle_core::BackendError {
    fn from(e: PlatformError) -> Self {
        macrotoggle_core::BackendError::Failed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrotoggle_core::BackendError;

    #[test]
    fn test_platform_error_into_backend_error() {
        let err: BackendError = PlatformError::BackendUnavailable("no display".into()).into();
        assert!(matches!(err, BackendError::Failed(msg) if msg.contains("no display")));
    }
}
