use thiserror::Error;

/// Result type for stream relay operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or feeding a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Stage execution error
    #[error("Stage execution failed: {0}")]
    StageError(String),

    /// A user-supplied transform returned its own error
    #[error("Transform failed: {0}")]
    Transform(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A one-shot source has already been started
    #[error("Source has already been started")]
    AlreadyStarted,
}

impl PipelineError {
    /// Wrap an arbitrary error raised inside a transform
    pub fn transform<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        PipelineError::Transform(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_wraps_source() {
        let err = PipelineError::transform("parse failure");
        assert_eq!(err.to_string(), "Transform failed: parse failure");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_message() {
        let err = PipelineError::ConfigError("capacity must be non-zero".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: capacity must be non-zero"
        );
    }
}
