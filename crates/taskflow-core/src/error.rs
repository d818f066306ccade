use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("Timed out after {ms}ms")]
    Timeout { ms: u64 },
}

impl TaskflowError {
    /// Short error code string sent to clients in `{error: {message, code}}` bodies.
    pub fn code(&self) -> &'static str {
        match self {
            TaskflowError::Config(_) => "CONFIG_ERROR",
            TaskflowError::Validation(_) => "INVALID_REQUEST",
            TaskflowError::Provider(_) => "LLM_PROVIDER_ERROR",
            TaskflowError::Timeout { .. } => "TIMEOUT",
        }
    }

    /// Validation and configuration failures are the caller's fault and
    /// reject the request before any task exists.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TaskflowError::Validation(_) | TaskflowError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TaskflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(TaskflowError::Config("x".into()).code(), "CONFIG_ERROR");
        assert_eq!(
            TaskflowError::Validation("x".into()).code(),
            "INVALID_REQUEST"
        );
        assert_eq!(TaskflowError::Timeout { ms: 5 }.code(), "TIMEOUT");
        assert_eq!(
            TaskflowError::Provider("x".into()).code(),
            "LLM_PROVIDER_ERROR"
        );
    }

    #[test]
    fn config_errors_count_as_client_errors() {
        assert!(TaskflowError::Config("missing key".into()).is_client_error());
        assert!(!TaskflowError::Provider("500".into()).is_client_error());
    }
}
