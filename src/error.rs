//! Error taxonomy shared by the inference service and the alert dispatcher.

use thiserror::Error;

/// Request-level and startup errors.
///
/// `Validation` is always caused by the client and carries a message that is
/// safe to return verbatim. `Internal` keeps the full cause for the log; only
/// a generic summary leaves the process.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("internal error: {0:#}")]
    Internal(#[source] anyhow::Error),

    #[error("startup failed: {0:#}")]
    Startup(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn internal(error: impl Into<anyhow::Error>) -> Self {
        Error::Internal(error.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = Error::validation("Expected 4 features, got 5");
        assert_eq!(err.to_string(), "Expected 4 features, got 5");
        assert!(err.is_validation());
    }

    #[test]
    fn test_internal_keeps_cause_chain() {
        let cause = anyhow::anyhow!("shape mismatch").context("classifier run failed");
        let err = Error::internal(cause);
        assert!(!err.is_validation());
        let rendered = err.to_string();
        assert!(rendered.contains("classifier run failed"));
        assert!(rendered.contains("shape mismatch"));
    }
}
