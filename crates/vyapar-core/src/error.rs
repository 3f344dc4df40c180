//! Error types for Vyapar
//!
//! Upstream failures from the language model are kept distinct so callers can
//! surface a stable, user-facing message (`Error::user_message`) while the
//! detailed cause goes to the logs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    #[error("Upstream quota exhausted: {0}")]
    UpstreamQuotaExhausted(String),

    #[error("Malformed upstream response: {0}")]
    UpstreamMalformed(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream call timed out after {0}s")]
    UpstreamTimeout(u64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    /// Whether a mandatory AI call may be retried after this error
    ///
    /// Rate limits and quota exhaustion are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable(_) | Error::UpstreamTimeout(_) | Error::UpstreamMalformed(_)
        )
    }

    /// Stable message safe to show to end users
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message, .. } => message.clone(),
            Error::Configuration(_) => {
                "The analysis service is temporarily unavailable.".to_string()
            }
            Error::UpstreamRateLimited(_) => {
                "Too many analyses right now. Please try again in a minute.".to_string()
            }
            Error::UpstreamQuotaExhausted(_) => {
                "The analysis service has reached its usage limit. Please try again later."
                    .to_string()
            }
            Error::UpstreamMalformed(_) => "Analysis incomplete, please try again.".to_string(),
            Error::UpstreamUnavailable(_) | Error::UpstreamTimeout(_) | Error::Http(_) => {
                "The analysis service did not respond. Please try again.".to_string()
            }
            Error::NotFound(what) => format!("Not found: {}", what),
            _ => "An internal error occurred".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_field_specific() {
        let err = Error::validation("businessIdea", "must be at least 10 characters");
        assert_eq!(err.user_message(), "must be at least 10 characters");
        assert!(err.to_string().contains("businessIdea"));
    }

    #[test]
    fn test_rate_limit_not_transient() {
        assert!(!Error::UpstreamRateLimited("429".into()).is_transient());
        assert!(!Error::UpstreamQuotaExhausted("quota".into()).is_transient());
        assert!(Error::UpstreamTimeout(30).is_transient());
        assert!(Error::UpstreamMalformed("no json".into()).is_transient());
    }

    #[test]
    fn test_configuration_hides_cause() {
        let err = Error::Configuration("OPENAI_COMPATIBLE_HOST not set".into());
        assert!(!err.user_message().contains("OPENAI"));
    }
}
