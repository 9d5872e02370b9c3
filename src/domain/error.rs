use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failed call to a remote completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    Network,
    Auth,
    RateLimited,
    NotFound,
    MalformedResponse,
    Other,
}

impl RemoteErrorKind {
    /// Classify an HTTP status returned by the endpoint.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => RemoteErrorKind::Auth,
            404 => RemoteErrorKind::NotFound,
            429 => RemoteErrorKind::RateLimited,
            _ => RemoteErrorKind::Other,
        }
    }

    /// Message shown to the user when a request in this category fails.
    pub fn user_message(&self) -> &'static str {
        match self {
            RemoteErrorKind::Network => {
                "I couldn't reach the assistant service. Please check your internet connection and try again."
            }
            RemoteErrorKind::Auth => {
                "The assistant service rejected the API key. Please check your credentials."
            }
            RemoteErrorKind::RateLimited => {
                "The assistant service is receiving too many requests right now (rate limit reached). Please wait a moment and try again."
            }
            RemoteErrorKind::NotFound => {
                "The configured assistant model could not be found. Please check the model name."
            }
            RemoteErrorKind::MalformedResponse | RemoteErrorKind::Other => {
                "Sorry, something went wrong while contacting the assistant. Please try again."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFailure {
    pub kind: RemoteErrorKind,
    pub status: Option<u16>,
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ValidationError(String),
    ParseError(String),
    LLMError(String),
    Remote(RemoteFailure),
    SecurityError(String),
    StorageError(String),
    IoError(String),
    ConfigError(String),
}

impl AppError {
    pub fn remote(kind: RemoteErrorKind, status: Option<u16>, detail: impl Into<String>) -> Self {
        AppError::Remote(RemoteFailure {
            kind,
            status,
            detail: detail.into(),
        })
    }

    /// Remote category of this error; anything that never reached the wire counts as `Other`.
    pub fn remote_kind(&self) -> RemoteErrorKind {
        match self {
            AppError::Remote(failure) => failure.kind,
            _ => RemoteErrorKind::Other,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::LLMError(msg) => write!(f, "LLM error: {}", msg),
            AppError::Remote(failure) => match failure.status {
                Some(status) => write!(
                    f,
                    "Remote error ({:?}, HTTP {}): {}",
                    failure.kind, status, failure.detail
                ),
                None => write!(f, "Remote error ({:?}): {}", failure.kind, failure.detail),
            },
            AppError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(RemoteErrorKind::from_status(401), RemoteErrorKind::Auth);
        assert_eq!(RemoteErrorKind::from_status(403), RemoteErrorKind::Auth);
        assert_eq!(RemoteErrorKind::from_status(404), RemoteErrorKind::NotFound);
        assert_eq!(RemoteErrorKind::from_status(429), RemoteErrorKind::RateLimited);
        assert_eq!(RemoteErrorKind::from_status(500), RemoteErrorKind::Other);
    }

    #[test]
    fn test_rate_limit_message_mentions_rate_limit() {
        assert!(RemoteErrorKind::RateLimited
            .user_message()
            .contains("rate limit"));
    }

    #[test]
    fn test_non_remote_errors_map_to_other() {
        let err = AppError::ValidationError("bad".to_string());
        assert_eq!(err.remote_kind(), RemoteErrorKind::Other);
    }
}
