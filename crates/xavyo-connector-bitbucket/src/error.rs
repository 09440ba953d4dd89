//! Error types for the Bitbucket connector.

use thiserror::Error;
use xavyo_connector::error::ConnectorError;

/// Result type alias using `BitbucketError`.
pub type BitbucketResult<T> = Result<T, BitbucketError>;

/// Errors that can occur when interacting with Bitbucket.
#[derive(Debug, Error)]
pub enum BitbucketError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// OAuth2 token exchange failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Non-success response from the Bitbucket API.
    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure without a status code.
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Malformed composite identifier.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// The cancellation token fired while a request was in flight.
    #[error("request cancelled")]
    Cancelled,
}

impl BitbucketError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            BitbucketError::Api { status, .. } => Some(*status),
            BitbucketError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for upstream 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<BitbucketError> for ConnectorError {
    fn from(err: BitbucketError) -> Self {
        let message = err.to_string();
        match err {
            BitbucketError::Api { status, .. } => match status {
                401 => ConnectorError::unauthenticated(message),
                403 => ConnectorError::permission_denied(message),
                404 => ConnectorError::not_found(message),
                429 | 500..=599 => ConnectorError::transport(message),
                400..=499 => ConnectorError::invalid_argument(message),
                _ => ConnectorError::transport(message),
            },
            BitbucketError::Http(source) => {
                ConnectorError::transport_with_source("HTTP request failed", source)
            }
            BitbucketError::Transport(_) => ConnectorError::transport(message),
            BitbucketError::Json(e) => ConnectorError::Serialization {
                message: e.to_string(),
            },
            BitbucketError::Url(_) | BitbucketError::InvalidId(_) => {
                ConnectorError::invalid_argument(message)
            }
            BitbucketError::Config(m) => ConnectorError::invalid_configuration(m),
            BitbucketError::Auth(_) => ConnectorError::unauthenticated(message),
            BitbucketError::Cancelled => ConnectorError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> BitbucketError {
        BitbucketError::Api {
            status,
            message: "Error: nope".to_string(),
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ConnectorError::from(api(401)),
            ConnectorError::Unauthenticated { .. }
        ));
        assert!(matches!(
            ConnectorError::from(api(403)),
            ConnectorError::PermissionDenied { .. }
        ));
        assert!(matches!(
            ConnectorError::from(api(404)),
            ConnectorError::NotFound { .. }
        ));
        assert!(matches!(
            ConnectorError::from(api(400)),
            ConnectorError::InvalidArgument { .. }
        ));
        assert!(ConnectorError::from(api(503)).is_transient());
        assert!(ConnectorError::from(api(429)).is_transient());
    }

    #[test]
    fn test_unclassified_403_still_detected() {
        let err = ConnectorError::from(BitbucketError::Transport(
            "unexpected response, status 403".to_string(),
        ));
        assert!(err.is_transient());
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_api_message_contains_status() {
        assert_eq!(
            api(403).to_string(),
            "request failed with status 403: Error: nope"
        );
        assert!(api(404).is_not_found());
        assert!(!api(403).is_not_found());
    }

    #[test]
    fn test_cancelled_maps_to_cancelled() {
        assert!(matches!(
            ConnectorError::from(BitbucketError::Cancelled),
            ConnectorError::Cancelled
        ));
    }
}
