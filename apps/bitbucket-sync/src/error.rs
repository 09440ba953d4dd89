//! CLI error types and exit codes

use thiserror::Error;
use xavyo_connector::error::ConnectorError;
use xavyo_connector_bitbucket::ConfigError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication error
/// - 3: Transport error
/// - 4: Invalid input
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Connector(#[from] ConnectorError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Validation(_) => 4,
            CliError::Connector(e) => match e {
                ConnectorError::Unauthenticated { .. } | ConnectorError::PermissionDenied { .. } => 2,
                ConnectorError::Transport { .. } => 3,
                ConnectorError::Cancelled | ConnectorError::Serialization { .. } => 1,
                _ if e.is_invalid_argument() || e.is_precondition() => 4,
                ConnectorError::NotFound { .. } | ConnectorError::InvalidConfiguration { .. } => 4,
                _ => 1,
            },
            CliError::Io(_) | CliError::Json(_) => 1,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => Some(
                "Set BITBUCKET_TOKEN, or BITBUCKET_USERNAME and BITBUCKET_APP_PASSWORD, \
                 or BITBUCKET_CONSUMER_KEY and BITBUCKET_CONSUMER_SECRET.",
            ),
            CliError::Connector(ConnectorError::Unauthenticated { .. }) => {
                Some("Check the credentials and the BITBUCKET_WORKSPACES allow-list.")
            }
            CliError::Connector(ConnectorError::Transport { .. }) => {
                Some("Bitbucket may be unavailable or rate limiting, try again later.")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xavyo_connector::types::ResourceType;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CliError::from(ConnectorError::no_authenticated_workspaces()).exit_code(),
            2
        );
        assert_eq!(
            CliError::from(ConnectorError::permission_denied("no")).exit_code(),
            2
        );
        assert_eq!(CliError::from(ConnectorError::transport("down")).exit_code(), 3);
        assert_eq!(
            CliError::from(ConnectorError::UnsupportedRole {
                resource_type: ResourceType::Project,
                role: "owner".into(),
            })
            .exit_code(),
            4
        );
        assert_eq!(CliError::from(ConnectorError::Cancelled).exit_code(), 1);
        assert_eq!(CliError::Validation("bad".into()).exit_code(), 4);
    }
}
