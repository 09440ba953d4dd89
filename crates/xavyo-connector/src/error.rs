//! Connector Framework error types
//!
//! Error definitions shared by every connector, with the classification
//! helpers callers use to decide between retrying, excluding a workspace
//! or surfacing the failure to an operator.

use thiserror::Error;

use crate::types::ResourceType;

/// Error that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Request errors (permanent)
    /// Malformed identifier or otherwise unusable argument.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Role slug outside the fixed vocabulary of the resource type.
    #[error("unsupported role '{role}' for {resource_type}")]
    UnsupportedRole {
        resource_type: ResourceType,
        role: String,
    },

    /// Principal type cannot hold the requested entitlement.
    #[error("unsupported principal type '{principal_type}' for {resource_type} entitlement '{entitlement}'")]
    UnsupportedPrincipal {
        resource_type: ResourceType,
        entitlement: String,
        principal_type: ResourceType,
    },

    /// Entitlement exists but the upstream system offers no way to change it.
    #[error("{resource_type} entitlement '{entitlement}' cannot be provisioned")]
    NotProvisionable {
        resource_type: ResourceType,
        entitlement: String,
    },

    /// Page token could not be decoded.
    #[error("invalid page token: {message}")]
    InvalidPageToken { message: String },

    // Upstream classification
    /// Upstream denied access (HTTP 403).
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// Upstream object does not exist (HTTP 404).
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Credentials rejected or no usable workspace remains.
    #[error("unauthenticated: {message}")]
    Unauthenticated { message: String },

    // Grant preconditions
    /// The principal already holds the entitlement.
    #[error("already granted: {message}")]
    AlreadyGranted { message: String },

    /// The principal does not currently hold the entitlement.
    #[error("not currently granted: {message}")]
    NotCurrentlyGranted { message: String },

    // Transport errors (transient)
    /// Network failure or upstream 5xx.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The ambient cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,

    // Local errors
    /// Connector configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Serialization error.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl ConnectorError {
    /// Check if this error is transient and the operation should be retried.
    ///
    /// Only transport failures qualify. Cancellation is deliberate and never
    /// retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectorError::Transport { .. })
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Check if this error means the caller lacks permission.
    ///
    /// Transports do not always classify a 403; in that case the rendered
    /// message still contains `status 403`.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            ConnectorError::PermissionDenied { .. } => true,
            other => other.to_string().contains("status 403"),
        }
    }

    /// Check if this error belongs to the invalid-argument family.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            ConnectorError::InvalidArgument { .. }
                | ConnectorError::UnsupportedRole { .. }
                | ConnectorError::UnsupportedPrincipal { .. }
                | ConnectorError::NotProvisionable { .. }
                | ConnectorError::InvalidPageToken { .. }
        )
    }

    /// Check if this error is a grant precondition mismatch.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ConnectorError::AlreadyGranted { .. } | ConnectorError::NotCurrentlyGranted { .. }
        )
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            ConnectorError::UnsupportedRole { .. } => "UNSUPPORTED_ROLE",
            ConnectorError::UnsupportedPrincipal { .. } => "UNSUPPORTED_PRINCIPAL",
            ConnectorError::NotProvisionable { .. } => "NOT_PROVISIONABLE",
            ConnectorError::InvalidPageToken { .. } => "INVALID_PAGE_TOKEN",
            ConnectorError::PermissionDenied { .. } => "PERMISSION_DENIED",
            ConnectorError::NotFound { .. } => "NOT_FOUND",
            ConnectorError::Unauthenticated { .. } => "UNAUTHENTICATED",
            ConnectorError::AlreadyGranted { .. } => "ALREADY_GRANTED",
            ConnectorError::NotCurrentlyGranted { .. } => "NOT_CURRENTLY_GRANTED",
            ConnectorError::Transport { .. } => "TRANSPORT_ERROR",
            ConnectorError::Cancelled => "CANCELLED",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::Serialization { .. } => "SERIALIZATION_ERROR",
        }
    }

    // Convenience constructors

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ConnectorError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        ConnectorError::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        ConnectorError::NotFound {
            message: message.into(),
        }
    }

    /// Create an unauthenticated error.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ConnectorError::Unauthenticated {
            message: message.into(),
        }
    }

    /// Error returned when scope resolution leaves no usable workspace.
    pub fn no_authenticated_workspaces() -> Self {
        Self::unauthenticated("no authenticated workspaces found")
    }

    /// Create an already granted error.
    pub fn already_granted(message: impl Into<String>) -> Self {
        ConnectorError::AlreadyGranted {
            message: message.into(),
        }
    }

    /// Create a not currently granted error.
    pub fn not_currently_granted(message: impl Into<String>) -> Self {
        ConnectorError::NotCurrentlyGranted {
            message: message.into(),
        }
    }

    /// Create an invalid page token error.
    pub fn invalid_page_token(message: impl Into<String>) -> Self {
        ConnectorError::InvalidPageToken {
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        ConnectorError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with source.
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
