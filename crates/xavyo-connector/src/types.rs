//! Connector Framework type definitions
//!
//! Closed enums for resource types and entitlement kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of a node in the access hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Top-level tenant boundary
    Workspace,
    /// Grouping of repositories within a workspace
    Project,
    /// Code store within a project
    Repository,
    /// Named collection of users
    UserGroup,
    /// Individual account
    User,
}

impl ResourceType {
    /// Get all resource types, roots first.
    #[must_use]
    pub fn all() -> &'static [ResourceType] {
        &[
            ResourceType::Workspace,
            ResourceType::UserGroup,
            ResourceType::User,
            ResourceType::Project,
            ResourceType::Repository,
        ]
    }

    /// Get the string representation used in identifiers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Workspace => "workspace",
            ResourceType::Project => "project",
            ResourceType::Repository => "repository",
            ResourceType::UserGroup => "user_group",
            ResourceType::User => "user",
        }
    }

    /// Human readable name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceType::Workspace => "Workspace",
            ResourceType::Project => "Project",
            ResourceType::Repository => "Repository",
            ResourceType::UserGroup => "UserGroup",
            ResourceType::User => "User",
        }
    }

    /// Whether resources of this type may hold grants.
    #[must_use]
    pub fn is_principal(&self) -> bool {
        matches!(self, ResourceType::User | ResourceType::UserGroup)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ParseResourceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "workspace" => Ok(ResourceType::Workspace),
            "project" => Ok(ResourceType::Project),
            "repository" => Ok(ResourceType::Repository),
            "user_group" => Ok(ResourceType::UserGroup),
            "user" => Ok(ResourceType::User),
            _ => Err(ParseResourceTypeError(s.to_string())),
        }
    }
}

/// Error parsing resource type from string.
#[derive(Debug, Clone)]
pub struct ParseResourceTypeError(String);

impl fmt::Display for ParseResourceTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid resource type '{}', expected one of: workspace, project, repository, user_group, user",
            self.0
        )
    }
}

impl std::error::Error for ParseResourceTypeError {}

/// Kind of an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementKind {
    /// Binary membership
    Assignment,
    /// One of a mutually exclusive role set
    Permission,
}

impl EntitlementKind {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementKind::Assignment => "assignment",
            EntitlementKind::Permission => "permission",
        }
    }
}

impl fmt::Display for EntitlementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
