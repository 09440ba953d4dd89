//! Bitbucket Cloud Connector for xavyo
//!
//! Implements the xavyo-connector traits for Bitbucket Cloud, synchronizing
//! workspaces, projects, repositories, user groups and users together with
//! who holds which permission on them.
//!
//! # Features
//!
//! - Access token, app password and OAuth consumer authentication
//! - Workspace discovery with per-workspace permission probing
//! - Resumable, page-at-a-time listings driven by opaque page tokens
//! - Project and repository grants from direct and group permissions
//! - Group membership and permission provisioning
//!
//! # Example
//!
//! ```no_run
//! use xavyo_connector::traits::{Connector, SyncOp};
//! use xavyo_connector::types::ResourceType;
//! use xavyo_connector_bitbucket::{BitbucketConfig, BitbucketConnector, BitbucketCredentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BitbucketConfig::new(BitbucketCredentials::token("workspace-access-token"))
//!     .with_page_size(100);
//!
//! let connector = BitbucketConnector::new(config)?;
//! let scope = connector.validate().await?;
//!
//! let mut token = String::new();
//! loop {
//!     let page = connector
//!         .list_resources(&scope, ResourceType::Workspace, None, &token)
//!         .await?;
//!     for workspace in &page.items {
//!         println!("{}", workspace.display_name);
//!     }
//!     if page.is_last() {
//!         break;
//!     }
//!     token = page.next_page_token;
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod auth;
mod client;
mod config;
mod connector;
mod error;
mod grants;
mod ids;
mod models;
mod project;
mod provisioning;
mod repository;
mod roles;
mod scope;
mod user;
mod user_group;
mod workspace;

#[cfg(test)]
mod testing;

// Re-exports
pub use api::{BitbucketClient, PermissionTarget};
pub use auth::{AuthOption, TokenCache};
pub use client::{ApiClient, HttpApiClient, QueryParams, DEFAULT_FIELDS};
pub use config::{
    BitbucketConfig, BitbucketCredentials, ConfigError, RetryConfig, DEFAULT_BASE_URL,
    DEFAULT_LOGIN_URL, DEFAULT_PAGE_SIZE, DEFAULT_V1_BASE_URL,
};
pub use connector::BitbucketConnector;
pub use error::{BitbucketError, BitbucketResult};
pub use ids::{GroupId, ProjectId, RepositoryId};
pub use models::{
    GroupPermission, GroupRef, Project, Repository, User, UserGroup, UserPermission, Workspace,
};
pub use provisioning::GrantMutator;
pub use roles::{PROJECT_ROLES, REPOSITORY_ROLES};
pub use scope::{Scope, ScopeResolver};
