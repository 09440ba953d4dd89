//! Scope resolution.
//!
//! Bitbucket has no endpoint listing the permissions of the current
//! identity, so access to each candidate workspace is established by
//! probing the group, member and project listings every sync needs anyway.

use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, instrument};

use xavyo_connector::error::{ConnectorError, ConnectorResult};

use crate::api::BitbucketClient;
use crate::error::BitbucketResult;
use crate::models::Workspace;

/// Workspaces a validated connector operates over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// Credentials scoped to a single workspace (access tokens).
    Workspace { workspace_id: String },
    /// User credentials; the workspaces that passed the probe.
    User {
        user_id: String,
        workspace_ids: Vec<String>,
    },
}

impl Scope {
    pub fn workspace_ids(&self) -> Vec<&str> {
        match self {
            Scope::Workspace { workspace_id } => vec![workspace_id.as_str()],
            Scope::User { workspace_ids, .. } => workspace_ids.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, workspace_id: &str) -> bool {
        self.workspace_ids().contains(&workspace_id)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Workspace { workspace_id } => write!(f, "workspace:{workspace_id}"),
            Scope::User {
                user_id,
                workspace_ids,
            } => write!(f, "user:{user_id} ({} workspaces)", workspace_ids.len()),
        }
    }
}

/// Listing whose failure excluded a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeObject {
    UserGroups,
    Users,
    Projects,
}

impl ProbeObject {
    fn as_str(&self) -> &'static str {
        match self {
            ProbeObject::UserGroups => "userGroups",
            ProbeObject::Users => "users",
            ProbeObject::Projects => "projects",
        }
    }
}

/// Resolves the [`Scope`] of the configured credentials.
pub struct ScopeResolver<'a> {
    client: &'a BitbucketClient,
    allow_list: &'a [String],
}

impl<'a> ScopeResolver<'a> {
    /// `allow_list` holds workspace slugs; empty means no filtering.
    pub fn new(client: &'a BitbucketClient, allow_list: &'a [String]) -> Self {
        Self { client, allow_list }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self) -> ConnectorResult<Scope> {
        let identity = self.client.get_current_user().await?;
        debug!(kind = %identity.kind, id = %identity.uuid, "Resolved current identity");

        match identity.kind.as_str() {
            "team" => {
                let workspace = Workspace {
                    uuid: identity.uuid.clone(),
                    slug: identity.nickname.clone(),
                    name: identity.display_name.clone(),
                };
                if !self.probe(&workspace).await? {
                    return Err(ConnectorError::no_authenticated_workspaces());
                }
                info!(workspace_id = %identity.uuid, "Using workspace scope");
                Ok(Scope::Workspace {
                    workspace_id: identity.uuid,
                })
            }
            "user" => {
                let workspace_ids = self.discover().await?;
                if workspace_ids.is_empty() {
                    return Err(ConnectorError::no_authenticated_workspaces());
                }
                info!(
                    user_id = %identity.uuid,
                    workspaces = workspace_ids.len(),
                    "Using user scope"
                );
                Ok(Scope::User {
                    user_id: identity.uuid,
                    workspace_ids,
                })
            }
            other => Err(ConnectorError::unauthenticated(format!(
                "unsupported identity type: {other}"
            ))),
        }
    }

    /// Every visible workspace that is allow-listed and passes the probe.
    async fn discover(&self) -> ConnectorResult<Vec<String>> {
        let mut valid = Vec::new();

        for workspace in self.client.get_all_workspaces().await? {
            if !self.is_allowed(&workspace) {
                debug!(workspace = %workspace.slug, "Workspace not in allow-list");
                continue;
            }
            if self.probe(&workspace).await? {
                valid.push(workspace.uuid);
            }
        }

        Ok(valid)
    }

    fn is_allowed(&self, workspace: &Workspace) -> bool {
        self.allow_list.is_empty() || self.allow_list.iter().any(|s| s == &workspace.slug)
    }

    /// `Ok(false)` when a listing is denied; other failures abort resolution.
    async fn probe(&self, workspace: &Workspace) -> ConnectorResult<bool> {
        let id = workspace.uuid.as_str();

        let groups = self.client.get_workspace_user_groups(id).await.map(drop);
        if self.is_denied(workspace, ProbeObject::UserGroups, groups)? {
            return Ok(false);
        }

        let members = self.client.get_workspace_members(id, 1, "").await.map(drop);
        if self.is_denied(workspace, ProbeObject::Users, members)? {
            return Ok(false);
        }

        let projects = self.client.get_workspace_projects(id, 1, "").await.map(drop);
        if self.is_denied(workspace, ProbeObject::Projects, projects)? {
            return Ok(false);
        }

        Ok(true)
    }

    fn is_denied(
        &self,
        workspace: &Workspace,
        object: ProbeObject,
        result: BitbucketResult<()>,
    ) -> ConnectorResult<bool> {
        let Err(err) = result else {
            return Ok(false);
        };

        let err = ConnectorError::from(err);
        if err.is_permission_denied() {
            error!(
                workspace = %workspace.slug,
                workspace_id = %workspace.uuid,
                object = object.as_str(),
                "missing permission to list object in workspace"
            );
            return Ok(true);
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_workspace_ids() {
        let scope = Scope::Workspace {
            workspace_id: "{w}".into(),
        };
        assert_eq!(scope.workspace_ids(), vec!["{w}"]);
        assert!(scope.contains("{w}"));
        assert_eq!(scope.to_string(), "workspace:{w}");

        let scope = Scope::User {
            user_id: "{u}".into(),
            workspace_ids: vec!["{a}".into(), "{b}".into()],
        };
        assert!(scope.contains("{b}"));
        assert!(!scope.contains("{c}"));
        assert_eq!(scope.to_string(), "user:{u} (2 workspaces)");
    }

    #[test]
    fn test_scope_serializes_with_kind() {
        let scope = Scope::Workspace {
            workspace_id: "{w}".into(),
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["kind"], "workspace");
        assert_eq!(json["workspace_id"], "{w}");
    }
}
