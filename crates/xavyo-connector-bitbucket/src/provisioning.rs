//! Grant and revoke.
//!
//! Requests are validated before any upstream call: principal type, then
//! the role vocabulary, then whether Bitbucket can change the entitlement
//! at all. Permission writes overwrite upstream, so a principal already
//! holding some role is only a warning. Group membership is strict on
//! grant and lenient on revoke.

use tracing::{info, instrument, warn};

use xavyo_connector::error::{ConnectorError, ConnectorResult};
use xavyo_connector::resource::ResourceId;
use xavyo_connector::types::ResourceType;

use crate::api::{BitbucketClient, PermissionTarget};
use crate::error::{BitbucketError, BitbucketResult};
use crate::ids::{GroupId, ProjectId, RepositoryId};
use crate::roles::{grantable_to, is_known_slug, is_provisionable, ROLE_NONE};

/// Principal of a permission write.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PermissionHolder {
    User(String),
    Group(GroupId),
}

impl PermissionHolder {
    /// Resolve `principal` for a write against `workspace_id`.
    fn resolve(principal: &ResourceId, workspace_id: &str) -> ConnectorResult<Self> {
        match principal.resource_type {
            ResourceType::User => Ok(PermissionHolder::User(principal.resource.clone())),
            ResourceType::UserGroup => {
                let group: GroupId = principal.resource.parse()?;
                if group.workspace_id != workspace_id {
                    return Err(ConnectorError::invalid_argument(format!(
                        "group {group} belongs to workspace {}, not {workspace_id}",
                        group.workspace_id
                    )));
                }
                Ok(PermissionHolder::Group(group))
            }
            other => Err(ConnectorError::invalid_argument(format!(
                "{other} cannot hold permissions"
            ))),
        }
    }
}

/// Applies grants and revocations upstream.
pub struct GrantMutator {
    client: BitbucketClient,
}

impl GrantMutator {
    pub fn new(client: BitbucketClient) -> Self {
        Self { client }
    }

    /// Give `principal` the entitlement `slug` on `resource`.
    #[instrument(skip_all, fields(resource = %resource, principal = %principal, slug = %slug))]
    pub async fn grant(
        &self,
        principal: &ResourceId,
        resource: &ResourceId,
        slug: &str,
    ) -> ConnectorResult<()> {
        check_request(principal, resource, slug)?;

        match resource.resource_type {
            ResourceType::UserGroup => self.add_member(principal, resource).await,
            ResourceType::Project => {
                let project: ProjectId = resource.resource.parse()?;
                let target = crate::project::target(&project);
                self.set_permission(target, &project.workspace_id, principal, slug)
                    .await
            }
            ResourceType::Repository => {
                let repository: RepositoryId = resource.resource.parse()?;
                let target = crate::repository::target(&repository);
                self.set_permission(target, repository.workspace_id(), principal, slug)
                    .await
            }
            other => Err(not_provisionable(other, slug)),
        }
    }

    /// Take `slug` on `resource` away from `principal`.
    #[instrument(skip_all, fields(resource = %resource, principal = %principal, slug = %slug))]
    pub async fn revoke(
        &self,
        principal: &ResourceId,
        resource: &ResourceId,
        slug: &str,
    ) -> ConnectorResult<()> {
        check_request(principal, resource, slug)?;

        match resource.resource_type {
            ResourceType::UserGroup => self.remove_member(principal, resource).await,
            ResourceType::Project => {
                let project: ProjectId = resource.resource.parse()?;
                let target = crate::project::target(&project);
                self.unset_permission(target, &project.workspace_id, principal, slug)
                    .await
            }
            ResourceType::Repository => {
                let repository: RepositoryId = resource.resource.parse()?;
                let target = crate::repository::target(&repository);
                self.unset_permission(target, repository.workspace_id(), principal, slug)
                    .await
            }
            other => Err(not_provisionable(other, slug)),
        }
    }

    async fn is_member(&self, group: &GroupId, user_id: &str) -> ConnectorResult<bool> {
        let members = self
            .client
            .get_user_group_members(&group.workspace_id, &group.slug)
            .await?;
        Ok(members.iter().any(|m| m.uuid == user_id))
    }

    async fn add_member(
        &self,
        principal: &ResourceId,
        resource: &ResourceId,
    ) -> ConnectorResult<()> {
        let group: GroupId = resource.resource.parse()?;

        if self.is_member(&group, &principal.resource).await? {
            return Err(ConnectorError::already_granted(format!(
                "user {} is already a member of group {group}",
                principal.resource
            )));
        }

        self.client
            .add_user_to_group(&group.workspace_id, &group.slug, &principal.resource)
            .await?;
        info!(group = %group, user = %principal.resource, "Added user to group");
        Ok(())
    }

    async fn remove_member(
        &self,
        principal: &ResourceId,
        resource: &ResourceId,
    ) -> ConnectorResult<()> {
        let group: GroupId = resource.resource.parse()?;

        if !self.is_member(&group, &principal.resource).await? {
            warn!(
                group = %group,
                user = %principal.resource,
                "User is not a member of the group, removing anyway"
            );
        }

        let removed = self
            .client
            .remove_user_from_group(&group.workspace_id, &group.slug, &principal.resource)
            .await;
        tolerate_not_found(removed, "group membership")?;
        info!(group = %group, user = %principal.resource, "Removed user from group");
        Ok(())
    }

    /// Current role of `holder`, `none` when upstream has no entry.
    async fn current_permission(
        &self,
        target: PermissionTarget<'_>,
        holder: &PermissionHolder,
    ) -> ConnectorResult<String> {
        let result = match holder {
            PermissionHolder::User(user_id) => self
                .client
                .get_user_permission(target, user_id)
                .await
                .map(|p| p.permission),
            PermissionHolder::Group(group) => self
                .client
                .get_group_permission(target, &group.slug)
                .await
                .map(|p| p.permission),
        };

        match result {
            Ok(permission) => Ok(permission),
            Err(e) if e.is_not_found() => Ok(ROLE_NONE.to_string()),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_permission(
        &self,
        target: PermissionTarget<'_>,
        workspace_id: &str,
        principal: &ResourceId,
        role: &str,
    ) -> ConnectorResult<()> {
        let holder = PermissionHolder::resolve(principal, workspace_id)?;

        let current = self.current_permission(target, &holder).await?;
        if current != ROLE_NONE {
            warn!(
                principal = %principal,
                current = %current,
                requested = %role,
                "Principal already has a permission, overwriting"
            );
        }

        match &holder {
            PermissionHolder::User(user_id) => {
                self.client
                    .update_user_permission(target, user_id, role)
                    .await?
            }
            PermissionHolder::Group(group) => {
                self.client
                    .update_group_permission(target, &group.slug, role)
                    .await?
            }
        }
        info!(principal = %principal, role = %role, "Granted permission");
        Ok(())
    }

    async fn unset_permission(
        &self,
        target: PermissionTarget<'_>,
        workspace_id: &str,
        principal: &ResourceId,
        role: &str,
    ) -> ConnectorResult<()> {
        let holder = PermissionHolder::resolve(principal, workspace_id)?;

        let current = self.current_permission(target, &holder).await?;
        if current == ROLE_NONE {
            warn!(
                principal = %principal,
                role = %role,
                "Principal has no permission to revoke"
            );
        } else if current != role {
            warn!(
                principal = %principal,
                current = %current,
                revoked = %role,
                "Principal holds a different permission, removing it"
            );
        }

        let deleted = match &holder {
            PermissionHolder::User(user_id) => {
                self.client.delete_user_permission(target, user_id).await
            }
            PermissionHolder::Group(group) => {
                self.client.delete_group_permission(target, &group.slug).await
            }
        };
        tolerate_not_found(deleted, "permission")?;
        info!(principal = %principal, role = %role, "Revoked permission");
        Ok(())
    }
}

/// Validation shared by grant and revoke. Issues no upstream call.
fn check_request(
    principal: &ResourceId,
    resource: &ResourceId,
    slug: &str,
) -> ConnectorResult<()> {
    let resource_type = resource.resource_type;

    if !principal.resource_type.is_principal() {
        return Err(ConnectorError::UnsupportedPrincipal {
            resource_type,
            entitlement: slug.to_string(),
            principal_type: principal.resource_type,
        });
    }

    if !is_known_slug(resource_type, slug) {
        return Err(ConnectorError::UnsupportedRole {
            resource_type,
            role: slug.to_string(),
        });
    }

    if !is_provisionable(resource_type, slug) {
        return Err(not_provisionable(resource_type, slug));
    }

    if !grantable_to(resource_type, slug).contains(&principal.resource_type) {
        return Err(ConnectorError::UnsupportedPrincipal {
            resource_type,
            entitlement: slug.to_string(),
            principal_type: principal.resource_type,
        });
    }

    Ok(())
}

fn not_provisionable(resource_type: ResourceType, slug: &str) -> ConnectorError {
    ConnectorError::NotProvisionable {
        resource_type,
        entitlement: slug.to_string(),
    }
}

/// A 404 on removal means the state is already the desired one.
fn tolerate_not_found(result: BitbucketResult<()>, what: &str) -> ConnectorResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e @ BitbucketError::Api { status: 404, .. }) => {
            warn!(error = %e, "{what} already absent upstream");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
