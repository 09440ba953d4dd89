//! User groups and group membership.
//!
//! Groups only exist on the v1 API, which returns whole collections
//! without pagination; both listings here complete in a single page.

use async_trait::async_trait;
use tracing::instrument;

use xavyo_connector::error::ConnectorResult;
use xavyo_connector::resource::{Entitlement, Grant, Page, Profile, Resource, ResourceId};
use xavyo_connector::traits::ResourceSyncer;
use xavyo_connector::types::ResourceType;

use crate::api::BitbucketClient;
use crate::ids::GroupId;
use crate::models::UserGroup;
use crate::roles::{title_case, MEMBER_ENTITLEMENT};
use crate::scope::Scope;

pub(crate) fn user_group_resource(group: &UserGroup, workspace: &ResourceId) -> Resource {
    let id = GroupId::new(workspace.resource.as_str(), group.slug.as_str());

    let mut profile = Profile::new()
        .with("userGroup_name", group.name.as_str())
        .with("userGroup_slug", group.slug.as_str())
        .with(
            "userGroup_permission",
            group.permission.as_deref().unwrap_or_default(),
        );
    if !group.members.is_empty() {
        let member_ids: Vec<String> = group.members.iter().map(|m| m.uuid.clone()).collect();
        profile.set("userGroup_members", member_ids);
    }

    Resource::new(
        ResourceId::new(ResourceType::UserGroup, id.to_string()),
        group.name.as_str(),
    )
    .with_parent(Some(workspace.clone()))
    .with_profile(profile)
}

pub struct UserGroupSyncer {
    client: BitbucketClient,
}

impl UserGroupSyncer {
    pub fn new(client: BitbucketClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceSyncer<Scope> for UserGroupSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::UserGroup
    }

    #[instrument(skip(self, _scope, _page_token))]
    async fn list(
        &self,
        _scope: &Scope,
        parent: Option<&ResourceId>,
        _page_token: &str,
    ) -> ConnectorResult<Page<Resource>> {
        let Some(parent) = parent.filter(|p| p.resource_type == ResourceType::Workspace) else {
            return Ok(Page::empty());
        };

        let groups = self
            .client
            .get_workspace_user_groups(&parent.resource)
            .await?;

        let resources = groups
            .iter()
            .map(|group| user_group_resource(group, parent))
            .collect();

        Ok(Page::new(resources, ""))
    }

    fn entitlements(&self, resource: &Resource) -> Vec<Entitlement> {
        vec![
            Entitlement::assignment(resource, MEMBER_ENTITLEMENT, &[ResourceType::User])
                .with_display_name(format!(
                    "{} UserGroup {}",
                    resource.display_name,
                    title_case(MEMBER_ENTITLEMENT)
                ))
                .with_description(format!(
                    "Access to {} userGroup in Bitbucket",
                    resource.display_name
                )),
        ]
    }

    /// Members come from the v1 member listing, not the resource profile.
    #[instrument(skip(self, _scope, resource, _page_token), fields(group = %resource.id))]
    async fn grants(
        &self,
        _scope: &Scope,
        resource: &Resource,
        _page_token: &str,
    ) -> ConnectorResult<Page<Grant>> {
        let group: GroupId = resource.id.resource.parse()?;

        let members = self
            .client
            .get_user_group_members(&group.workspace_id, &group.slug)
            .await?;

        let grants = members
            .into_iter()
            .map(|user| {
                Grant::new(
                    &resource.id,
                    MEMBER_ENTITLEMENT,
                    ResourceId::new(ResourceType::User, user.uuid),
                )
            })
            .collect();

        Ok(Page::new(grants, ""))
    }
}
