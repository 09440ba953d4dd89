//! Workspace resources and workspace membership.

use async_trait::async_trait;
use tracing::{debug, instrument};

use xavyo_connector::error::ConnectorResult;
use xavyo_connector::pagination::Bag;
use xavyo_connector::resource::{Entitlement, Grant, Page, Profile, Resource, ResourceId};
use xavyo_connector::traits::ResourceSyncer;
use xavyo_connector::types::ResourceType;

use crate::api::BitbucketClient;
use crate::models::Workspace;
use crate::roles::{title_case, MEMBER_ENTITLEMENT};
use crate::scope::Scope;

pub(crate) fn workspace_resource(workspace: &Workspace) -> Resource {
    let profile = Profile::new()
        .with("workspace_slug", workspace.slug.as_str())
        .with("workspace_name", workspace.name.as_str());

    Resource::new(
        ResourceId::new(ResourceType::Workspace, workspace.uuid.as_str()),
        workspace.slug.as_str(),
    )
    .with_profile(profile)
}

pub struct WorkspaceSyncer {
    client: BitbucketClient,
}

impl WorkspaceSyncer {
    pub fn new(client: BitbucketClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceSyncer<Scope> for WorkspaceSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Workspace
    }

    #[instrument(skip(self, scope, _parent))]
    async fn list(
        &self,
        scope: &Scope,
        _parent: Option<&ResourceId>,
        page_token: &str,
    ) -> ConnectorResult<Page<Resource>> {
        match scope {
            Scope::Workspace { workspace_id } => {
                let workspace = self.client.get_workspace(workspace_id).await?;
                Ok(Page::new(vec![workspace_resource(&workspace)], ""))
            }
            Scope::User { .. } => {
                let mut bag = Bag::decode(page_token)?;
                bag.push_if_empty(ResourceType::Workspace.as_str());

                let (workspaces, next) = self
                    .client
                    .get_workspaces(self.client.page_size(), bag.page_token())
                    .await?;

                let resources: Vec<Resource> = workspaces
                    .iter()
                    .filter(|w| scope.contains(&w.uuid))
                    .map(workspace_resource)
                    .collect();
                debug!(
                    listed = workspaces.len(),
                    in_scope = resources.len(),
                    "Listed workspaces"
                );

                Ok(Page::new(resources, bag.next_token(&next)))
            }
        }
    }

    fn entitlements(&self, resource: &Resource) -> Vec<Entitlement> {
        vec![
            Entitlement::assignment(resource, MEMBER_ENTITLEMENT, &[ResourceType::User])
                .with_display_name(format!(
                    "{} Workspace {}",
                    resource.display_name,
                    title_case(MEMBER_ENTITLEMENT)
                ))
                .with_description(format!(
                    "Workspace {} role in Bitbucket",
                    resource.display_name
                )),
        ]
    }

    #[instrument(skip(self, _scope, resource), fields(workspace = %resource.id))]
    async fn grants(
        &self,
        _scope: &Scope,
        resource: &Resource,
        page_token: &str,
    ) -> ConnectorResult<Page<Grant>> {
        let mut bag = Bag::decode(page_token)?;
        bag.push_if_empty(ResourceType::User.as_str());

        let (members, next) = self
            .client
            .get_workspace_members(
                &resource.id.resource,
                self.client.page_size(),
                bag.page_token(),
            )
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

        Ok(Page::new(grants, bag.next_token(&next)))
    }
}
