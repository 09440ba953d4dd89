//! Projects: repository assignment and project permissions.
//!
//! Grants of a project are listed in three phases, each paginated on its
//! own: repositories, then group permissions (expanded into the group's
//! members), then direct user permissions. The phase and its upstream
//! cursor travel in the page token.

use async_trait::async_trait;
use tracing::{debug, instrument};

use xavyo_connector::error::ConnectorResult;
use xavyo_connector::pagination::{Bag, PageState};
use xavyo_connector::resource::{Entitlement, Grant, Page, Profile, Resource, ResourceId};
use xavyo_connector::traits::ResourceSyncer;
use xavyo_connector::types::ResourceType;

use crate::api::{BitbucketClient, PermissionTarget};
use crate::grants::{current_phase, position, unexpected_phase, EmittedGrants};
use crate::ids::{GroupId, ProjectId, RepositoryId};
use crate::models::Project;
use crate::roles::{is_role, title_case, PROJECT_ROLES, REPOSITORY_ENTITLEMENT};
use crate::scope::Scope;

pub(crate) fn project_resource(project: &Project, workspace: &ResourceId) -> Resource {
    let id = ProjectId::new(
        workspace.resource.as_str(),
        project.uuid.as_str(),
        project.key.as_str(),
    );
    let profile = Profile::new()
        .with("project_id", project.uuid.as_str())
        .with("project_name", project.name.as_str())
        .with("project_key", project.key.as_str());

    Resource::new(
        ResourceId::new(ResourceType::Project, id.to_string()),
        project.name.as_str(),
    )
    .with_parent(Some(workspace.clone()))
    .with_profile(profile)
}

pub struct ProjectSyncer {
    client: BitbucketClient,
    emitted: EmittedGrants,
}

impl ProjectSyncer {
    pub fn new(client: BitbucketClient) -> Self {
        Self {
            client,
            emitted: EmittedGrants::default(),
        }
    }

    async fn repository_grants(
        &self,
        resource: &Resource,
        project: &ProjectId,
        bag: &mut Bag,
    ) -> ConnectorResult<Page<Grant>> {
        let (repos, next) = self
            .client
            .get_project_repos(
                &project.workspace_id,
                &project.project_id,
                self.client.page_size(),
                bag.page_token(),
            )
            .await?;

        let grants = repos
            .into_iter()
            .map(|repo| {
                let repo_id = RepositoryId::new(project.clone(), repo.uuid);
                Grant::new(
                    &resource.id,
                    REPOSITORY_ENTITLEMENT,
                    ResourceId::new(ResourceType::Repository, repo_id.to_string()),
                )
            })
            .collect();

        Ok(Page::new(grants, bag.next_token(&next)))
    }

    async fn group_grants(
        &self,
        resource: &Resource,
        project: &ProjectId,
        bag: &mut Bag,
    ) -> ConnectorResult<Page<Grant>> {
        let (permissions, next) = self
            .client
            .list_group_permissions(
                target(project),
                self.client.page_size(),
                bag.page_token(),
            )
            .await?;

        let mut grants = Vec::new();
        for permission in permissions {
            if !is_role(ResourceType::Project, &permission.permission) {
                debug!(
                    role = %permission.permission,
                    group = %permission.group.slug,
                    "Skipping unsupported project role"
                );
                continue;
            }

            let group = GroupId::new(
                project.workspace_id.as_str(),
                permission.group.slug.as_str(),
            );
            grants.push(Grant::new(
                &resource.id,
                &permission.permission,
                ResourceId::new(ResourceType::UserGroup, group.to_string()),
            ));

            let members = self
                .client
                .get_user_group_members(&project.workspace_id, &permission.group.slug)
                .await?;
            grants.extend(members.into_iter().map(|user| {
                Grant::new(
                    &resource.id,
                    &permission.permission,
                    ResourceId::new(ResourceType::User, user.uuid),
                )
            }));
        }

        let grants = self.emitted.retain_new(&position(bag), grants).await;
        Ok(Page::new(grants, bag.next_token(&next)))
    }

    async fn user_grants(
        &self,
        resource: &Resource,
        project: &ProjectId,
        bag: &mut Bag,
    ) -> ConnectorResult<Page<Grant>> {
        let (permissions, next) = self
            .client
            .list_user_permissions(
                target(project),
                self.client.page_size(),
                bag.page_token(),
            )
            .await?;

        let grants = permissions
            .into_iter()
            .filter(|p| is_role(ResourceType::Project, &p.permission))
            .map(|p| {
                Grant::new(
                    &resource.id,
                    &p.permission,
                    ResourceId::new(ResourceType::User, p.user.uuid),
                )
            })
            .collect();

        let grants = self.emitted.retain_new(&position(bag), grants).await;
        Ok(Page::new(grants, bag.next_token(&next)))
    }
}

pub(crate) fn target(project: &ProjectId) -> PermissionTarget<'_> {
    PermissionTarget::Project {
        workspace_id: &project.workspace_id,
        project_key: &project.project_key,
    }
}

#[async_trait]
impl ResourceSyncer<Scope> for ProjectSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Project
    }

    #[instrument(skip(self, _scope))]
    async fn list(
        &self,
        _scope: &Scope,
        parent: Option<&ResourceId>,
        page_token: &str,
    ) -> ConnectorResult<Page<Resource>> {
        let Some(parent) = parent.filter(|p| p.resource_type == ResourceType::Workspace) else {
            return Ok(Page::empty());
        };

        let mut bag = Bag::decode(page_token)?;
        bag.push_if_empty(ResourceType::Project.as_str());

        let (projects, next) = self
            .client
            .get_workspace_projects(&parent.resource, self.client.page_size(), bag.page_token())
            .await?;

        let resources = projects
            .iter()
            .map(|project| project_resource(project, parent))
            .collect();

        Ok(Page::new(resources, bag.next_token(&next)))
    }

    fn entitlements(&self, resource: &Resource) -> Vec<Entitlement> {
        let mut entitlements = vec![Entitlement::assignment(
            resource,
            REPOSITORY_ENTITLEMENT,
            &[ResourceType::Repository],
        )
        .with_display_name(format!(
            "{} Project {}",
            resource.display_name,
            title_case(REPOSITORY_ENTITLEMENT)
        ))
        .with_description(format!(
            "Access to {} project in Bitbucket",
            resource.display_name
        ))];

        entitlements.extend(PROJECT_ROLES.iter().map(|role| {
            Entitlement::permission(
                resource,
                role,
                &[ResourceType::User, ResourceType::UserGroup],
            )
            .with_display_name(format!(
                "{} Project {}",
                resource.display_name,
                title_case(role)
            ))
            .with_description(format!(
                "{} access to {} project in Bitbucket",
                title_case(role),
                resource.display_name
            ))
        }));

        entitlements
    }

    #[instrument(skip(self, _scope, resource), fields(project = %resource.id))]
    async fn grants(
        &self,
        _scope: &Scope,
        resource: &Resource,
        page_token: &str,
    ) -> ConnectorResult<Page<Grant>> {
        let project: ProjectId = resource.id.resource.parse()?;

        let mut bag = Bag::decode(page_token)?;
        if bag.is_empty() {
            self.emitted.reset(&resource.id).await;
        }
        bag.push_if_empty(ResourceType::Project.as_str());

        loop {
            match current_phase(&bag)? {
                Some(ResourceType::Project) => {
                    bag.pop();
                    bag.push(PageState::new(ResourceType::User.as_str()));
                    bag.push(PageState::new(ResourceType::UserGroup.as_str()));
                    bag.push(PageState::new(ResourceType::Repository.as_str()));
                }
                Some(ResourceType::Repository) => {
                    return self.repository_grants(resource, &project, &mut bag).await;
                }
                Some(ResourceType::UserGroup) => {
                    return self.group_grants(resource, &project, &mut bag).await;
                }
                Some(ResourceType::User) => {
                    return self.user_grants(resource, &project, &mut bag).await;
                }
                Some(other) => return Err(unexpected_phase("project", other)),
                None => return Ok(Page::empty()),
            }
        }
    }
}
