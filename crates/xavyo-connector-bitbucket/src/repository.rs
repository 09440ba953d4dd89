//! Repositories and repository permissions.

use async_trait::async_trait;
use tracing::instrument;

use xavyo_connector::error::ConnectorResult;
use xavyo_connector::pagination::{Bag, PageState};
use xavyo_connector::resource::{Entitlement, Grant, Page, Profile, Resource, ResourceId};
use xavyo_connector::traits::ResourceSyncer;
use xavyo_connector::types::ResourceType;

use crate::api::{BitbucketClient, PermissionTarget};
use crate::grants::{current_phase, position, unexpected_phase, EmittedGrants};
use crate::ids::{GroupId, ProjectId, RepositoryId};
use crate::models::Repository;
use crate::roles::{is_role, title_case, REPOSITORY_ROLES};
use crate::scope::Scope;

pub(crate) fn repository_resource(
    repository: &Repository,
    project: &ResourceId,
) -> ConnectorResult<Resource> {
    let project_id: ProjectId = project.resource.parse()?;
    let id = RepositoryId::new(project_id, repository.uuid.as_str());
    let profile = Profile::new()
        .with("repository_id", repository.uuid.as_str())
        .with("repository_name", repository.name.as_str())
        .with("repository_full_name", repository.full_name.as_str());

    Ok(Resource::new(
        ResourceId::new(ResourceType::Repository, id.to_string()),
        repository.full_name.as_str(),
    )
    .with_parent(Some(project.clone()))
    .with_profile(profile))
}

pub(crate) fn target(repository: &RepositoryId) -> PermissionTarget<'_> {
    PermissionTarget::Repository {
        workspace_id: repository.workspace_id(),
        repo_id: &repository.repo_id,
    }
}

pub struct RepositorySyncer {
    client: BitbucketClient,
    emitted: EmittedGrants,
}

impl RepositorySyncer {
    pub fn new(client: BitbucketClient) -> Self {
        Self {
            client,
            emitted: EmittedGrants::default(),
        }
    }

    async fn group_grants(
        &self,
        resource: &Resource,
        repository: &RepositoryId,
        bag: &mut Bag,
    ) -> ConnectorResult<Page<Grant>> {
        let (permissions, next) = self
            .client
            .list_group_permissions(
                target(repository),
                self.client.page_size(),
                bag.page_token(),
            )
            .await?;

        let grants = permissions
            .into_iter()
            .filter(|p| is_role(ResourceType::Repository, &p.permission))
            .map(|p| {
                let group = GroupId::new(repository.workspace_id(), p.group.slug);
                Grant::new(
                    &resource.id,
                    &p.permission,
                    ResourceId::new(ResourceType::UserGroup, group.to_string()),
                )
            })
            .collect();

        let grants = self.emitted.retain_new(&position(bag), grants).await;
        Ok(Page::new(grants, bag.next_token(&next)))
    }

    async fn user_grants(
        &self,
        resource: &Resource,
        repository: &RepositoryId,
        bag: &mut Bag,
    ) -> ConnectorResult<Page<Grant>> {
        let (permissions, next) = self
            .client
            .list_user_permissions(
                target(repository),
                self.client.page_size(),
                bag.page_token(),
            )
            .await?;

        let grants = permissions
            .into_iter()
            .filter(|p| is_role(ResourceType::Repository, &p.permission))
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

#[async_trait]
impl ResourceSyncer<Scope> for RepositorySyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Repository
    }

    #[instrument(skip(self, _scope))]
    async fn list(
        &self,
        _scope: &Scope,
        parent: Option<&ResourceId>,
        page_token: &str,
    ) -> ConnectorResult<Page<Resource>> {
        let Some(parent) = parent.filter(|p| p.resource_type == ResourceType::Project) else {
            return Ok(Page::empty());
        };
        let project: ProjectId = parent.resource.parse()?;

        let mut bag = Bag::decode(page_token)?;
        bag.push_if_empty(ResourceType::Repository.as_str());

        let (repositories, next) = self
            .client
            .get_project_repos(
                &project.workspace_id,
                &project.project_id,
                self.client.page_size(),
                bag.page_token(),
            )
            .await?;

        let resources = repositories
            .iter()
            .map(|repository| repository_resource(repository, parent))
            .collect::<ConnectorResult<Vec<_>>>()?;

        Ok(Page::new(resources, bag.next_token(&next)))
    }

    fn entitlements(&self, resource: &Resource) -> Vec<Entitlement> {
        REPOSITORY_ROLES
            .iter()
            .map(|role| {
                Entitlement::permission(
                    resource,
                    role,
                    &[ResourceType::User, ResourceType::UserGroup],
                )
                .with_display_name(format!(
                    "{} Repository {}",
                    resource.display_name,
                    title_case(role)
                ))
                .with_description(format!(
                    "{} access to {} repository in Bitbucket",
                    title_case(role),
                    resource.display_name
                ))
            })
            .collect()
    }

    #[instrument(skip(self, _scope, resource), fields(repository = %resource.id))]
    async fn grants(
        &self,
        _scope: &Scope,
        resource: &Resource,
        page_token: &str,
    ) -> ConnectorResult<Page<Grant>> {
        let repository: RepositoryId = resource.id.resource.parse()?;

        let mut bag = Bag::decode(page_token)?;
        if bag.is_empty() {
            self.emitted.reset(&resource.id).await;
        }
        bag.push_if_empty(ResourceType::Repository.as_str());

        loop {
            match current_phase(&bag)? {
                Some(ResourceType::Repository) => {
                    bag.pop();
                    bag.push(PageState::new(ResourceType::User.as_str()));
                    bag.push(PageState::new(ResourceType::UserGroup.as_str()));
                }
                Some(ResourceType::UserGroup) => {
                    return self.group_grants(resource, &repository, &mut bag).await;
                }
                Some(ResourceType::User) => {
                    return self.user_grants(resource, &repository, &mut bag).await;
                }
                Some(other) => return Err(unexpected_phase("repository", other)),
                None => return Ok(Page::empty()),
            }
        }
    }
}
