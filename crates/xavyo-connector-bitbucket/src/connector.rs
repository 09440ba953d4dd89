//! Bitbucket connector facade.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use xavyo_connector::error::{ConnectorError, ConnectorResult};
use xavyo_connector::resource::{
    parse_entitlement_id, Entitlement, Grant, Page, Resource, ResourceId,
};
use xavyo_connector::traits::{Connector, GrantOp, ResourceSyncer, SyncOp};
use xavyo_connector::types::ResourceType;

use crate::api::BitbucketClient;
use crate::client::{ApiClient, HttpApiClient};
use crate::config::BitbucketConfig;
use crate::ids::{GroupId, ProjectId, RepositoryId};
use crate::project::ProjectSyncer;
use crate::provisioning::GrantMutator;
use crate::repository::RepositorySyncer;
use crate::scope::{Scope, ScopeResolver};
use crate::user::UserSyncer;
use crate::user_group::UserGroupSyncer;
use crate::workspace::WorkspaceSyncer;

/// Bitbucket Cloud connector.
///
/// Implements [`Connector`], [`SyncOp`] and [`GrantOp`]. The [`Scope`]
/// returned by [`Connector::validate`] is passed back into every listing.
pub struct BitbucketConnector {
    config: BitbucketConfig,
    client: BitbucketClient,
    workspaces: WorkspaceSyncer,
    users: UserSyncer,
    user_groups: UserGroupSyncer,
    projects: ProjectSyncer,
    repositories: RepositorySyncer,
    mutator: GrantMutator,
}

impl BitbucketConnector {
    /// Creates a connector talking to Bitbucket over HTTP.
    pub fn new(config: BitbucketConfig) -> ConnectorResult<Self> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Like [`new`](Self::new), aborting in-flight requests when `cancel` fires.
    pub fn with_cancellation(
        config: BitbucketConfig,
        cancel: CancellationToken,
    ) -> ConnectorResult<Self> {
        config.validate().map_err(crate::error::BitbucketError::from)?;
        let api = HttpApiClient::new(&config)?.with_cancellation(cancel);
        Self::with_client(Arc::new(api), config)
    }

    /// Creates a connector over an arbitrary [`ApiClient`].
    pub fn with_client(
        api: Arc<dyn ApiClient>,
        config: BitbucketConfig,
    ) -> ConnectorResult<Self> {
        let client = BitbucketClient::new(api, &config)?;
        debug!(?client, "Created Bitbucket connector");

        Ok(Self {
            workspaces: WorkspaceSyncer::new(client.clone()),
            users: UserSyncer::new(client.clone()),
            user_groups: UserGroupSyncer::new(client.clone()),
            projects: ProjectSyncer::new(client.clone()),
            repositories: RepositorySyncer::new(client.clone()),
            mutator: GrantMutator::new(client.clone()),
            client,
            config,
        })
    }

    pub fn config(&self) -> &BitbucketConfig {
        &self.config
    }

    /// Resource types in the order a full sync walks them.
    pub fn resource_types(&self) -> &'static [ResourceType] {
        &[
            ResourceType::Workspace,
            ResourceType::User,
            ResourceType::UserGroup,
            ResourceType::Project,
            ResourceType::Repository,
        ]
    }

    fn syncer(&self, resource_type: ResourceType) -> &dyn ResourceSyncer<Scope> {
        match resource_type {
            ResourceType::Workspace => &self.workspaces,
            ResourceType::User => &self.users,
            ResourceType::UserGroup => &self.user_groups,
            ResourceType::Project => &self.projects,
            ResourceType::Repository => &self.repositories,
        }
    }

    /// Looks up an entitlement by its external id without calling upstream.
    pub fn resolve_entitlement(&self, entitlement_id: &str) -> ConnectorResult<Entitlement> {
        let (resource_id, slug) = parse_entitlement_id(entitlement_id)?;
        let resource = Resource::new(resource_id.clone(), resource_id.resource.as_str());

        self.syncer(resource_id.resource_type)
            .entitlements(&resource)
            .into_iter()
            .find(|e| e.slug == slug)
            .ok_or(ConnectorError::UnsupportedRole {
                resource_type: resource_id.resource_type,
                role: slug,
            })
    }

    /// Workspace an id lives in; users belong to none.
    fn workspace_of(id: &ResourceId) -> ConnectorResult<Option<String>> {
        let workspace_id = match id.resource_type {
            ResourceType::Workspace => id.resource.clone(),
            ResourceType::User => return Ok(None),
            ResourceType::UserGroup => id.resource.parse::<GroupId>()?.workspace_id,
            ResourceType::Project => id.resource.parse::<ProjectId>()?.workspace_id,
            ResourceType::Repository => id
                .resource
                .parse::<RepositoryId>()?
                .workspace_id()
                .to_string(),
        };
        Ok(Some(workspace_id))
    }

    fn check_in_scope(scope: &Scope, id: &ResourceId) -> ConnectorResult<()> {
        match Self::workspace_of(id)? {
            Some(workspace_id) if !scope.contains(&workspace_id) => {
                Err(ConnectorError::permission_denied(format!(
                    "workspace {workspace_id} is outside the connector scope"
                )))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Connector for BitbucketConnector {
    type Scope = Scope;

    fn display_name(&self) -> &str {
        "Bitbucket"
    }

    #[instrument(skip(self))]
    async fn validate(&self) -> ConnectorResult<Scope> {
        let scope = ScopeResolver::new(&self.client, &self.config.workspaces)
            .resolve()
            .await?;
        info!(%scope, "Validated Bitbucket credentials");
        Ok(scope)
    }
}

#[async_trait]
impl SyncOp for BitbucketConnector {
    #[instrument(skip(self, scope))]
    async fn list_resources(
        &self,
        scope: &Scope,
        resource_type: ResourceType,
        parent: Option<&ResourceId>,
        page_token: &str,
    ) -> ConnectorResult<Page<Resource>> {
        if let Some(parent) = parent {
            Self::check_in_scope(scope, parent)?;
        }
        self.syncer(resource_type)
            .list(scope, parent, page_token)
            .await
    }

    fn list_entitlements(&self, resource: &Resource) -> Vec<Entitlement> {
        self.syncer(resource.resource_type()).entitlements(resource)
    }

    async fn list_grants(
        &self,
        scope: &Scope,
        resource: &Resource,
        page_token: &str,
    ) -> ConnectorResult<Page<Grant>> {
        Self::check_in_scope(scope, &resource.id)?;
        self.syncer(resource.resource_type())
            .grants(scope, resource, page_token)
            .await
    }
}

#[async_trait]
impl GrantOp for BitbucketConnector {
    async fn grant(
        &self,
        scope: &Scope,
        principal: &ResourceId,
        entitlement: &Entitlement,
    ) -> ConnectorResult<()> {
        Self::check_in_scope(scope, &entitlement.resource)?;
        self.mutator
            .grant(principal, &entitlement.resource, &entitlement.slug)
            .await
    }

    async fn revoke(&self, scope: &Scope, grant: &Grant) -> ConnectorResult<()> {
        Self::check_in_scope(scope, &grant.resource)?;
        self.mutator
            .revoke(&grant.principal, &grant.resource, &grant.slug)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BitbucketCredentials;

    fn connector() -> BitbucketConnector {
        BitbucketConnector::with_client(
            Arc::new(crate::testing::Offline),
            BitbucketConfig::new(BitbucketCredentials::token("t")),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_entitlement() {
        let connector = connector();

        let entitlement = connector
            .resolve_entitlement("repository:{w}:{p}:PRJ:{r}:write")
            .unwrap();
        assert_eq!(entitlement.resource.resource, "{w}:{p}:PRJ:{r}");
        assert_eq!(entitlement.slug, "write");

        let err = connector
            .resolve_entitlement("repository:{w}:{p}:PRJ:{r}:create-repo")
            .unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedRole { .. }));

        assert!(connector.resolve_entitlement("workspace:write").is_err());
    }

    #[test]
    fn test_check_in_scope() {
        let scope = Scope::Workspace {
            workspace_id: "w1".into(),
        };
        let denied = |id: ResourceId| {
            BitbucketConnector::check_in_scope(&scope, &id)
                .unwrap_err()
                .is_permission_denied()
        };

        for (resource_type, id) in [
            (ResourceType::Workspace, "w1"),
            (ResourceType::User, "u9"),
            (ResourceType::UserGroup, "w1:devs"),
            (ResourceType::Project, "w1:p1:PRJ"),
            (ResourceType::Repository, "w1:p1:PRJ:r1"),
        ] {
            assert!(
                BitbucketConnector::check_in_scope(&scope, &ResourceId::new(resource_type, id))
                    .is_ok(),
                "{id}"
            );
        }

        assert!(denied(ResourceId::new(ResourceType::Workspace, "w2")));
        assert!(denied(ResourceId::new(ResourceType::UserGroup, "w2:devs")));
        assert!(denied(ResourceId::new(ResourceType::Project, "w2:p1:PRJ")));
        assert!(denied(ResourceId::new(ResourceType::Repository, "w2:p1:PRJ:r1")));

        let err = BitbucketConnector::check_in_scope(
            &scope,
            &ResourceId::new(ResourceType::Project, "w1:p1"),
        )
        .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_out_of_scope_grants_fail_before_upstream() {
        let connector = connector();
        let scope = Scope::Workspace {
            workspace_id: "w1".into(),
        };
        let resource = Resource::new(ResourceId::new(ResourceType::Project, "w2:p1:PRJ"), "Other");
        let entitlement = Entitlement::permission(&resource, "write", &[ResourceType::User]);
        let principal = ResourceId::new(ResourceType::User, "u1");

        // A transport error here would mean the offline client was called.
        let err = connector.list_grants(&scope, &resource, "").await.unwrap_err();
        assert!(err.is_permission_denied(), "{err:?}");
        let err = connector.grant(&scope, &principal, &entitlement).await.unwrap_err();
        assert!(err.is_permission_denied(), "{err:?}");
        let grant = Grant::new(&resource.id, "write", principal);
        let err = connector.revoke(&scope, &grant).await.unwrap_err();
        assert!(err.is_permission_denied(), "{err:?}");
    }

    #[tokio::test]
    async fn test_unsupported_role_fails_before_upstream() {
        let connector = connector();
        let resource = Resource::new(
            ResourceId::new(ResourceType::Repository, "w:p:PRJ:r"),
            "acme/api",
        );
        let entitlement = Entitlement::permission(&resource, "owner", &[ResourceType::User]);

        // The offline client fails every call, so reaching it would surface a transport error.
        let scope = Scope::Workspace {
            workspace_id: "w".into(),
        };
        let err = connector
            .grant(&scope, &ResourceId::new(ResourceType::User, "u1"), &entitlement)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedRole { .. }));
    }
}
