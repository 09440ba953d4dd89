//! Typed Bitbucket endpoints on top of an [`ApiClient`].

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

use crate::client::{ApiClient, QueryParams};
use crate::config::BitbucketConfig;
use crate::error::{BitbucketError, BitbucketResult};
use crate::models::{
    GroupPermission, ListResponse, Project, Repository, UpdatePermissionPayload, User, UserGroup,
    UserPermission, Workspace,
};

/// Extra projection for member listings.
const MEMBER_FIELDS: &[&str] = &["-*.workspace"];
/// Extra projection for project listings.
const PROJECT_FIELDS: &[&str] = &["-*.workspace", "-*.owner"];
/// Extra projection for permission listings.
const PERMISSION_FIELDS: &[&str] = &["-*.*.workspace", "-*.*.owner"];

/// Object whose permissions-config is read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionTarget<'a> {
    Project {
        workspace_id: &'a str,
        project_key: &'a str,
    },
    Repository {
        workspace_id: &'a str,
        repo_id: &'a str,
    },
}

impl PermissionTarget<'_> {
    fn base_segments(&self) -> Vec<&str> {
        match *self {
            PermissionTarget::Project {
                workspace_id,
                project_key,
            } => vec![
                "workspaces",
                workspace_id,
                "projects",
                project_key,
                "permissions-config",
            ],
            PermissionTarget::Repository {
                workspace_id,
                repo_id,
            } => vec!["repositories", workspace_id, repo_id, "permissions-config"],
        }
    }
}

/// Bitbucket API client with one method per endpoint.
#[derive(Clone)]
pub struct BitbucketClient {
    api: Arc<dyn ApiClient>,
    base_url: Url,
    v1_base_url: Url,
    page_size: u32,
}

impl std::fmt::Debug for BitbucketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitbucketClient")
            .field("base_url", &self.base_url.as_str())
            .field("v1_base_url", &self.v1_base_url.as_str())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl BitbucketClient {
    /// Creates a client over `api` using the endpoints in `config`.
    pub fn new(api: Arc<dyn ApiClient>, config: &BitbucketConfig) -> BitbucketResult<Self> {
        Ok(Self {
            api,
            base_url: Url::parse(&config.base_url)?,
            v1_base_url: Url::parse(&config.v1_base_url)?,
            page_size: config.page_size,
        })
    }

    /// Page size for lazy listings.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn join(base: &Url, segments: &[&str]) -> BitbucketResult<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| BitbucketError::Config(format!("base URL cannot be a base: {base}")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn v2(&self, segments: &[&str]) -> BitbucketResult<Url> {
        Self::join(&self.base_url, segments)
    }

    fn v1(&self, segments: &[&str]) -> BitbucketResult<Url> {
        Self::join(&self.v1_base_url, segments)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &QueryParams,
    ) -> BitbucketResult<T> {
        let value = self.api.get(url, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
        params: QueryParams,
    ) -> BitbucketResult<(Vec<T>, String)> {
        let response: ListResponse<T> = self.get_json(url, &params).await?;
        let next = response.next_page();
        Ok((response.values, next))
    }

    /// Identity the credentials belong to (`user` or `team`).
    #[instrument(skip(self))]
    pub async fn get_current_user(&self) -> BitbucketResult<User> {
        self.get_json(self.v2(&["user"])?, &QueryParams::new()).await
    }

    /// One page of the workspaces the identity belongs to.
    #[instrument(skip(self))]
    pub async fn get_workspaces(
        &self,
        page_len: u32,
        page: &str,
    ) -> BitbucketResult<(Vec<Workspace>, String)> {
        self.get_page(
            self.v2(&["workspaces"])?,
            QueryParams::new().with_page(page_len, page),
        )
        .await
    }

    /// Every workspace the identity belongs to, following cursors to the end.
    #[instrument(skip(self))]
    pub async fn get_all_workspaces(&self) -> BitbucketResult<Vec<Workspace>> {
        let mut all = Vec::new();
        let mut page = String::new();

        loop {
            let (workspaces, next) = self.get_workspaces(self.page_size, &page).await?;
            all.extend(workspaces);
            if next.is_empty() {
                break;
            }
            debug!(next_page = %next, fetched = all.len(), "Fetching next workspace page");
            page = next;
        }

        Ok(all)
    }

    #[instrument(skip(self))]
    pub async fn get_workspace(&self, workspace_id: &str) -> BitbucketResult<Workspace> {
        self.get_json(self.v2(&["workspaces", workspace_id])?, &QueryParams::new())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_workspace_members(
        &self,
        workspace_id: &str,
        page_len: u32,
        page: &str,
    ) -> BitbucketResult<(Vec<User>, String)> {
        let (members, next) = self
            .get_page::<crate::models::WorkspaceMember>(
                self.v2(&["workspaces", workspace_id, "members"])?,
                QueryParams::new()
                    .with_page(page_len, page)
                    .with_fields(MEMBER_FIELDS),
            )
            .await?;
        Ok((members.into_iter().map(|m| m.user).collect(), next))
    }

    #[instrument(skip(self))]
    pub async fn get_workspace_projects(
        &self,
        workspace_id: &str,
        page_len: u32,
        page: &str,
    ) -> BitbucketResult<(Vec<Project>, String)> {
        self.get_page(
            self.v2(&["workspaces", workspace_id, "projects"])?,
            QueryParams::new()
                .with_page(page_len, page)
                .with_fields(PROJECT_FIELDS),
        )
        .await
    }

    /// Repositories of one project, filtered upstream by project uuid.
    #[instrument(skip(self))]
    pub async fn get_project_repos(
        &self,
        workspace_id: &str,
        project_id: &str,
        page_len: u32,
        page: &str,
    ) -> BitbucketResult<(Vec<Repository>, String)> {
        self.get_page(
            self.v2(&["repositories", workspace_id])?,
            QueryParams::new()
                .with_page(page_len, page)
                .with_query(format!("project.uuid=\"{project_id}\"")),
        )
        .await
    }

    /// User groups of a workspace (v1, unpaginated).
    #[instrument(skip(self))]
    pub async fn get_workspace_user_groups(
        &self,
        workspace_id: &str,
    ) -> BitbucketResult<Vec<UserGroup>> {
        self.get_json(self.v1(&["groups", workspace_id])?, &QueryParams::default())
            .await
    }

    /// Members of a user group (v1, unpaginated).
    #[instrument(skip(self))]
    pub async fn get_user_group_members(
        &self,
        workspace_id: &str,
        group_slug: &str,
    ) -> BitbucketResult<Vec<User>> {
        self.get_json(
            self.v1(&["groups", workspace_id, group_slug, "members"])?,
            &QueryParams::default(),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn add_user_to_group(
        &self,
        workspace_id: &str,
        group_slug: &str,
        user_id: &str,
    ) -> BitbucketResult<()> {
        let url = self.v1(&["groups", workspace_id, group_slug, "members", user_id])?;
        self.api.put(url, &QueryParams::default(), &json!({})).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_user_from_group(
        &self,
        workspace_id: &str,
        group_slug: &str,
        user_id: &str,
    ) -> BitbucketResult<()> {
        let url = self.v1(&["groups", workspace_id, group_slug, "members", user_id])?;
        self.api.delete(url, &QueryParams::default()).await?;
        Ok(())
    }

    fn permission_url(
        &self,
        target: PermissionTarget<'_>,
        kind: &str,
        principal: Option<&str>,
    ) -> BitbucketResult<Url> {
        let mut segments = target.base_segments();
        segments.push(kind);
        if let Some(p) = principal {
            segments.push(p);
        }
        self.v2(&segments)
    }

    #[instrument(skip(self))]
    pub async fn list_group_permissions(
        &self,
        target: PermissionTarget<'_>,
        page_len: u32,
        page: &str,
    ) -> BitbucketResult<(Vec<GroupPermission>, String)> {
        self.get_page(
            self.permission_url(target, "groups", None)?,
            QueryParams::new()
                .with_page(page_len, page)
                .with_fields(PERMISSION_FIELDS),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_user_permissions(
        &self,
        target: PermissionTarget<'_>,
        page_len: u32,
        page: &str,
    ) -> BitbucketResult<(Vec<UserPermission>, String)> {
        self.get_page(
            self.permission_url(target, "users", None)?,
            QueryParams::new()
                .with_page(page_len, page)
                .with_fields(PERMISSION_FIELDS),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_group_permission(
        &self,
        target: PermissionTarget<'_>,
        group_slug: &str,
    ) -> BitbucketResult<GroupPermission> {
        self.get_json(
            self.permission_url(target, "groups", Some(group_slug))?,
            &QueryParams::new().with_fields(PERMISSION_FIELDS),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_user_permission(
        &self,
        target: PermissionTarget<'_>,
        user_id: &str,
    ) -> BitbucketResult<UserPermission> {
        self.get_json(
            self.permission_url(target, "users", Some(user_id))?,
            &QueryParams::new().with_fields(PERMISSION_FIELDS),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn update_group_permission(
        &self,
        target: PermissionTarget<'_>,
        group_slug: &str,
        permission: &str,
    ) -> BitbucketResult<()> {
        let url = self.permission_url(target, "groups", Some(group_slug))?;
        self.put_permission(url, permission).await
    }

    #[instrument(skip(self))]
    pub async fn update_user_permission(
        &self,
        target: PermissionTarget<'_>,
        user_id: &str,
        permission: &str,
    ) -> BitbucketResult<()> {
        let url = self.permission_url(target, "users", Some(user_id))?;
        self.put_permission(url, permission).await
    }

    #[instrument(skip(self))]
    pub async fn delete_group_permission(
        &self,
        target: PermissionTarget<'_>,
        group_slug: &str,
    ) -> BitbucketResult<()> {
        let url = self.permission_url(target, "groups", Some(group_slug))?;
        self.api.delete(url, &QueryParams::default()).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_user_permission(
        &self,
        target: PermissionTarget<'_>,
        user_id: &str,
    ) -> BitbucketResult<()> {
        let url = self.permission_url(target, "users", Some(user_id))?;
        self.api.delete(url, &QueryParams::default()).await?;
        Ok(())
    }

    async fn put_permission(&self, url: Url, permission: &str) -> BitbucketResult<()> {
        let body: Value = serde_json::to_value(UpdatePermissionPayload { permission })?;
        self.api.put(url, &QueryParams::default(), &body).await?;
        Ok(())
    }
}
