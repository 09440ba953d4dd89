//! User resources, listed per workspace.

use async_trait::async_trait;
use tracing::instrument;

use xavyo_connector::error::ConnectorResult;
use xavyo_connector::pagination::Bag;
use xavyo_connector::resource::{Entitlement, Grant, Page, Profile, Resource, ResourceId};
use xavyo_connector::traits::ResourceSyncer;
use xavyo_connector::types::ResourceType;

use crate::api::BitbucketClient;
use crate::models::User;
use crate::scope::Scope;

pub(crate) fn user_resource(user: &User, parent: Option<&ResourceId>) -> Resource {
    let (first_name, last_name) = user.split_name();
    let profile = Profile::new()
        .with("first_name", first_name)
        .with("last_name", last_name)
        .with("login", user.nickname.as_str())
        .with("user_id", user.uuid.as_str());

    Resource::new(
        ResourceId::new(ResourceType::User, user.uuid.as_str()),
        user.display_name.as_str(),
    )
    .with_parent(parent.cloned())
    .with_profile(profile)
}

pub struct UserSyncer {
    client: BitbucketClient,
}

impl UserSyncer {
    pub fn new(client: BitbucketClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceSyncer<Scope> for UserSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::User
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
        bag.push_if_empty(ResourceType::User.as_str());

        let (members, next) = self
            .client
            .get_workspace_members(&parent.resource, self.client.page_size(), bag.page_token())
            .await?;

        let resources = members
            .iter()
            .map(|user| user_resource(user, Some(parent)))
            .collect();

        Ok(Page::new(resources, bag.next_token(&next)))
    }

    fn entitlements(&self, _resource: &Resource) -> Vec<Entitlement> {
        Vec::new()
    }

    async fn grants(
        &self,
        _scope: &Scope,
        _resource: &Resource,
        _page_token: &str,
    ) -> ConnectorResult<Page<Grant>> {
        Ok(Page::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_resource_profile() {
        let user = User {
            uuid: "{u1}".into(),
            display_name: "Grace Hopper".into(),
            nickname: "grace".into(),
            kind: "user".into(),
        };
        let parent = ResourceId::new(ResourceType::Workspace, "{w}");
        let resource = user_resource(&user, Some(&parent));

        assert_eq!(resource.id.to_string(), "user:{u1}");
        assert_eq!(resource.display_name, "Grace Hopper");
        assert_eq!(resource.parent_id, Some(parent));
        assert_eq!(resource.profile.get_string("first_name"), Some("Grace"));
        assert_eq!(resource.profile.get_string("last_name"), Some("Hopper"));
        assert_eq!(resource.profile.get_string("login"), Some("grace"));
        assert_eq!(resource.profile.get_string("user_id"), Some("{u1}"));
    }
}
