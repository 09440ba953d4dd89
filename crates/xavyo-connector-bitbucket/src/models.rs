//! Bitbucket API payloads.

use serde::{Deserialize, Serialize};
use url::Url;

/// Paginated v2 list response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> ListResponse<T> {
    /// Upstream cursor for the next page: the `page` parameter of `next`.
    ///
    /// Empty when there is no next page or the link cannot be parsed.
    pub fn next_page(&self) -> String {
        self.next
            .as_deref()
            .and_then(|next| Url::parse(next).ok())
            .and_then(|url| {
                url.query_pairs()
                    .find(|(k, _)| k == "page")
                    .map(|(_, v)| v.into_owned())
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    pub uuid: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct User {
    pub uuid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub nickname: String,
    /// `user` for accounts, `team` for workspace-scoped credentials.
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl User {
    /// First and last name split on the first space of the display name.
    pub fn split_name(&self) -> (String, String) {
        match self.display_name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (self.display_name.clone(), String::new()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceMember {
    pub user: User,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub uuid: String,
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Repository {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
}

/// v1 user group.
#[derive(Debug, Clone, Deserialize)]
pub struct UserGroup {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub members: Vec<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupRef {
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

/// Direct permission of a group on a project or repository.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupPermission {
    pub permission: String,
    pub group: GroupRef,
}

/// Direct permission of a user on a project or repository.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPermission {
    pub permission: String,
    pub user: User,
}

/// Body of permission PUT requests.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePermissionPayload<'a> {
    pub permission: &'a str,
}
