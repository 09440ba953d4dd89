//! Fixed entitlement vocabularies per resource type.

use xavyo_connector::types::ResourceType;

pub const ROLE_NONE: &str = "none";
pub const ROLE_READ: &str = "read";
pub const ROLE_WRITE: &str = "write";
pub const ROLE_CREATE_REPO: &str = "create-repo";
pub const ROLE_ADMIN: &str = "admin";

/// Assignment slug for workspace and group membership.
pub const MEMBER_ENTITLEMENT: &str = "member";
/// Assignment slug linking a project to its repositories.
pub const REPOSITORY_ENTITLEMENT: &str = "repository";

pub const PROJECT_ROLES: &[&str] = &[ROLE_READ, ROLE_WRITE, ROLE_CREATE_REPO, ROLE_ADMIN];
pub const REPOSITORY_ROLES: &[&str] = &[ROLE_READ, ROLE_WRITE, ROLE_ADMIN];

/// Permission roles a resource type exposes. Empty for types without roles.
pub fn roles_for(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Project => PROJECT_ROLES,
        ResourceType::Repository => REPOSITORY_ROLES,
        ResourceType::Workspace | ResourceType::UserGroup | ResourceType::User => &[],
    }
}

/// Assignment slugs a resource type exposes.
pub fn assignments_for(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Workspace | ResourceType::UserGroup => &[MEMBER_ENTITLEMENT],
        ResourceType::Project => &[REPOSITORY_ENTITLEMENT],
        ResourceType::Repository | ResourceType::User => &[],
    }
}

pub fn is_role(resource_type: ResourceType, role: &str) -> bool {
    roles_for(resource_type).contains(&role)
}

/// Whether `slug` names any entitlement of the resource type.
pub fn is_known_slug(resource_type: ResourceType, slug: &str) -> bool {
    is_role(resource_type, slug) || assignments_for(resource_type).contains(&slug)
}

/// Principal types that may hold `slug` on a resource of the given type.
pub fn grantable_to(resource_type: ResourceType, slug: &str) -> &'static [ResourceType] {
    if is_role(resource_type, slug) {
        return &[ResourceType::User, ResourceType::UserGroup];
    }
    match (resource_type, slug) {
        (ResourceType::Workspace | ResourceType::UserGroup, MEMBER_ENTITLEMENT) => {
            &[ResourceType::User]
        }
        (ResourceType::Project, REPOSITORY_ENTITLEMENT) => &[ResourceType::Repository],
        _ => &[],
    }
}

/// Whether Bitbucket offers an endpoint to change `slug` on the resource type.
pub fn is_provisionable(resource_type: ResourceType, slug: &str) -> bool {
    match resource_type {
        ResourceType::UserGroup => slug == MEMBER_ENTITLEMENT,
        ResourceType::Project | ResourceType::Repository => is_role(resource_type, slug),
        ResourceType::Workspace | ResourceType::User => false,
    }
}

/// Upper-cases the first letter of a role for display.
pub fn title_case(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabularies() {
        assert_eq!(roles_for(ResourceType::Project).len(), 4);
        assert!(is_role(ResourceType::Project, "create-repo"));
        assert!(!is_role(ResourceType::Repository, "create-repo"));
        assert!(!is_role(ResourceType::Repository, ROLE_NONE));
        assert!(roles_for(ResourceType::Workspace).is_empty());
    }

    #[test]
    fn test_known_slugs() {
        assert!(is_known_slug(ResourceType::Workspace, "member"));
        assert!(is_known_slug(ResourceType::Project, "repository"));
        assert!(is_known_slug(ResourceType::Project, "admin"));
        assert!(!is_known_slug(ResourceType::UserGroup, "admin"));
        assert!(!is_known_slug(ResourceType::User, "member"));
    }

    #[test]
    fn test_grantable_to() {
        assert_eq!(
            grantable_to(ResourceType::Project, "write"),
            &[ResourceType::User, ResourceType::UserGroup]
        );
        assert_eq!(
            grantable_to(ResourceType::Workspace, "member"),
            &[ResourceType::User]
        );
        assert_eq!(
            grantable_to(ResourceType::Project, "repository"),
            &[ResourceType::Repository]
        );
        assert!(grantable_to(ResourceType::Repository, "create-repo").is_empty());
    }

    #[test]
    fn test_provisionable() {
        assert!(is_provisionable(ResourceType::UserGroup, "member"));
        assert!(is_provisionable(ResourceType::Repository, "admin"));
        assert!(!is_provisionable(ResourceType::Workspace, "member"));
        assert!(!is_provisionable(ResourceType::Project, "repository"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("create-repo"), "Create-repo");
        assert_eq!(title_case("read"), "Read");
        assert_eq!(title_case(""), "");
    }
}
