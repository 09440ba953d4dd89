//! Integration tests for grant and revoke.

mod common;

use common::*;
use serde_json::json;
use wiremock::matchers::{any, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xavyo_connector::error::ConnectorError;
use xavyo_connector::resource::{Grant, ResourceId};
use xavyo_connector::traits::GrantOp;
use xavyo_connector::types::ResourceType;
use xavyo_connector_bitbucket::Scope;

const PROJECT_USERS: &str = "/2.0/workspaces/w1/projects/PRJ/permissions-config/users";
const PROJECT_GROUPS: &str = "/2.0/workspaces/w1/projects/PRJ/permissions-config/groups";

fn scope() -> Scope {
    Scope::Workspace {
        workspace_id: "w1".into(),
    }
}

fn user(id: &str) -> ResourceId {
    ResourceId::new(ResourceType::User, id)
}

// =============================================================================
// Permission writes
// =============================================================================

#[tokio::test]
async fn test_grant_project_role_to_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{PROJECT_USERS}/u1")))
        .respond_with(ResponseTemplate::new(404).set_body_json(create_error("not found")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{PROJECT_USERS}/u1")))
        .and(body_json(json!({"permission": "write"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_user_permission("u1", "write")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let connector = connector(&server, 50);
    let entitlement = connector
        .resolve_entitlement("project:w1:p1:PRJ:write")
        .unwrap();

    connector.grant(&scope(), &user("u1"), &entitlement).await.unwrap();
}

#[tokio::test]
async fn test_grant_project_role_to_group_overwrites_existing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{PROJECT_GROUPS}/devs")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_group_permission("devs", "read")),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{PROJECT_GROUPS}/devs")))
        .and(body_json(json!({"permission": "admin"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_group_permission("devs", "admin")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let connector = connector(&server, 50);
    let entitlement = connector
        .resolve_entitlement("project:w1:p1:PRJ:admin")
        .unwrap();
    let group = ResourceId::new(ResourceType::UserGroup, "w1:devs");

    connector.grant(&scope(), &group, &entitlement).await.unwrap();
}

#[tokio::test]
async fn test_unsupported_role_issues_no_write() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let connector = connector(&server, 50);
    // Repositories have no create-repo role.
    let err = connector
        .resolve_entitlement("repository:w1:p1:PRJ:r1:create-repo")
        .unwrap_err();
    assert!(matches!(err, ConnectorError::UnsupportedRole { .. }));

    let grant = Grant::new(
        &ResourceId::new(ResourceType::Project, "w1:p1:PRJ"),
        "owner",
        user("u1"),
    );
    let err = connector.revoke(&scope(), &grant).await.unwrap_err();
    assert!(matches!(err, ConnectorError::UnsupportedRole { .. }));
}

#[tokio::test]
async fn test_revoke_twice_succeeds() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{PROJECT_USERS}/u1")))
        .respond_with(ResponseTemplate::new(404).set_body_json(create_error("not found")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{PROJECT_USERS}/u1")))
        .respond_with(ResponseTemplate::new(404).set_body_json(create_error("not found")))
        .expect(2)
        .mount(&server)
        .await;

    let connector = connector(&server, 50);
    let grant = Grant::new(
        &ResourceId::new(ResourceType::Project, "w1:p1:PRJ"),
        "write",
        user("u1"),
    );

    connector.revoke(&scope(), &grant).await.unwrap();
    connector.revoke(&scope(), &grant).await.unwrap();
}

#[tokio::test]
async fn test_revoke_surfaces_denied_delete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{PROJECT_USERS}/u1")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_user_permission("u1", "write")),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{PROJECT_USERS}/u1")))
        .respond_with(ResponseTemplate::new(403).set_body_json(create_error("forbidden")))
        .mount(&server)
        .await;

    let grant = Grant::new(
        &ResourceId::new(ResourceType::Project, "w1:p1:PRJ"),
        "write",
        user("u1"),
    );
    let err = connector(&server, 50).revoke(&scope(), &grant).await.unwrap_err();

    assert!(err.is_permission_denied());
}

// =============================================================================
// Group membership
// =============================================================================

#[tokio::test]
async fn test_adding_existing_member_is_already_granted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.0/groups/w1/devs/members"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([create_user("u1", "Ada Lovelace")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let connector = connector(&server, 50);
    let entitlement = connector.resolve_entitlement("user_group:w1:devs:member").unwrap();

    let err = connector.grant(&scope(), &user("u1"), &entitlement).await.unwrap_err();
    assert!(matches!(err, ConnectorError::AlreadyGranted { .. }));
}

#[tokio::test]
async fn test_add_and_remove_member() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.0/groups/w1/devs/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/1.0/groups/w1/devs/members/u2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_user("u2", "Grace")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/1.0/groups/w1/devs/members/u2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let connector = connector(&server, 50);
    let entitlement = connector.resolve_entitlement("user_group:w1:devs:member").unwrap();

    connector.grant(&scope(), &user("u2"), &entitlement).await.unwrap();
    connector
        .revoke(&scope(), &Grant::new(&entitlement.resource, "member", user("u2")))
        .await
        .unwrap();
}

// =============================================================================
// Read-only entitlements
// =============================================================================

#[tokio::test]
async fn test_workspace_membership_is_not_provisionable() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let connector = connector(&server, 50);
    let entitlement = connector.resolve_entitlement("workspace:w1:member").unwrap();

    let err = connector.grant(&scope(), &user("u1"), &entitlement).await.unwrap_err();
    assert!(matches!(err, ConnectorError::NotProvisionable { .. }));

    let entitlement = connector
        .resolve_entitlement("project:w1:p1:PRJ:repository")
        .unwrap();
    let err = connector.grant(&scope(), &user("u1"), &entitlement).await.unwrap_err();
    assert!(matches!(err, ConnectorError::NotProvisionable { .. }));
}

// =============================================================================
// Scope
// =============================================================================

#[tokio::test]
async fn test_writes_outside_scope_are_denied() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let connector = connector(&server, 50);
    let entitlement = connector
        .resolve_entitlement("project:w2:p1:PRJ:write")
        .unwrap();

    let err = connector.grant(&scope(), &user("u1"), &entitlement).await.unwrap_err();
    assert!(err.is_permission_denied(), "{err:?}");

    let grant = Grant::new(&entitlement.resource, "write", user("u1"));
    let err = connector.revoke(&scope(), &grant).await.unwrap_err();
    assert!(err.is_permission_denied(), "{err:?}");
}
