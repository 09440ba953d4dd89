//! Common test utilities for xavyo-connector-bitbucket integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::io;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::util::SubscriberInitExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xavyo_connector_bitbucket::{
    BitbucketConfig, BitbucketConnector, BitbucketCredentials, RetryConfig,
};

/// Path prefix of the v2 API on the mock server.
pub const V2: &str = "/2.0";
/// Path prefix of the v1 API on the mock server.
pub const V1: &str = "/1.0";

/// Route connector logs to the test harness. `RUST_LOG` filters as usual.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Log lines written while a [`capture_logs`] guard is alive.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Capture this thread's logs until the guard drops.
pub fn capture_logs() -> (DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let guard = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .set_default();
    (guard, logs)
}

/// Connector against `server` with retries disabled.
pub fn connector(server: &MockServer, page_size: u32) -> BitbucketConnector {
    connector_with_workspaces(server, page_size, Vec::new())
}

pub fn connector_with_workspaces(
    server: &MockServer,
    page_size: u32,
    workspaces: Vec<String>,
) -> BitbucketConnector {
    let config = BitbucketConfig::new(BitbucketCredentials::token("test-token"))
        .with_base_urls(
            format!("{}{V2}/", server.uri()),
            format!("{}{V1}/", server.uri()),
        )
        .with_page_size(page_size)
        .with_workspaces(workspaces)
        .with_retry(RetryConfig::disabled());
    BitbucketConnector::new(config).unwrap()
}

/// Test data factory for the authenticated identity.
pub fn create_identity(uuid: &str, kind: &str) -> Value {
    json!({
        "uuid": uuid,
        "display_name": format!("Identity {uuid}"),
        "nickname": uuid,
        "type": kind
    })
}

/// Test data factory for workspaces.
pub fn create_workspace(uuid: &str, slug: &str) -> Value {
    json!({
        "uuid": uuid,
        "slug": slug,
        "name": format!("Workspace {slug}")
    })
}

/// Test data factory for users.
pub fn create_user(uuid: &str, display_name: &str) -> Value {
    json!({
        "uuid": uuid,
        "display_name": display_name,
        "nickname": display_name.to_lowercase().replace(' ', "."),
        "type": "user"
    })
}

/// Test data factory for workspace memberships.
pub fn create_member(uuid: &str, display_name: &str) -> Value {
    json!({ "user": create_user(uuid, display_name) })
}

/// Test data factory for projects.
pub fn create_project(uuid: &str, key: &str, name: &str) -> Value {
    json!({
        "uuid": uuid,
        "key": key,
        "name": name
    })
}

/// Test data factory for repositories.
pub fn create_repository(uuid: &str, workspace: &str, name: &str) -> Value {
    json!({
        "uuid": uuid,
        "name": name,
        "full_name": format!("{workspace}/{name}")
    })
}

/// Test data factory for v1 user groups.
pub fn create_group(slug: &str, name: &str, members: Vec<Value>) -> Value {
    json!({
        "slug": slug,
        "name": name,
        "permission": "read",
        "members": members
    })
}

pub fn create_group_permission(slug: &str, permission: &str) -> Value {
    json!({
        "permission": permission,
        "group": { "slug": slug, "name": slug }
    })
}

pub fn create_user_permission(uuid: &str, permission: &str) -> Value {
    json!({
        "permission": permission,
        "user": create_user(uuid, &format!("User {uuid}"))
    })
}

/// Wraps values in a v2 list response, with a `next` link when `next_page` is set.
pub fn create_list_response(values: Vec<Value>, next_page: Option<&str>) -> Value {
    let mut response = json!({ "values": values });
    if let Some(page) = next_page {
        response["next"] = json!(format!(
            "https://api.bitbucket.org/2.0/next?page={page}"
        ));
    }
    response
}

/// Bitbucket-style error body.
pub fn create_error(message: &str) -> Value {
    json!({ "type": "error", "error": { "message": message } })
}

/// Mounts `GET {V2}/user` answering with the given identity.
pub async fn mount_identity(server: &MockServer, uuid: &str, kind: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{V2}/user")))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_identity(uuid, kind)))
        .mount(server)
        .await;
}

/// Mounts the three probe listings of a workspace, all succeeding.
pub async fn mount_probe_ok(server: &MockServer, workspace_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{V1}/groups/{workspace_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{V2}/workspaces/{workspace_id}/members")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_list_response(vec![], None)),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{V2}/workspaces/{workspace_id}/projects")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_list_response(vec![], None)),
        )
        .mount(server)
        .await;
}
