//! Connector Framework traits
//!
//! Capability-based trait definitions. A connector resolves its scope once
//! in [`Connector::validate`]; every later call receives that scope as an
//! explicit argument.

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::resource::{Entitlement, Grant, Page, Resource, ResourceId};
use crate::types::ResourceType;

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Set of tenants the connector may operate over once validated.
    type Scope: Send + Sync;

    /// Get the display name for this connector instance.
    fn display_name(&self) -> &str;

    /// Check credentials and resolve the scope.
    ///
    /// Must succeed before any sync. Returns a single descriptive error
    /// when no usable scope can be established.
    async fn validate(&self) -> ConnectorResult<Self::Scope>;
}

/// Per resource type listing and entitlement resolution.
#[async_trait]
pub trait ResourceSyncer<S: Sync>: Send + Sync {
    /// Resource type this syncer enumerates.
    fn resource_type(&self) -> ResourceType;

    /// List one page of resources under `parent`.
    async fn list(
        &self,
        scope: &S,
        parent: Option<&ResourceId>,
        page_token: &str,
    ) -> ConnectorResult<Page<Resource>>;

    /// Fixed entitlement vocabulary of a resource. No upstream call.
    fn entitlements(&self, resource: &Resource) -> Vec<Entitlement>;

    /// List one page of grants held on `resource`.
    async fn grants(
        &self,
        scope: &S,
        resource: &Resource,
        page_token: &str,
    ) -> ConnectorResult<Page<Grant>>;
}

/// Capability for reading the access graph.
#[async_trait]
pub trait SyncOp: Connector {
    async fn list_resources(
        &self,
        scope: &Self::Scope,
        resource_type: ResourceType,
        parent: Option<&ResourceId>,
        page_token: &str,
    ) -> ConnectorResult<Page<Resource>>;

    fn list_entitlements(&self, resource: &Resource) -> Vec<Entitlement>;

    async fn list_grants(
        &self,
        scope: &Self::Scope,
        resource: &Resource,
        page_token: &str,
    ) -> ConnectorResult<Page<Grant>>;
}

/// Capability for changing access in the target system.
#[async_trait]
pub trait GrantOp: Connector {
    /// Give `principal` the entitlement. Fails when the entitlement's
    /// resource lies outside `scope`.
    async fn grant(
        &self,
        scope: &Self::Scope,
        principal: &ResourceId,
        entitlement: &Entitlement,
    ) -> ConnectorResult<()>;

    /// Take a previously emitted grant away.
    async fn revoke(&self, scope: &Self::Scope, grant: &Grant) -> ConnectorResult<()>;
}
