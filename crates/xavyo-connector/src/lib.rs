//! # Connector Framework
//!
//! Core abstractions for synchronizing access-control state from external
//! systems into a normalized resource / entitlement / grant model.
//!
//! ## Architecture
//!
//! - [`Connector`] - Base trait: validation and scope resolution
//! - [`SyncOp`] - Enumerate resources, entitlements and grants page by page
//! - [`GrantOp`] - Grant and revoke entitlements
//! - [`ResourceSyncer`] - Per resource type building block of `SyncOp`
//!
//! ## Crate Organization
//!
//! - [`types`] - Resource type and entitlement kind enums
//! - [`error`] - Error taxonomy with transient/permanent classification
//! - [`resource`] - Resource, Entitlement, Grant and Page values
//! - [`pagination`] - Resumable page token stack
//! - [`traits`] - Connector capability traits

pub mod error;
pub mod pagination;
pub mod resource;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::pagination::{Bag, PageState};
    pub use crate::resource::{
        entitlement_id, parse_entitlement_id, Entitlement, Grant, Page, Profile, ProfileValue,
        Resource, ResourceId,
    };
    pub use crate::traits::{Connector, GrantOp, ResourceSyncer, SyncOp};
    pub use crate::types::{EntitlementKind, ResourceType};
}

pub use error::{ConnectorError, ConnectorResult};
pub use traits::{Connector, GrantOp, ResourceSyncer, SyncOp};
