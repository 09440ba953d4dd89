//! Normalized access model: resources, entitlements and grants.
//!
//! All three are value objects. They are created fresh on every listing
//! call and carry no identity beyond their id strings.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConnectorError, ConnectorResult};
use crate::types::{EntitlementKind, ResourceType};

/// Separator between segments of composite identifiers.
pub const ID_SEPARATOR: char = ':';

/// Typed reference to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId {
    pub resource_type: ResourceType,
    pub resource: String,
}

impl ResourceId {
    /// Create a new resource id.
    pub fn new(resource_type: ResourceType, resource: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource: resource.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.resource_type, ID_SEPARATOR, self.resource)
    }
}

impl FromStr for ResourceId {
    type Err = ConnectorError;

    /// Parses `type:resource`. The resource part may itself be composite.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, resource) = s.split_once(ID_SEPARATOR).ok_or_else(|| {
            ConnectorError::invalid_argument(format!("invalid resource reference: {s}"))
        })?;
        if resource.is_empty() {
            return Err(ConnectorError::invalid_argument(format!(
                "invalid resource reference: {s}"
            )));
        }
        let resource_type = kind
            .parse::<ResourceType>()
            .map_err(|e| ConnectorError::invalid_argument(e.to_string()))?;
        Ok(Self::new(resource_type, resource))
    }
}

/// Value of a profile attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileValue {
    String(String),
    List(Vec<String>),
}

impl ProfileValue {
    /// Get as a string if this is a single string value.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ProfileValue::String(s) => Some(s),
            ProfileValue::List(_) => None,
        }
    }

    /// Get as strings (works for both single and multi-valued).
    pub fn as_strings(&self) -> Vec<&str> {
        match self {
            ProfileValue::String(s) => vec![s.as_str()],
            ProfileValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

// Lists only become delimited strings at the serialization edge.
impl Serialize for ProfileValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProfileValue::String(s) => serializer.serialize_str(s),
            ProfileValue::List(items) => serializer.serialize_str(&items.join(",")),
        }
    }
}

impl From<String> for ProfileValue {
    fn from(s: String) -> Self {
        ProfileValue::String(s)
    }
}

impl From<&str> for ProfileValue {
    fn from(s: &str) -> Self {
        ProfileValue::String(s.to_string())
    }
}

impl From<Vec<String>> for ProfileValue {
    fn from(items: Vec<String>) -> Self {
        ProfileValue::List(items)
    }
}

/// Open map of type-specific resource attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    attributes: BTreeMap<String, ProfileValue>,
}

impl Profile {
    /// Create a new empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ProfileValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Set an attribute using builder pattern.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ProfileValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Get an attribute value.
    pub fn get(&self, name: &str) -> Option<&ProfileValue> {
        self.attributes.get(name)
    }

    /// Get a single-valued string attribute.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ProfileValue::as_string)
    }

    /// Get a multi-valued string attribute.
    pub fn get_strings(&self, name: &str) -> Option<Vec<&str>> {
        self.get(name).map(ProfileValue::as_strings)
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the profile is empty.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Identified node in the access hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: ResourceId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ResourceId>,
    #[serde(skip_serializing_if = "Profile::is_empty")]
    pub profile: Profile,
}

impl Resource {
    /// Create a resource without parent or profile.
    pub fn new(id: ResourceId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            parent_id: None,
            profile: Profile::new(),
        }
    }

    /// Set the parent resource.
    #[must_use]
    pub fn with_parent(mut self, parent_id: Option<ResourceId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Set the profile.
    #[must_use]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Resource type shortcut.
    pub fn resource_type(&self) -> ResourceType {
        self.id.resource_type
    }
}

/// Build the external id of an entitlement: `type:resource:slug`.
pub fn entitlement_id(resource: &ResourceId, slug: &str) -> String {
    format!("{resource}{ID_SEPARATOR}{slug}")
}

/// Split an entitlement id into its resource and slug.
///
/// The first segment is the resource type, the last the slug, and
/// everything in between the (possibly composite) resource id.
pub fn parse_entitlement_id(id: &str) -> ConnectorResult<(ResourceId, String)> {
    let parts: Vec<&str> = id.split(ID_SEPARATOR).collect();
    if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(ConnectorError::invalid_argument(format!(
            "invalid entitlement id: {id}"
        )));
    }

    let resource_type = parts[0]
        .parse::<ResourceType>()
        .map_err(|e| ConnectorError::invalid_argument(e.to_string()))?;
    let resource = parts[1..parts.len() - 1].join(":");
    let slug = parts[parts.len() - 1].to_string();

    Ok((ResourceId::new(resource_type, resource), slug))
}

/// Capability a resource can grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entitlement {
    pub id: String,
    pub resource: ResourceId,
    pub slug: String,
    pub kind: EntitlementKind,
    pub display_name: String,
    pub description: String,
    pub grantable_to: Vec<ResourceType>,
}

impl Entitlement {
    fn new(
        resource: &Resource,
        slug: &str,
        kind: EntitlementKind,
        grantable_to: &[ResourceType],
    ) -> Self {
        Self {
            id: entitlement_id(&resource.id, slug),
            resource: resource.id.clone(),
            slug: slug.to_string(),
            kind,
            display_name: String::new(),
            description: String::new(),
            grantable_to: grantable_to.to_vec(),
        }
    }

    /// Binary membership entitlement.
    pub fn assignment(resource: &Resource, slug: &str, grantable_to: &[ResourceType]) -> Self {
        Self::new(resource, slug, EntitlementKind::Assignment, grantable_to)
    }

    /// Role entitlement from a mutually exclusive set.
    pub fn permission(resource: &Resource, slug: &str, grantable_to: &[ResourceType]) -> Self {
        Self::new(resource, slug, EntitlementKind::Permission, grantable_to)
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether a principal of the given type may hold this entitlement.
    pub fn is_grantable_to(&self, resource_type: ResourceType) -> bool {
        self.grantable_to.contains(&resource_type)
    }
}

/// Materialized (resource, entitlement, principal) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Grant {
    pub id: String,
    pub entitlement_id: String,
    pub resource: ResourceId,
    pub slug: String,
    pub principal: ResourceId,
}

impl Grant {
    /// Create a grant of `slug` on `resource` to `principal`.
    pub fn new(resource: &ResourceId, slug: &str, principal: ResourceId) -> Self {
        let entitlement_id = entitlement_id(resource, slug);
        Self {
            id: format!("{entitlement_id}{ID_SEPARATOR}{principal}"),
            entitlement_id,
            resource: resource.clone(),
            slug: slug.to_string(),
            principal,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Empty when the listing is exhausted.
    pub next_page_token: String,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: impl Into<String>) -> Self {
        Self {
            items,
            next_page_token: next_page_token.into(),
        }
    }

    /// Terminal empty page.
    pub fn empty() -> Self {
        Self::new(Vec::new(), String::new())
    }

    /// Whether the caller has reached the end of the listing.
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_empty()
    }
}
