//! Shared pieces of the multi-phase grant listings.

use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

use xavyo_connector::error::{ConnectorError, ConnectorResult};
use xavyo_connector::pagination::Bag;
use xavyo_connector::resource::{Grant, ResourceId};
use xavyo_connector::types::ResourceType;

/// Resource type named by the current frame of `bag`.
pub(crate) fn current_phase(bag: &Bag) -> ConnectorResult<Option<ResourceType>> {
    bag.current_type()
        .map(|t| {
            t.parse::<ResourceType>()
                .map_err(|e| ConnectorError::invalid_page_token(e.to_string()))
        })
        .transpose()
}

/// Error for a frame that does not belong to the listing.
pub(crate) fn unexpected_phase(listing: &str, phase: ResourceType) -> ConnectorError {
    ConnectorError::invalid_page_token(format!("unexpected {phase} phase in {listing} grants"))
}

/// Position of the page about to be served: its phase and upstream cursor.
pub(crate) fn position(bag: &Bag) -> String {
    format!(
        "{}@{}",
        bag.current_type().unwrap_or_default(),
        bag.page_token()
    )
}

/// (role, principal) pairs already returned per resource.
///
/// A user's permission can be reached through a direct assignment and
/// through a group they belong to; each pair is returned once per
/// enumeration. Every pair remembers the page position that first returned
/// it, so serving that position again yields the same page. An empty page
/// token starts a new enumeration and clears the resource's entries.
#[derive(Debug, Default)]
pub(crate) struct EmittedGrants {
    seen: Mutex<HashMap<ResourceId, HashMap<(String, ResourceId), String>>>,
}

impl EmittedGrants {
    pub(crate) async fn reset(&self, resource: &ResourceId) {
        self.seen.lock().await.remove(resource);
    }

    /// Drop grants first returned at a position other than `position`,
    /// and duplicates within the page. Records the survivors.
    pub(crate) async fn retain_new(&self, position: &str, grants: Vec<Grant>) -> Vec<Grant> {
        let mut seen = self.seen.lock().await;
        let before = grants.len();
        let mut on_page = HashSet::new();

        let fresh: Vec<Grant> = grants
            .into_iter()
            .filter(|g| {
                let key = (g.slug.clone(), g.principal.clone());
                if !on_page.insert(key.clone()) {
                    return false;
                }
                let first_seen = seen
                    .entry(g.resource.clone())
                    .or_default()
                    .entry(key)
                    .or_insert_with(|| position.to_string());
                first_seen == position
            })
            .collect();

        if fresh.len() < before {
            debug!(
                position,
                suppressed = before - fresh.len(),
                "Suppressed grants already returned"
            );
        }
        fresh
    }
}
