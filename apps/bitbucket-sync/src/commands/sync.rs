//! Sync command - Walk every resource, entitlement and grant in scope

use clap::Args;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use xavyo_connector::resource::{Entitlement, Grant, Resource, ResourceId};
use xavyo_connector::traits::{Connector, SyncOp};
use xavyo_connector::types::ResourceType;
use xavyo_connector_bitbucket::{BitbucketConnector, Scope};

use crate::error::CliResult;

/// Arguments for the sync command
#[derive(Args)]
pub struct SyncArgs {
    /// Write one JSON object per line instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Skip grant listings
    #[arg(long)]
    pub no_grants: bool,
}

/// One line of JSON output.
#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    Resource(&'a Resource),
    Entitlement(&'a Entitlement),
    Grant(&'a Grant),
}

#[derive(Default)]
struct Counts {
    resources: usize,
    entitlements: usize,
    grants: usize,
}

/// Child listings below a resource of the given type.
fn children(resource_type: ResourceType) -> &'static [ResourceType] {
    match resource_type {
        ResourceType::Workspace => &[
            ResourceType::User,
            ResourceType::UserGroup,
            ResourceType::Project,
        ],
        ResourceType::Project => &[ResourceType::Repository],
        ResourceType::Repository | ResourceType::UserGroup | ResourceType::User => &[],
    }
}

struct Walker<'a> {
    connector: &'a BitbucketConnector,
    scope: &'a Scope,
    args: &'a SyncArgs,
    out: std::io::StdoutLock<'static>,
    counts: BTreeMap<ResourceType, Counts>,
}

impl Walker<'_> {
    fn emit(&mut self, record: &Record<'_>) -> CliResult<()> {
        if self.args.json {
            serde_json::to_writer(&mut self.out, record)?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// Lists every page of `resource_type` below `parent`.
    async fn list_all(
        &mut self,
        resource_type: ResourceType,
        parent: Option<&ResourceId>,
    ) -> CliResult<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut token = String::new();
        loop {
            let page = self
                .connector
                .list_resources(self.scope, resource_type, parent, &token)
                .await?;
            resources.extend(page.items);
            if page.next_page_token.is_empty() {
                break;
            }
            token = page.next_page_token;
        }
        debug!(%resource_type, count = resources.len(), "Listed resources");
        Ok(resources)
    }

    async fn visit(&mut self, resource: &Resource) -> CliResult<()> {
        self.emit(&Record::Resource(resource))?;

        let entitlements = self.connector.list_entitlements(resource);
        for entitlement in &entitlements {
            self.emit(&Record::Entitlement(entitlement))?;
        }

        let mut grants = 0;
        if !self.args.no_grants {
            let mut token = String::new();
            loop {
                let page = self
                    .connector
                    .list_grants(self.scope, resource, &token)
                    .await?;
                for grant in &page.items {
                    self.emit(&Record::Grant(grant))?;
                }
                grants += page.items.len();
                if page.next_page_token.is_empty() {
                    break;
                }
                token = page.next_page_token;
            }
        }

        let counts = self.counts.entry(resource.resource_type()).or_default();
        counts.resources += 1;
        counts.entitlements += entitlements.len();
        counts.grants += grants;
        Ok(())
    }

    async fn run(&mut self) -> CliResult<()> {
        let mut pending: VecDeque<(ResourceType, Option<ResourceId>)> =
            VecDeque::from([(ResourceType::Workspace, None)]);

        while let Some((resource_type, parent)) = pending.pop_front() {
            for resource in self.list_all(resource_type, parent.as_ref()).await? {
                self.visit(&resource).await?;
                for child in children(resource_type) {
                    pending.push_back((*child, Some(resource.id.clone())));
                }
            }
        }
        Ok(())
    }
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, cancel: CancellationToken) -> CliResult<()> {
    let connector = super::connect(cancel)?;
    let scope = connector.validate().await?;
    info!(%scope, "Starting sync");

    let mut walker = Walker {
        connector: &connector,
        scope: &scope,
        args: &args,
        out: std::io::stdout().lock(),
        counts: BTreeMap::new(),
    };
    walker.run().await?;
    walker.out.flush()?;
    let counts = walker.counts;

    if !args.json {
        println!("Scope: {scope}");
        println!(
            "{:<12} {:>10} {:>13} {:>8}",
            "TYPE", "RESOURCES", "ENTITLEMENTS", "GRANTS"
        );
        for (resource_type, counts) in &counts {
            println!(
                "{:<12} {:>10} {:>13} {:>8}",
                resource_type.as_str(),
                counts.resources,
                counts.entitlements,
                counts.grants
            );
        }
    }
    Ok(())
}
