//! Revoke command - Take an entitlement away from a principal

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;
use xavyo_connector::resource::{parse_entitlement_id, Grant};
use xavyo_connector::traits::{Connector, GrantOp};

use crate::error::CliResult;

/// Arguments for the revoke command
#[derive(Args)]
pub struct RevokeArgs {
    /// Entitlement id, e.g. `repository:{ws}:{project}:KEY:{repo}:read`
    #[arg(long)]
    pub entitlement: String,

    /// Principal as `user:{id}` or `user_group:{ws}:{slug}`
    #[arg(long)]
    pub principal: String,
}

/// Execute the revoke command
pub async fn execute(args: RevokeArgs, cancel: CancellationToken) -> CliResult<()> {
    let principal = super::parse_principal(&args.principal)?;
    let (resource, slug) = parse_entitlement_id(&args.entitlement)?;
    let grant = Grant::new(&resource, &slug, principal);

    let connector = super::connect(cancel)?;
    let scope = connector.validate().await?;
    connector.revoke(&scope, &grant).await?;

    info!(grant = %grant.id, "Revoked");
    println!("Revoked {} from {}", grant.entitlement_id, grant.principal);
    Ok(())
}
