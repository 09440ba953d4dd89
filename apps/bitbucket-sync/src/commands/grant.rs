//! Grant command - Give a principal an entitlement

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;
use xavyo_connector::traits::{Connector, GrantOp};

use crate::error::CliResult;

/// Arguments for the grant command
#[derive(Args)]
pub struct GrantArgs {
    /// Entitlement id, e.g. `project:{ws}:{project}:KEY:write`
    #[arg(long)]
    pub entitlement: String,

    /// Principal as `user:{id}` or `user_group:{ws}:{slug}`
    #[arg(long)]
    pub principal: String,
}

/// Execute the grant command
pub async fn execute(args: GrantArgs, cancel: CancellationToken) -> CliResult<()> {
    let principal = super::parse_principal(&args.principal)?;
    let connector = super::connect(cancel)?;
    let entitlement = connector.resolve_entitlement(&args.entitlement)?;

    let scope = connector.validate().await?;
    connector.grant(&scope, &principal, &entitlement).await?;

    info!(entitlement = %entitlement.id, principal = %principal, "Granted");
    println!("Granted {} to {}", entitlement.id, principal);
    Ok(())
}
