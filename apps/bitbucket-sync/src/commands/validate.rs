//! Validate command - Check credentials and print the resolved scope

use clap::Args;
use tokio_util::sync::CancellationToken;
use xavyo_connector::traits::Connector;

use crate::error::CliResult;

/// Arguments for the validate command
#[derive(Args)]
pub struct ValidateArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the validate command
pub async fn execute(args: ValidateArgs, cancel: CancellationToken) -> CliResult<()> {
    let connector = super::connect(cancel)?;
    let scope = connector.validate().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&scope)?);
        return Ok(());
    }

    println!("Scope: {scope}");
    for workspace_id in scope.workspace_ids() {
        println!("  {workspace_id}");
    }
    Ok(())
}
