//! CLI command implementations

pub mod grant;
pub mod revoke;
pub mod sync;
pub mod validate;

use tokio_util::sync::CancellationToken;
use xavyo_connector::resource::ResourceId;
use xavyo_connector_bitbucket::{BitbucketConfig, BitbucketConnector};

use crate::error::{CliError, CliResult};

/// Connector configured from the environment.
pub(crate) fn connect(cancel: CancellationToken) -> CliResult<BitbucketConnector> {
    let config = BitbucketConfig::from_env()?;
    Ok(BitbucketConnector::with_cancellation(config, cancel)?)
}

/// Parses a `type:id` principal reference.
pub(crate) fn parse_principal(value: &str) -> CliResult<ResourceId> {
    let principal: ResourceId = value
        .parse()
        .map_err(|e| CliError::Validation(format!("principal {value}: {e}")))?;
    if !principal.resource_type.is_principal() {
        return Err(CliError::Validation(format!(
            "principal must be a user or user_group, got {}",
            principal.resource_type
        )));
    }
    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xavyo_connector::types::ResourceType;

    #[test]
    fn test_parse_principal() {
        let group = parse_principal("user_group:w1:devs").unwrap();
        assert_eq!(group.resource_type, ResourceType::UserGroup);
        assert_eq!(group.resource, "w1:devs");

        assert!(parse_principal("user:{u1}").is_ok());
        assert!(parse_principal("project:w1:p1:PRJ").is_err());
        assert!(parse_principal("nobody").is_err());
    }
}
