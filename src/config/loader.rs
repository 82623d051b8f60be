use std::fs;
use std::path::Path;

use anyhow::{bail, Result};

use crate::broker::BrokerKind;
use crate::config::settings::ServiceConfig;

/// Load and validate config from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig> {
    let raw = fs::read_to_string(path)?;
    let config: ServiceConfig = serde_yaml::from_str(&raw)?;

    if config.brokers.is_empty() {
        bail!("at least one broker must be configured");
    }

    for (name, broker) in &config.brokers {
        if broker.bridge_url.is_empty() {
            bail!("broker '{}' has an empty bridge_url", name);
        }
        if broker.kind == BrokerKind::Aws {
            if broker.role_arn.as_deref().unwrap_or("").is_empty() {
                bail!("aws broker '{}' requires role_arn", name);
            }
            if broker.region.as_deref().unwrap_or("").is_empty() {
                bail!("aws broker '{}' requires region", name);
            }
        }
    }

    Ok(config)
}
