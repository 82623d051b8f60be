use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::broker::BrokerKind;
use crate::credentials::DeviceConfig;

pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_JWT_TTL_MINUTES: u64 = 60;

/// ================================
/// Service-wide configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Identity of the device this process runs as.
    pub device: DeviceConfig,
    /// Directory holding measurements that failed to publish.
    pub pending_dir: PathBuf,
    pub publish_timeout_seconds: Option<u64>,
    pub jwt_ttl_minutes: Option<u64>,
    /// Named broker backends to fan out to.
    pub brokers: HashMap<String, BrokerConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    pub kind: BrokerKind,
    /// HTTP bridge endpoint the payload is POSTed to.
    pub bridge_url: String,
    /// Device this connection publishes as; defaults to the service device.
    pub device_id: Option<String>,
    /// Role to assume for federated backends. Required when kind is aws.
    pub role_arn: Option<String>,
    pub region: Option<String>,
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}
