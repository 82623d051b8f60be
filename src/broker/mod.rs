pub mod http;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

/// The opaque transport seam. Implementations own the actual network path to
/// a broker; the orchestrator only hands them a topic and payload bytes.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish the payload and wait for the broker's acknowledgement.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// Backend kind. Controls payload encoding only; adding a backend means
/// adding a variant here, not editing the fan-out loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    Gcp,
    Aws,
}

impl BrokerKind {
    /// Wraps the canonical measurement bytes into the payload shape the
    /// backend expects. GCP takes the bytes raw; AWS hands payloads to a
    /// Lambda, which expects JSON, so the bytes go in as a base64 string.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        match self {
            BrokerKind::Gcp => Ok(payload.to_vec()),
            BrokerKind::Aws => {
                let wrapped = serde_json::to_vec(&BASE64.encode(payload))?;
                Ok(wrapped)
            }
        }
    }
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerKind::Gcp => write!(f, "GCP"),
            BrokerKind::Aws => write!(f, "AWS"),
        }
    }
}

/// A named, connected broker backend. Owned by the long-lived process; the
/// orchestrator borrows it per publish call.
#[derive(Clone)]
pub struct BrokerConnection {
    pub name: String,
    pub kind: BrokerKind,
    /// Device identity this connection publishes as. Stamped onto each
    /// measurement before encoding.
    pub device_id: String,
    pub publisher: Arc<dyn Publisher>,
}

impl BrokerConnection {
    pub fn new(
        name: impl Into<String>,
        kind: BrokerKind,
        device_id: impl Into<String>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            device_id: device_id.into(),
            publisher,
        }
    }

    /// Topic this connection's device publishes telemetry to.
    pub fn telemetry_topic(&self) -> String {
        format!("/devices/{}/events", self.device_id)
    }
}

impl fmt::Debug for BrokerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

/// Explicit, owned set of broker connections passed into the orchestrator.
/// There is no process-wide registry; whoever schedules the cycle owns this.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSet {
    connections: HashMap<String, BrokerConnection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection: BrokerConnection) {
        self.connections.insert(connection.name.clone(), connection);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BrokerConnection)> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Build the connection set from the configured broker table. GCP-kind
/// backends authenticate with a cached device JWT; AWS-kind backends assume
/// their configured role through the federated identity exchange.
pub fn build_connections(cfg: &crate::ServiceConfig) -> Result<ConnectionSet> {
    use crate::broker::http::{BridgeAuth, HttpBridge};
    use crate::config::settings::DEFAULT_JWT_TTL_MINUTES;
    use crate::credentials::{CachedJwt, FederatedIdentity};
    use anyhow::anyhow;
    use std::time::Duration;

    let jwt_ttl =
        Duration::from_secs(cfg.jwt_ttl_minutes.unwrap_or(DEFAULT_JWT_TTL_MINUTES) * 60);
    let device_jwt = Arc::new(CachedJwt::new(cfg.device.clone(), jwt_ttl));
    let federated = Arc::new(FederatedIdentity::new());

    let mut set = ConnectionSet::new();
    for (name, broker) in &cfg.brokers {
        let device_id = broker
            .device_id
            .clone()
            .unwrap_or_else(|| cfg.device.device_id.clone());

        let publisher: Arc<dyn Publisher> = match broker.kind {
            BrokerKind::Gcp => Arc::new(HttpBridge::new(
                broker.bridge_url.clone(),
                BridgeAuth::DeviceJwt(device_jwt.clone()),
            )),
            BrokerKind::Aws => {
                let role_arn = broker
                    .role_arn
                    .clone()
                    .ok_or_else(|| anyhow!("aws broker '{}' requires role_arn", name))?;
                let region = broker
                    .region
                    .clone()
                    .ok_or_else(|| anyhow!("aws broker '{}' requires region", name))?;
                Arc::new(HttpBridge::new(
                    broker.bridge_url.clone(),
                    BridgeAuth::Federated {
                        identity: federated.clone(),
                        role_arn,
                        region,
                    },
                ))
            }
        };

        set.insert(BrokerConnection::new(
            name.clone(),
            broker.kind,
            device_id,
            publisher,
        ));
    }

    Ok(set)
}

impl FromIterator<BrokerConnection> for ConnectionSet {
    fn from_iter<T: IntoIterator<Item = BrokerConnection>>(iter: T) -> Self {
        let mut set = Self::new();
        for conn in iter {
            set.insert(conn);
        }
        set
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gcp_payload_is_raw() {
        let payload = b"{\"device_id\":\"a\"}";
        assert_eq!(BrokerKind::Gcp.encode(payload).unwrap(), payload.to_vec());
    }

    #[test]
    fn aws_payload_is_json_wrapped_base64() {
        let payload = b"hello";
        let encoded = BrokerKind::Aws.encode(payload).unwrap();
        let as_str: String = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(BASE64.decode(as_str).unwrap(), payload.to_vec());
    }
}
