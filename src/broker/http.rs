use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::broker::Publisher;
use crate::credentials::{CachedJwt, FederatedIdentity};

/// How a bridge request proves the device's identity.
pub enum BridgeAuth {
    /// Bearer token signed with the device's EC key, cached until its safety
    /// margin.
    DeviceJwt(Arc<CachedJwt>),
    /// Short-lived federated session token obtained by role assumption. The
    /// gateway on the other side validates the session and performs the
    /// cloud-side publish.
    Federated {
        identity: Arc<FederatedIdentity>,
        role_arn: String,
        region: String,
    },
}

/// Publishes payloads over an HTTP bridge endpoint: POST `{base_url}{topic}`
/// with the encoded payload as the body. A non-success status counts as a
/// publish error; credential acquisition failure counts as a failure of this
/// backend's attempt.
pub struct HttpBridge {
    base_url: String,
    client: Client,
    auth: BridgeAuth,
}

impl HttpBridge {
    pub fn new(base_url: impl Into<String>, auth: BridgeAuth) -> Self {
        let client = Client::builder()
            .build()
            .expect("failed to build HTTP client");
        Self {
            base_url: base_url.into(),
            client,
            auth,
        }
    }
}

#[async_trait]
impl Publisher for HttpBridge {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let url = format!("{}{}", self.base_url, topic);
        let mut request = self.client.post(&url).body(payload);

        request = match &self.auth {
            BridgeAuth::DeviceJwt(jwt) => request.bearer_auth(jwt.token()?),
            BridgeAuth::Federated {
                identity,
                role_arn,
                region,
            } => {
                let cred = identity.credentials_for_role(role_arn, region).await?;
                request.bearer_auth(cred.session_token)
            }
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("bridge returned {}", response.status()));
        }

        debug!(url, "published to bridge");
        Ok(())
    }
}
