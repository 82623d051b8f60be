use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::cache::TtlCache;

const METADATA_BASE: &str = "http://metadata.google.internal/computeMetadata/v1";
const METADATA_FLAVOR: &str = "Metadata-Flavor";

/// Validity requested from the role-assumption endpoint.
pub const CREDENTIAL_DURATION_SECS: u64 = 900;

/// Cached credentials expire this many seconds before the credentials
/// themselves do, so a cached credential is never handed out within its own
/// final seconds of validity.
pub const CACHE_HEADROOM_SECS: u64 = 60;

pub const CACHE_TTL: Duration = Duration::from_secs(CREDENTIAL_DURATION_SECS - CACHE_HEADROOM_SECS);

/// Temporary cloud credential triple returned by the role assumption.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken")]
    pub session_token: String,
}

#[derive(Debug, Deserialize)]
struct AssumeRoleResponse {
    #[serde(rename = "AssumeRoleWithWebIdentityResponse")]
    response: AssumeRoleBody,
}

#[derive(Debug, Deserialize)]
struct AssumeRoleBody {
    #[serde(rename = "AssumeRoleWithWebIdentityResult")]
    result: AssumeRoleResult,
}

#[derive(Debug, Deserialize)]
struct AssumeRoleResult {
    #[serde(rename = "Credentials")]
    credentials: Credentials,
}

/// Exchanges the platform's local identity token for temporary credentials on
/// a cloud role, memoizing the result per role ARN. Nothing is cached on
/// failure.
pub struct FederatedIdentity {
    client: Client,
    metadata_base: String,
    sts_base: Option<String>,
    cache: TtlCache<String, Credentials>,
}

impl FederatedIdentity {
    pub fn new() -> Self {
        Self::with_endpoints(METADATA_BASE.to_string(), None)
    }

    /// Endpoint override used by tests; `sts_base` of `None` means the real
    /// regional endpoint.
    pub fn with_endpoints(metadata_base: String, sts_base: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            metadata_base,
            sts_base,
            cache: TtlCache::new(),
        }
    }

    /// Returns credentials for the given role, from cache when possible. On a
    /// miss this performs two metadata-service reads and one role-assumption
    /// call; any failure is propagated and leaves the cache untouched.
    pub async fn credentials_for_role(&self, role_arn: &str, region: &str) -> Result<Credentials> {
        if let Some(cred) = self.cache.get(&role_arn.to_string()) {
            debug!(role_arn, "federated credential cache hit");
            return Ok(cred);
        }

        let identity_token = self.identity_token().await?;
        let session_name = self.session_name().await?;
        let cred = self
            .assume_role(role_arn, region, &session_name, &identity_token)
            .await?;

        self.cache
            .set(role_arn.to_string(), cred.clone(), CACHE_TTL);
        info!(role_arn, session_name = %session_name, "assumed role via web identity");

        Ok(cred)
    }

    /// Fetches an identity token for this instance from the metadata service.
    /// Fails fast when no metadata service is reachable, which is the case
    /// anywhere but a cloud VM or managed runtime.
    async fn identity_token(&self) -> Result<String> {
        let url = format!(
            "{}/instance/service-accounts/default/identity?audience=gcp",
            self.metadata_base
        );
        let response = self
            .client
            .get(&url)
            .header(METADATA_FLAVOR, "Google")
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .context("no metadata service reachable, cannot get an identity token")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "identity token request failed: {}",
                response.status()
            ));
        }

        Ok(response.text().await?.trim().to_string())
    }

    /// Identifier of the environment we run in, used as the role session
    /// name. Prefers the managed-runtime revision env var, else the
    /// instance's hostname from the metadata service.
    async fn session_name(&self) -> Result<String> {
        if let Ok(revision) = std::env::var("K_REVISION") {
            if !revision.is_empty() {
                return Ok(revision);
            }
        }

        let url = format!("{}/instance/hostname", self.metadata_base);
        let response = self
            .client
            .get(&url)
            .header(METADATA_FLAVOR, "Google")
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .context("failed to get hostname from metadata service")?;

        if !response.status().is_success() {
            return Err(anyhow!("hostname request failed: {}", response.status()));
        }

        Ok(response.text().await?.trim().to_string())
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        region: &str,
        session_name: &str,
        identity_token: &str,
    ) -> Result<Credentials> {
        let url = match &self.sts_base {
            Some(base) => base.clone(),
            None => format!("https://sts.{region}.amazonaws.com/"),
        };
        let duration = CREDENTIAL_DURATION_SECS.to_string();
        let params = [
            ("Action", "AssumeRoleWithWebIdentity"),
            ("Version", "2011-06-15"),
            ("RoleArn", role_arn),
            ("RoleSessionName", session_name),
            ("WebIdentityToken", identity_token),
            ("DurationSeconds", duration.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .context("role assumption request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "role assumption failed for {}: {}",
                role_arn,
                response.status()
            ));
        }

        let body: AssumeRoleResponse = response
            .json()
            .await
            .context("failed to parse role assumption response")?;

        Ok(body.response.result.credentials)
    }
}

impl Default for FederatedIdentity {
    fn default() -> Self {
        Self::new()
    }
}
