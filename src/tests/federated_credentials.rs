use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serial_test::serial;

use crate::credentials::federated::{
    FederatedIdentity, CACHE_TTL, CREDENTIAL_DURATION_SECS,
};

const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/relay";

fn sts_json() -> serde_json::Value {
    serde_json::json!({
        "AssumeRoleWithWebIdentityResponse": {
            "AssumeRoleWithWebIdentityResult": {
                "Credentials": {
                    "AccessKeyId": "AKIDEXAMPLE",
                    "SecretAccessKey": "secret",
                    "SessionToken": "session-token",
                    "Expiration": 1714567890
                }
            }
        }
    })
}

fn provider_for(server: &MockServer) -> FederatedIdentity {
    FederatedIdentity::with_endpoints(
        server.url("/computeMetadata/v1"),
        Some(server.url("/sts")),
    )
}

#[tokio::test]
#[serial]
async fn exchange_flows_through_metadata_and_sts_then_caches() {
    std::env::set_var("K_REVISION", "relay-rev-7");

    let server = MockServer::start_async().await;
    let identity = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/computeMetadata/v1/instance/service-accounts/default/identity")
                .query_param("audience", "gcp")
                .header("Metadata-Flavor", "Google");
            then.status(200).body("identity-token-abc");
        })
        .await;
    let sts = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/sts")
                .body_includes("AssumeRoleWithWebIdentity")
                .body_includes("relay-rev-7")
                .body_includes("identity-token-abc")
                .body_includes(format!("DurationSeconds={CREDENTIAL_DURATION_SECS}"));
            then.status(200).json_body(sts_json());
        })
        .await;

    let provider = provider_for(&server);

    let cred = provider
        .credentials_for_role(ROLE_ARN, "us-west-2")
        .await
        .unwrap();
    assert_eq!(cred.access_key_id, "AKIDEXAMPLE");
    assert_eq!(cred.secret_access_key, "secret");
    assert_eq!(cred.session_token, "session-token");

    // second lookup is served from cache with no network calls
    let again = provider
        .credentials_for_role(ROLE_ARN, "us-west-2")
        .await
        .unwrap();
    assert_eq!(again.access_key_id, "AKIDEXAMPLE");
    identity.assert_hits_async(1).await;
    sts.assert_hits_async(1).await;

    // cached lifetime leaves headroom below the requested validity window
    assert!(CACHE_TTL.as_secs() < CREDENTIAL_DURATION_SECS);

    std::env::remove_var("K_REVISION");
}

#[tokio::test]
#[serial]
async fn sts_rejection_is_propagated_and_not_cached() {
    std::env::set_var("K_REVISION", "relay-rev-7");

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/computeMetadata/v1/instance/service-accounts/default/identity");
            then.status(200).body("identity-token-abc");
        })
        .await;
    let sts = server
        .mock_async(|when, then| {
            when.method(POST).path("/sts");
            then.status(403).body("AccessDenied");
        })
        .await;

    let provider = provider_for(&server);

    assert!(provider
        .credentials_for_role(ROLE_ARN, "us-west-2")
        .await
        .is_err());
    // a retry goes back to the network; the failure was not cached
    assert!(provider
        .credentials_for_role(ROLE_ARN, "us-west-2")
        .await
        .is_err());
    sts.assert_hits_async(2).await;

    std::env::remove_var("K_REVISION");
}

#[tokio::test]
#[serial]
async fn missing_metadata_service_fails_fast() {
    std::env::set_var("K_REVISION", "relay-rev-7");

    // nothing listens on this address
    let provider = FederatedIdentity::with_endpoints(
        "http://127.0.0.1:9".to_string(),
        Some("http://127.0.0.1:9".to_string()),
    );

    let err = provider
        .credentials_for_role(ROLE_ARN, "us-west-2")
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("metadata service"));

    std::env::remove_var("K_REVISION");
}

#[tokio::test]
#[serial]
async fn session_name_falls_back_to_instance_hostname() {
    std::env::remove_var("K_REVISION");

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/computeMetadata/v1/instance/service-accounts/default/identity");
            then.status(200).body("identity-token-abc");
        })
        .await;
    let hostname = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/computeMetadata/v1/instance/hostname")
                .header("Metadata-Flavor", "Google");
            then.status(200).body("instance-1.c.my-project.internal");
        })
        .await;
    let sts = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/sts")
                .body_includes("instance-1.c.my-project.internal");
            then.status(200).json_body(sts_json());
        })
        .await;

    let provider = provider_for(&server);
    provider
        .credentials_for_role(ROLE_ARN, "us-west-2")
        .await
        .unwrap();

    hostname.assert_hits_async(1).await;
    sts.assert_hits_async(1).await;
}
