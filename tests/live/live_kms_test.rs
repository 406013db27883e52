//! Live tests against a running KMS
//!
//! These tests require:
//! - A reachable KMS, configured through KMS_LOOKUP_PROVIDER
//! - KMS_LOOKUP_USERNAME (simple auth) or Kerberos settings
//!   (KMS_LOOKUP_AUTHTYPE=kerberos plus RANGERPRINCIPAL/RANGERKEYTAB)

use kms_client::{KeyNameMatch, KmsClient};
use kms_lookup_config::{env_map, KmsClientConfig};
use kms_lookup_logging::init_console_logging;
use std::time::Duration;

fn live_client() -> KmsClient {
    init_console_logging("kms-lookup-tests", "debug");
    let config = KmsClientConfig::from_env().expect("KMS_LOOKUP_* variables must be set");
    KmsClient::new("kms_live", config)
}

#[tokio::test]
#[ignore] // Requires a KMS
async fn test_live_connection() {
    let client = live_client();

    let report = client.test_connection().await;

    assert!(report.connectivity_status, "{}", report.description);
    assert_eq!(report.message, "TestConnection Successful");
}

#[tokio::test]
#[ignore] // Requires a KMS
async fn test_live_prefix_lookup_is_consistent() {
    let client = live_client();

    let all = client
        .get_kms_key("", &[])
        .await
        .expect("discovery failed")
        .expect("no key list returned");

    let Some(first) = all.first() else {
        return;
    };
    let prefix: String = first.chars().take(1).collect();

    let filtered = client
        .get_kms_key(&prefix, &[first.clone()])
        .await
        .expect("discovery failed")
        .expect("no key list returned");

    assert!(filtered.iter().all(|k| k.starts_with(&prefix)));
    assert!(!filtered.contains(first));
}

#[tokio::test]
#[ignore] // Requires a KMS
async fn test_live_discovery_within_timeout() {
    let client = live_client();

    let outcome = client
        .discovery()
        .discover_with_timeout(&KeyNameMatch::new(), Duration::from_secs(60))
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.failure());
}

#[tokio::test]
#[ignore] // Requires a KMS
async fn test_live_wrong_user_is_rejected() {
    let mut configs = env_map().expect("environment readable");
    configs.insert("authtype".to_string(), "simple".to_string());
    configs.insert("username".to_string(), "no-such-user-for-kms-tests".to_string());

    let client = KmsClient::from_configs("kms_live", &configs).expect("valid configuration");
    let report = client.test_connection().await;

    // An ACL-enforcing KMS refuses unknown users; an open one lists keys
    if !report.connectivity_status {
        assert!(report.description.contains("Check the admin server log"));
    }
}
