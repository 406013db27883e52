//! Connectivity test for the admin caller
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use kms_lookup_config::KmsClientConfig;
use kms_lookup_types::ResponseData;
use std::collections::HashMap;
use tracing::{error, info};

use crate::discovery::KeyDiscovery;
use crate::error::{KmsClientResult, ADMIN_GUIDANCE};
use crate::outcome::{DiscoveryOutcome, KeyNameMatch};

pub const SUCCESS_MESSAGE: &str = "TestConnection Successful";

pub const FAILURE_MESSAGE: &str = "Unable to retrieve any Kms Key using given URL.";

/// Validate the configuration, then report whether any key list comes back
///
/// Only configuration problems are returned as errors, and they are raised
/// before any request is made. Every discovery outcome becomes a report.
pub async fn test_connection(
    service_name: &str,
    configs: &HashMap<String, String>,
) -> KmsClientResult<ResponseData> {
    let config = KmsClientConfig::from_map(configs)?;
    let discovery = KeyDiscovery::new(config);
    Ok(report(service_name, &discovery).await)
}

/// Run an unfiltered discovery and fold the outcome into a report
pub async fn report(service_name: &str, discovery: &KeyDiscovery) -> ResponseData {
    match discovery.discover(&KeyNameMatch::new()).await {
        DiscoveryOutcome::Keys(keys) => {
            info!(service = service_name, count = keys.len(), "TestConnection Successful");
            ResponseData::success(SUCCESS_MESSAGE)
        }
        DiscoveryOutcome::Failed(failure) => {
            error!(
                service = service_name,
                kind = ?failure.kind,
                reason = %failure.message,
                detail = failure.detail.as_deref().unwrap_or_default(),
                "Unable to retrieve any Kms Key"
            );
            ResponseData::failure(
                FAILURE_MESSAGE,
                format!("{}{}", FAILURE_MESSAGE, ADMIN_GUIDANCE),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KmsClientError;

    #[tokio::test]
    async fn test_empty_configuration_is_an_error() {
        let err = test_connection("kms_dev", &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, KmsClientError::Configuration { .. }));
        assert!(err.to_string().contains("ConfigMap is empty"));
    }

    #[tokio::test]
    async fn test_unresolvable_provider_is_reported() {
        let mut configs = HashMap::new();
        configs.insert("provider".to_string(), "kms://nohost".to_string());
        configs.insert("username".to_string(), "alice".to_string());

        let data = test_connection("kms_dev", &configs).await.unwrap();
        assert!(!data.connectivity_status);
        assert_eq!(data.message, FAILURE_MESSAGE);
        assert!(data.description.ends_with(ADMIN_GUIDANCE));
    }
}
