//! Client façade bound to one configured KMS service
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
use tracing::debug;

use crate::diagnostics;
use crate::discovery::KeyDiscovery;
use crate::error::KmsClientResult;
use crate::password::PasswordCipher;

/// Key lookups and connectivity checks for one service
#[derive(Debug)]
pub struct KmsClient {
    service_name: String,
    discovery: KeyDiscovery,
}

impl KmsClient {
    /// Build from the admin tool's connection map
    pub fn from_configs(
        service_name: &str,
        configs: &HashMap<String, String>,
    ) -> KmsClientResult<Self> {
        let config = KmsClientConfig::from_map(configs)?;
        Ok(Self::new(service_name, config))
    }

    pub fn new(service_name: impl Into<String>, config: KmsClientConfig) -> Self {
        Self::with_discovery(service_name, KeyDiscovery::new(config))
    }

    pub fn with_discovery(service_name: impl Into<String>, discovery: KeyDiscovery) -> Self {
        let service_name = service_name.into();
        debug!(
            service = %service_name,
            provider = %discovery.config().provider,
            "Kms Client created"
        );
        Self {
            service_name,
            discovery,
        }
    }

    /// Decrypt stored passwords with this cipher instead of the environment's master key
    pub fn with_cipher(mut self, cipher: PasswordCipher) -> Self {
        self.discovery = self.discovery.with_cipher(cipher);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn discovery(&self) -> &KeyDiscovery {
        &self.discovery
    }

    /// Autocomplete lookup: names starting with `key_name`, minus `existing`
    pub async fn get_kms_key(
        &self,
        key_name: &str,
        existing: &[String],
    ) -> KmsClientResult<Option<Vec<String>>> {
        self.discovery.get_kms_key(key_name, existing).await
    }

    pub async fn test_connection(&self) -> ResponseData {
        diagnostics::report(&self.service_name, &self.discovery).await
    }
}
