//! Key discovery orchestrator
//!
//! One call resolves the mirrors, establishes the caller's identity once,
//! and then walks the mirrors strictly in order. Each attempt is folded
//! into an [`Attempt`]: a success or a fatal failure ends the call; a
//! retryable failure moves on to the next mirror.
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
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::credentials::{establish, CredentialContext, LocalLogin, QuerySuffix, SecureLogin};
use crate::endpoint::resolve_endpoints;
use crate::error::{KmsClientError, KmsClientResult};
use crate::outcome::{Attempt, DiscoveryFailure, DiscoveryOutcome, FailureKind, KeyNameMatch};
use crate::password::PasswordCipher;
use crate::transport::{HttpTransport, KeyNamesTransport, TransportResponse};

/// Path of the key-names resource under a KMS base URL
pub const KEY_NAMES_PATH: &str = "v1/keys/names";

/// `<base>/v1/keys/names?<name>=<value>`
pub fn request_url(base: &str, query: &QuerySuffix) -> KmsClientResult<Url> {
    let separator = if base.ends_with('/') { "" } else { "/" };
    let mut url = Url::parse(&format!("{}{}{}", base, separator, KEY_NAMES_PATH))
        .map_err(|e| KmsClientError::InvalidLocation(format!("{}: {}", base, e)))?;
    url.query_pairs_mut().append_pair(query.name(), query.value());
    Ok(url)
}

fn call_failed(url: &Url) -> String {
    format!("Exception while getting Kms Key List. URL : {}", url)
}

/// Map one response onto the failover decision
pub fn classify(url: &Url, response: TransportResponse, criteria: &KeyNameMatch) -> Attempt {
    match response.status {
        200 => match serde_json::from_str::<Option<Vec<String>>>(&response.body) {
            Ok(Some(keys)) => Attempt::Success(criteria.apply(keys)),
            Ok(None) => Attempt::Retryable(
                DiscoveryFailure::new(FailureKind::Soft, format!("No key list returned by {}", url))
                    .with_status(200),
            ),
            Err(e) => Attempt::Retryable(
                DiscoveryFailure::new(FailureKind::Transport, call_failed(url))
                    .with_detail(e.to_string())
                    .with_status(200),
            ),
        },
        status @ (401 | 403) => {
            let message = if response.body.trim().is_empty() {
                format!("HTTP {} from {}", status, url)
            } else {
                response.body
            };
            Attempt::Fatal(
                DiscoveryFailure::new(FailureKind::Authorization, message).with_status(status),
            )
        }
        status => Attempt::Retryable(
            DiscoveryFailure::new(
                FailureKind::Soft,
                format!("Unable to retrieve key names from {}: HTTP {}", url, status),
            )
            .with_detail(response.body)
            .with_status(status),
        ),
    }
}

/// Discovers key names for one configured KMS
pub struct KeyDiscovery {
    config: KmsClientConfig,
    login: Arc<dyn SecureLogin>,
    transport: Arc<dyn KeyNamesTransport>,
    cipher: Option<PasswordCipher>,
}

impl KeyDiscovery {
    /// Local login and reqwest transport
    ///
    /// Without [`KeyDiscovery::with_cipher`], a password login reads the
    /// master key from the environment when it needs it.
    pub fn new(config: KmsClientConfig) -> Self {
        let transport = HttpTransport::with_timeout_secs(config.timeout_seconds);
        Self {
            config,
            login: Arc::new(LocalLogin),
            transport: Arc::new(transport),
            cipher: None,
        }
    }

    pub fn with_login(mut self, login: Arc<dyn SecureLogin>) -> Self {
        self.login = login;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn KeyNamesTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_cipher(mut self, cipher: PasswordCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn config(&self) -> &KmsClientConfig {
        &self.config
    }

    pub async fn discover(&self, criteria: &KeyNameMatch) -> DiscoveryOutcome {
        let call_id = Uuid::new_v4();
        let span = info_span!(
            "kms_discovery",
            call_id = %call_id,
            provider = %self.config.provider,
            endpoints = tracing::field::Empty,
        );
        self.run(criteria).instrument(span).await
    }

    /// Drops the in-flight request when `limit` expires
    pub async fn discover_with_timeout(
        &self,
        criteria: &KeyNameMatch,
        limit: Duration,
    ) -> DiscoveryOutcome {
        match tokio::time::timeout(limit, self.discover(criteria)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    provider = %self.config.provider,
                    timeout_ms = limit.as_millis() as u64,
                    "Key discovery timed out"
                );
                DiscoveryOutcome::Failed(DiscoveryFailure::new(
                    FailureKind::Transport,
                    format!("Key discovery timed out after {:?}", limit),
                ))
            }
        }
    }

    /// Key names starting with `key_name`, minus `existing`
    pub async fn get_kms_key(
        &self,
        key_name: &str,
        existing: &[String],
    ) -> KmsClientResult<Option<Vec<String>>> {
        let criteria = KeyNameMatch::new()
            .with_prefix(key_name.trim())
            .excluding(existing.iter().cloned());

        let keys = self.discover(&criteria).await.into_result()?;
        if let Some(keys) = &keys {
            debug!(count = keys.len(), "Returning list of Kms Keys");
        }
        Ok(keys)
    }

    async fn run(&self, criteria: &KeyNameMatch) -> DiscoveryOutcome {
        let endpoints = match resolve_endpoints(&self.config.provider) {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!(error = %e, "No KMS endpoint to try");
                let failure = DiscoveryFailure::new(FailureKind::Soft, e.to_string());
                return DiscoveryOutcome::Failed(failure);
            }
        };
        Span::current().record("endpoints", endpoints.len());

        let login = self.login.as_ref();
        let context = match establish(&self.config, login, self.cipher.as_ref()).await {
            Ok(context) => context,
            Err(e) => {
                error!(error = %e, "Unable to establish credentials");
                let failure = DiscoveryFailure::new(FailureKind::Credential, e.to_string());
                return DiscoveryOutcome::Failed(failure);
            }
        };

        let total = endpoints.len();
        let mut last_failure = None;

        for (index, base) in endpoints.iter().enumerate() {
            let is_last = index + 1 == total;

            match self.attempt(base, &context, criteria).await {
                Attempt::Success(keys) => {
                    info!(
                        endpoint = %base,
                        attempt = index + 1,
                        count = keys.len(),
                        "Key names retrieved"
                    );
                    return DiscoveryOutcome::Keys(keys);
                }
                Attempt::Fatal(failure) => {
                    error!(
                        endpoint = %base,
                        status = ?failure.status,
                        "Authorization failed, not trying other endpoints"
                    );
                    return DiscoveryOutcome::Failed(failure);
                }
                Attempt::Retryable(failure) => {
                    if is_last && failure.kind == FailureKind::Transport {
                        return DiscoveryOutcome::Failed(failure);
                    }
                    info!(
                        endpoint = %base,
                        attempt = index + 1,
                        reason = %failure.message,
                        "Endpoint failed, trying next"
                    );
                    last_failure = Some(failure);
                }
            }
        }

        DiscoveryOutcome::Failed(last_failure.unwrap_or_else(|| {
            DiscoveryFailure::new(FailureKind::Soft, "No KMS endpoint answered")
        }))
    }

    async fn attempt(
        &self,
        base: &str,
        context: &CredentialContext,
        criteria: &KeyNameMatch,
    ) -> Attempt {
        let url = match request_url(base, &context.query) {
            Ok(url) => url,
            Err(e) => {
                return Attempt::Retryable(
                    DiscoveryFailure::new(FailureKind::Transport, e.to_string()).with_detail(base),
                )
            }
        };
        debug!(url = %url, "getKeyList(): calling KMS");

        match self.transport.get_json(&url, &context.identity).await {
            Ok(response) => classify(&url, response, criteria),
            Err(e) => {
                error!(url = %url, error = %e, "Exception while getting Kms Key List");
                Attempt::Retryable(
                    DiscoveryFailure::new(FailureKind::Transport, call_failed(&url))
                        .with_detail(e.to_string()),
                )
            }
        }
    }
}

impl std::fmt::Debug for KeyDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDiscovery")
            .field("config", &self.config)
            .field("has_cipher", &self.cipher.is_some())
            .finish()
    }
}
