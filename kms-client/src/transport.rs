//! HTTP transport for the key-names call
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


use async_trait::async_trait;
use reqwest::{header, redirect, Url};
use std::time::Duration;
use tracing::debug;

use crate::credentials::Identity;
use crate::error::KmsClientResult;

/// Media type requested from the KMS
pub const EXPECTED_MIME_TYPE: &str = "application/json";

const MAX_REDIRECTS: usize = 10;

/// Status and fully-read body of one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Executes `GET <url>` as an identity
///
/// Implementations must not keep connections or responses alive past the
/// returned future.
#[async_trait]
pub trait KeyNamesTransport: Send + Sync {
    async fn get_json(&self, url: &Url, identity: &Identity) -> KmsClientResult<TransportResponse>;
}

/// reqwest-backed transport with a fresh client per call
#[derive(Debug, Clone)]
pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn with_timeout_secs(timeout_seconds: u64) -> Self {
        Self::new(Duration::from_secs(timeout_seconds))
    }
}

#[async_trait]
impl KeyNamesTransport for HttpTransport {
    async fn get_json(&self, url: &Url, identity: &Identity) -> KmsClientResult<TransportResponse> {
        // Client and response are dropped when this call returns, on every path
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(self.timeout)
            .build()?;

        let request = identity.authorize(
            client
                .get(url.clone())
                .header(header::ACCEPT, EXPECTED_MIME_TYPE),
        );

        let response = request.send().await?;
        let status = response.status().as_u16();
        debug!(url = %url, status = status, "getKeyList(): response received");

        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}
