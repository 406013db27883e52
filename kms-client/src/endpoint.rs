//! Endpoint resolution
//!
//! A KMS provider is configured as one location string. The real endpoint
//! is usually nested inside an outer `kms://` URI, and the authority may
//! list several mirror hosts separated by `;` that share one port:
//!
//! ```text
//! kms://http@kms1.example.com;kms2.example.com:9600/kms
//!   -> http://kms1.example.com:9600/kms
//!   -> http://kms2.example.com:9600/kms
//! ```
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


use reqwest::Url;
use tracing::{debug, warn};

use crate::error::{KmsClientError, KmsClientResult};

/// Ordered, non-empty list of base URLs for one provider location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointList(Vec<String>);

impl EndpointList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; resolution never yields an empty list
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a EndpointList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Pieces of an absolute URI that resolution cares about
struct UriParts<'a> {
    scheme: &'a str,
    authority: &'a str,
    /// Everything after the authority (path, query, fragment)
    rest: &'a str,
}

fn split_uri(uri: &str) -> Option<UriParts<'_>> {
    let (scheme, after_scheme) = uri.split_once("://")?;
    let scheme_char = |c: char| c.is_ascii_alphanumeric() || "+-.".contains(c);
    if scheme.is_empty() || !scheme.chars().all(scheme_char) {
        return None;
    }
    let authority_end = after_scheme
        .find(|c: char| c == '/' || c == '?' || c == '#')
        .unwrap_or(after_scheme.len());
    Some(UriParts {
        scheme,
        authority: &after_scheme[..authority_end],
        rest: &after_scheme[authority_end..],
    })
}

/// Unwrap a nested provider URI into the URL it points at
///
/// `kms://http@host:9600/kms` becomes `http://host:9600/kms`: the outer
/// scheme is dropped and the user-info becomes the real scheme. Plain
/// `http`/`https` locations are returned unchanged.
pub fn unnest_location(location: &str) -> KmsClientResult<String> {
    let location = location.trim();
    let parts = split_uri(location).ok_or_else(|| {
        KmsClientError::InvalidLocation(format!("[{}] is not an absolute URI", location))
    })?;

    if parts.scheme.eq_ignore_ascii_case("http") || parts.scheme.eq_ignore_ascii_case("https") {
        return Ok(location.to_string());
    }

    match parts.authority.split_once('@') {
        Some((inner_scheme, inner_authority)) if !inner_scheme.is_empty() => Ok(format!(
            "{}://{}{}",
            inner_scheme, inner_authority, parts.rest
        )),
        _ => Err(KmsClientError::InvalidLocation(format!(
            "No nested scheme in kms uri [{}]",
            location
        ))),
    }
}

/// Resolve a provider location into its mirror endpoints
pub fn resolve_endpoints(location: &str) -> KmsClientResult<EndpointList> {
    let unwrapped = unnest_location(location)?;
    let parts = split_uri(&unwrapped).ok_or_else(|| {
        KmsClientError::InvalidLocation(format!("[{}] is not an absolute URI", unwrapped))
    })?;

    if parts.authority.is_empty() {
        return Err(KmsClientError::InvalidLocation(format!(
            "No valid authority in kms uri [{}]",
            unwrapped
        )));
    }

    // All mirrors have to run on the same port
    let (hosts_part, port) = match parts.authority.split_once(':') {
        Some((hosts, port)) => {
            let port: u16 = port.parse().map_err(|_| {
                KmsClientError::InvalidLocation(format!(
                    "Could not parse port in kms uri [{}]",
                    unwrapped
                ))
            })?;
            (hosts, Some(port))
        }
        None => (parts.authority, None),
    };

    let hosts: Vec<&str> = hosts_part.split(';').collect();
    if hosts.len() == 1 {
        Url::parse(&unwrapped).map_err(|e| {
            let message = format!("Could not parse kms uri [{}]: {}", unwrapped, e);
            KmsClientError::InvalidLocation(message)
        })?;
        debug!(endpoint = %unwrapped, "Resolved single KMS endpoint");
        return Ok(EndpointList(vec![unwrapped]));
    }

    let path = parts
        .rest
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();

    let mut endpoints = Vec::with_capacity(hosts.len());
    for host in hosts {
        match compose_endpoint(parts.scheme, host.trim(), port, path) {
            Ok(endpoint) => endpoints.push(endpoint),
            Err(e) => warn!(host = host, error = %e, "Skipping unusable KMS mirror"),
        }
    }

    if endpoints.is_empty() {
        return Err(KmsClientError::InvalidLocation(format!(
            "No usable host in kms uri [{}]",
            unwrapped
        )));
    }

    debug!(count = endpoints.len(), "Resolved KMS mirror endpoints");
    Ok(EndpointList(endpoints))
}

fn compose_endpoint(
    scheme: &str,
    host: &str,
    port: Option<u16>,
    path: &str,
) -> KmsClientResult<String> {
    if host.is_empty() {
        return Err(KmsClientError::InvalidLocation("empty host".to_string()));
    }
    let endpoint = match port {
        Some(port) => format!("{}://{}:{}{}", scheme, host, port, path),
        None => format!("{}://{}{}", scheme, host, path),
    };
    Url::parse(&endpoint).map_err(|e| {
        KmsClientError::InvalidLocation(format!("Could not parse KMS URL [{}]: {}", endpoint, e))
    })?;
    Ok(endpoint)
}
