//! Key-name filtering and discovery outcomes
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


use std::collections::HashSet;

use crate::error::{KmsClientError, KmsClientResult};

/// Prefix filter plus names the caller already has
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNameMatch {
    prefix: Option<String>,
    exclude: HashSet<String>,
}

impl KeyNameMatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn excluding<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Case-sensitive prefix test and exact-name exclusion
    pub fn matches(&self, name: &str) -> bool {
        if self.exclude.contains(name) {
            return false;
        }
        match self.prefix.as_deref() {
            None | Some("") => true,
            Some(prefix) => name.starts_with(prefix),
        }
    }

    /// Filter and deduplicate, keeping first occurrences in order
    pub fn apply(&self, names: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter(|name| self.matches(name))
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }
}

/// Why discovery did not produce a key list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Endpoint answered with an unusable status; tried the next mirror
    Soft,
    /// 401/403 from a mirror; nothing else is tried
    Authorization,
    /// No identity could be established
    Credential,
    /// The call itself could not be completed
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFailure {
    pub kind: FailureKind,
    pub message: String,
    pub detail: Option<String>,
    pub status: Option<u16>,
}

impl DiscoveryFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            status: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind != FailureKind::Soft
    }

    pub fn into_error(self) -> KmsClientError {
        match self.kind {
            FailureKind::Authorization => KmsClientError::Authorization {
                status: self.status.unwrap_or_default(),
                message: self.message,
            },
            FailureKind::Credential => KmsClientError::Credential(self.message),
            FailureKind::Soft | FailureKind::Transport => KmsClientError::Transport {
                message: self.message,
                detail: self.detail,
            },
        }
    }
}

/// Result of one discovery call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Keys(Vec<String>),
    Failed(DiscoveryFailure),
}

impl DiscoveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DiscoveryOutcome::Keys(_))
    }

    pub fn keys(&self) -> Option<&[String]> {
        match self {
            DiscoveryOutcome::Keys(keys) => Some(keys),
            DiscoveryOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&DiscoveryFailure> {
        match self {
            DiscoveryOutcome::Keys(_) => None,
            DiscoveryOutcome::Failed(failure) => Some(failure),
        }
    }

    /// Keys, `None` for a soft failure, or the fatal error
    pub fn into_result(self) -> KmsClientResult<Option<Vec<String>>> {
        match self {
            DiscoveryOutcome::Keys(keys) => Ok(Some(keys)),
            DiscoveryOutcome::Failed(failure) if failure.is_fatal() => Err(failure.into_error()),
            DiscoveryOutcome::Failed(_) => Ok(None),
        }
    }
}

/// What one endpoint attempt means for the failover loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Success(Vec<String>),
    Retryable(DiscoveryFailure),
    Fatal(DiscoveryFailure),
}
