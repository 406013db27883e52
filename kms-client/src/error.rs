//! Error types for KMS key discovery
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


use kms_lookup_config::ConfigError;
use kms_lookup_types::ResponseData;
use thiserror::Error;

/// Guidance appended to every long failure description shown to admins
pub const ADMIN_GUIDANCE: &str = " You can still save the repository and start creating \
policies, but you would not be able to use autocomplete for resource names. \
Check the admin server log for more info.";

/// Key discovery errors
#[derive(Error, Debug)]
pub enum KmsClientError {
    #[error("Invalid KMS location: {0}")]
    InvalidLocation(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("{message}")]
    Authorization { status: u16, message: String },

    #[error("{message}")]
    Transport {
        message: String,
        detail: Option<String>,
    },

    #[error("{message}")]
    Configuration {
        message: String,
        field: Option<&'static str>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl KmsClientError {
    pub fn configuration(message: impl Into<String>) -> Self {
        KmsClientError::Configuration {
            message: message.into(),
            field: None,
        }
    }

    pub fn transport(message: impl Into<String>, detail: Option<String>) -> Self {
        KmsClientError::Transport {
            message: message.into(),
            detail,
        }
    }

    /// HTTP status an admin endpoint reports this error with
    pub fn http_status(&self) -> u16 {
        match self {
            KmsClientError::Authorization { status, .. } => *status,
            KmsClientError::InvalidLocation(_) | KmsClientError::Configuration { .. } => 400,
            KmsClientError::Credential(_) => 401,
            _ => 500,
        }
    }

    /// Diagnostic map for the admin caller
    pub fn response_data(&self) -> ResponseData {
        let message = match self {
            KmsClientError::Transport {
                detail: Some(detail),
                ..
            } => detail.clone(),
            other => other.to_string(),
        };
        let description = match self {
            KmsClientError::Transport { message, .. } => format!("{}{}", message, ADMIN_GUIDANCE),
            other => format!("{}{}", other, ADMIN_GUIDANCE),
        };

        let data = ResponseData::failure(message, description);
        match self {
            KmsClientError::Configuration {
                field: Some(field), ..
            } => data.with_field(*field),
            _ => data,
        }
    }
}

impl From<ConfigError> for KmsClientError {
    fn from(err: ConfigError) -> Self {
        KmsClientError::Configuration {
            message: err.to_string(),
            field: err.field(),
        }
    }
}

/// Result type for key discovery operations
pub type KmsClientResult<T> = Result<T, KmsClientError>;
