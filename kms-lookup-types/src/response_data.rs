//! Diagnostic response-data map returned to admin callers
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


use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Success flag plus a short and a long human message.
///
/// `object_id` and `field_name` point the admin UI at the offending
/// configuration field when one is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    pub connectivity_status: bool,
    pub message: String,
    pub description: String,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub field_name: Option<String>,
}

impl ResponseData {
    pub fn new(
        connectivity_status: bool,
        message: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            connectivity_status,
            message: message.into(),
            description: description.into(),
            object_id: None,
            field_name: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(true, message.clone(), message)
    }

    pub fn failure(message: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(false, message, description)
    }

    pub fn with_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
