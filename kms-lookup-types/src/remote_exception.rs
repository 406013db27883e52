//! `RemoteException` JSON error bodies
//!
//! Renders any error as
//! `{"RemoteException": {"message", "exception", "javaClassName"}}`, the
//! body KMS-compatible servers use for failed calls.
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
use std::error::Error;

use crate::error::{Result, TypesError};

/// Inner exception description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteException {
    pub message: Option<String>,
    pub exception: String,
    #[serde(rename = "javaClassName")]
    pub class_name: String,
}

/// Top-level error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteExceptionBody {
    #[serde(rename = "RemoteException")]
    pub remote_exception: RemoteException,
}

impl RemoteExceptionBody {
    /// Describe `error`, keeping only the first line of its message
    pub fn from_error<E: Error + ?Sized + 'static>(error: &E) -> Self {
        let text = error.to_string();
        let message = text.lines().next().map(str::to_string);
        let class_name = std::any::type_name::<E>().to_string();

        Self {
            remote_exception: RemoteException {
                message,
                exception: simple_type_name(&class_name).to_string(),
                class_name,
            },
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Build the status and JSON body for a failed HTTP call
pub fn render_error<E: Error + ?Sized + 'static>(
    status: u16,
    error: &E,
) -> Result<(u16, serde_json::Value)> {
    if !(100..=599).contains(&status) {
        return Err(TypesError::InvalidStatus(status));
    }
    let body = RemoteExceptionBody::from_error(error).to_json()?;
    Ok((status, body))
}

/// `a::b::Foo<x::Y>` -> `Foo`
fn simple_type_name(full: &str) -> &str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}
