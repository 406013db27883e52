//! Access decision result record
//!
//! Produced by the policy engine for one access request. The key discovery
//! client never builds one; it is carried here so every service in the
//! admin server agrees on its shape.
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
use std::fmt;

/// Policy id used when no policy decided the outcome
pub const NO_POLICY: i64 = -1;

/// Result of evaluating policies for a single access request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResult {
    service_name: String,
    is_access_determined: bool,
    is_allowed: bool,
    is_audited_determined: bool,
    is_audited: bool,
    policy_id: i64,
    audit_policy_id: i64,
    evaluated_policies_count: u64,
    reason: Option<String>,
}

impl AccessResult {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            is_access_determined: false,
            is_allowed: false,
            is_audited_determined: false,
            is_audited: false,
            policy_id: NO_POLICY,
            audit_policy_id: NO_POLICY,
            evaluated_policies_count: 0,
            reason: None,
        }
    }

    /// Copy the access part of another result (decision, policy, counter, reason)
    pub fn set_access_result_from(&mut self, other: &AccessResult) {
        self.is_access_determined = other.is_access_determined;
        self.is_allowed = other.is_allowed;
        self.policy_id = other.policy_id;
        self.evaluated_policies_count = other.evaluated_policies_count;
        self.reason = other.reason.clone();
    }

    /// Copy the audit part of another result
    pub fn set_audit_result_from(&mut self, other: &AccessResult) {
        self.is_audited_determined = other.is_audited_determined;
        self.is_audited = other.is_audited;
        self.audit_policy_id = other.audit_policy_id;
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn is_access_determined(&self) -> bool {
        self.is_access_determined
    }

    pub fn set_is_access_determined(&mut self, value: bool) {
        self.is_access_determined = value;
    }

    pub fn is_allowed(&self) -> bool {
        self.is_allowed
    }

    /// A deny is final, so it also marks the access as determined.
    pub fn set_is_allowed(&mut self, is_allowed: bool) {
        if !is_allowed {
            self.is_access_determined = true;
        }
        self.is_allowed = is_allowed;
    }

    pub fn is_audited_determined(&self) -> bool {
        self.is_audited_determined
    }

    pub fn is_audited(&self) -> bool {
        self.is_audited
    }

    pub fn set_is_audited(&mut self, is_audited: bool) {
        self.is_audited_determined = true;
        self.is_audited = is_audited;
    }

    pub fn policy_id(&self) -> i64 {
        self.policy_id
    }

    pub fn set_policy_id(&mut self, policy_id: i64) {
        self.policy_id = policy_id;
    }

    pub fn audit_policy_id(&self) -> i64 {
        self.audit_policy_id
    }

    pub fn set_audit_policy_id(&mut self, policy_id: i64) {
        self.audit_policy_id = policy_id;
    }

    pub fn evaluated_policies_count(&self) -> u64 {
        self.evaluated_policies_count
    }

    pub fn increment_evaluated_policies_count(&mut self) {
        self.evaluated_policies_count += 1;
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn set_reason(&mut self, reason: Option<String>) {
        self.reason = reason;
    }
}

impl fmt::Display for AccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            concat!(
                "AccessResult={{isAccessDetermined={{{}}} isAllowed={{{}}} ",
                "isAuditedDetermined={{{}}} isAudited={{{}}} policyId={{{}}} ",
                "auditPolicyId={{{}}} evaluatedPoliciesCount={{{}}} reason={{{}}} }}",
            ),
            self.is_access_determined,
            self.is_allowed,
            self.is_audited_determined,
            self.is_audited,
            self.policy_id,
            self.audit_policy_id,
            self.evaluated_policies_count,
            self.reason.as_deref().unwrap_or("null"),
        )
    }
}
