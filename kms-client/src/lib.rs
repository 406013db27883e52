//! KMS key-name discovery client
//!
//! Lists the key names a Key Management Service knows about, for key-name
//! autocomplete and connectivity checks in the policy admin tool:
//! - Endpoint resolution for nested, mirrored provider locations
//! - Anonymous, keytab and password authentication
//! - Sequential failover across mirrors with fatal/soft classification
//! - Connectivity reports for the admin caller
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


pub mod client;
pub mod credentials;
pub mod diagnostics;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod kerberos;
pub mod outcome;
pub mod password;
pub mod transport;

pub use client::KmsClient;
pub use credentials::{
    AuthStrategy, CredentialContext, Identity, LocalLogin, LoginMethod, QuerySuffix, SecureLogin,
};
pub use diagnostics::test_connection;
pub use discovery::{request_url, KeyDiscovery};
pub use endpoint::{resolve_endpoints, EndpointList};
pub use error::{KmsClientError, KmsClientResult, ADMIN_GUIDANCE};
pub use kerberos::NameRules;
pub use outcome::{DiscoveryFailure, DiscoveryOutcome, FailureKind, KeyNameMatch};
pub use password::{PasswordCipher, Secret};
pub use transport::{HttpTransport, KeyNamesTransport, TransportResponse};
