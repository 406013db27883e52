//! Configuration management for the KMS key lookup client
//!
//! The admin server hands the client a loose string map. It is validated
//! once here into [`KmsClientConfig`] so nothing downstream does string-keyed
//! lookups.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Map key of the provider location
pub const PROVIDER: &str = "provider";
pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";
pub const RANGER_PRINCIPAL: &str = "rangerprincipal";
pub const RANGER_KEYTAB: &str = "rangerkeytab";
pub const NAME_RULES: &str = "namerules";
pub const AUTH_TYPE: &str = "authtype";
pub const TIMEOUT: &str = "timeout";

/// Name rules used when `namerules` is absent
pub const DEFAULT_NAME_RULES: &str = "DEFAULT";

/// Per-request HTTP timeout used when `timeout` is absent
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Prefix of the environment variables read by [`KmsClientConfig::from_env`]
pub const ENV_PREFIX: &str = "KMS_LOOKUP";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not connect as Connection ConfigMap is empty.")]
    Empty,

    #[error("Missing required configuration: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

impl ConfigError {
    /// Name of the offending field, when the error is about one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingField(field) => Some(field),
            ConfigError::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Authentication mode of the KMS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// Pseudo authentication, the caller names itself with `user.name`
    #[default]
    Simple,
    /// SPNEGO; requests impersonate with `doAs`
    Kerberos,
}

impl AuthType {
    /// `kerberos` in any case selects Kerberos, anything else is simple
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("kerberos") {
            AuthType::Kerberos
        } else {
            AuthType::Simple
        }
    }
}

/// Validated KMS client configuration
#[derive(Clone, Deserialize)]
pub struct KmsClientConfig {
    /// Provider location, possibly a nested `kms://` URI with mirror hosts
    pub provider: String,
    pub username: Option<String>,
    /// Encrypted at rest, decrypted only when a password login is made
    pub password: Option<String>,
    pub ranger_principal: Option<String>,
    pub ranger_keytab: Option<String>,
    pub name_rules: String,
    pub auth_type: AuthType,
    pub timeout_seconds: u64,
}

impl KmsClientConfig {
    /// Build from the admin server's string map
    pub fn from_map(configs: &HashMap<String, String>) -> Result<Self> {
        if configs.is_empty() {
            return Err(ConfigError::Empty);
        }

        let get = |key: &str| -> Option<String> {
            configs
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let provider = get(PROVIDER).ok_or(ConfigError::MissingField(PROVIDER))?;

        let timeout_seconds = match get(TIMEOUT) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: TIMEOUT,
                value: raw,
            })?,
            None => DEFAULT_TIMEOUT_SECONDS,
        };

        Ok(Self {
            provider,
            username: get(USERNAME),
            password: get(PASSWORD),
            ranger_principal: get(RANGER_PRINCIPAL),
            ranger_keytab: get(RANGER_KEYTAB),
            name_rules: get(NAME_RULES).unwrap_or_else(|| DEFAULT_NAME_RULES.to_string()),
            auth_type: get(AUTH_TYPE)
                .map(|v| AuthType::parse(&v))
                .unwrap_or_default(),
            timeout_seconds,
        })
    }

    /// Load from `KMS_LOOKUP_*` environment variables (and `.env`)
    ///
    /// `KMS_LOOKUP_PROVIDER` maps to `provider`, `KMS_LOOKUP_RANGERKEYTAB`
    /// to `rangerkeytab`, and so on.
    pub fn from_env() -> Result<Self> {
        Self::from_map(&env_map()?)
    }

    pub fn is_kerberos(&self) -> bool {
        self.auth_type == AuthType::Kerberos
    }

    /// Both the service principal and its keytab are configured
    pub fn has_service_keytab(&self) -> bool {
        self.ranger_principal.is_some() && self.ranger_keytab.is_some()
    }
}

/// The `KMS_LOOKUP_*` variables (and `.env`) as a connection map
///
/// Callers that override individual entries edit the map before handing it
/// to [`KmsClientConfig::from_map`].
pub fn env_map() -> Result<HashMap<String, String>> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let configs = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()?
        .try_deserialize()?;

    Ok(configs)
}

impl fmt::Debug for KmsClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsClientConfig")
            .field("provider", &self.provider)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ranger_principal", &self.ranger_principal)
            .field("ranger_keytab", &self.ranger_keytab)
            .field("name_rules", &self.name_rules)
            .field("auth_type", &self.auth_type)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}
