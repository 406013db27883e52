//! Credential context
//!
//! Picks one of three authentication strategies from the configuration,
//! logs in once per discovery call, and yields the identity the outbound
//! requests run as together with the query parameter naming that user:
//!
//! | strategy  | when                                    | query                  |
//! |-----------|-----------------------------------------|------------------------|
//! | anonymous | auth type is not Kerberos               | `?user.name=<user>`    |
//! | keytab    | Kerberos, principal and keytab present  | `?doAs=<short(princ)>` |
//! | password  | Kerberos otherwise                      | `?doAs=<short(user)>`  |
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
use kms_lookup_config::KmsClientConfig;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{KmsClientError, KmsClientResult};
use crate::kerberos::NameRules;
use crate::password::{PasswordCipher, Secret};

/// Keytab files start with 0x05 followed by format version 1 or 2
const KEYTAB_MAGIC: u8 = 0x05;

/// How an identity was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    Simple,
    Keytab,
    Password,
}

/// Authenticated subject the outbound call runs as
#[derive(Clone)]
pub struct Identity {
    principal: String,
    method: LoginMethod,
    negotiate_token: Option<String>,
}

impl Identity {
    pub fn new(principal: impl Into<String>, method: LoginMethod) -> Self {
        Self {
            principal: principal.into(),
            method,
            negotiate_token: None,
        }
    }

    /// Attach a SPNEGO token produced by a GSS-API capable login
    pub fn with_negotiate_token(mut self, token: impl Into<String>) -> Self {
        self.negotiate_token = Some(token.into());
        self
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn method(&self) -> LoginMethod {
        self.method
    }

    /// Run a request as this identity
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.negotiate_token {
            Some(token) => request.header(
                reqwest::header::AUTHORIZATION,
                format!("Negotiate {}", token),
            ),
            None => request,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("principal", &self.principal)
            .field("method", &self.method)
            .field("negotiate_token", &self.negotiate_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Query parameter that tells the KMS who the caller is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySuffix {
    /// `user.name`, pseudo authentication
    UserName(String),
    /// `doAs`, impersonation under Kerberos
    DoAs(String),
}

impl QuerySuffix {
    pub fn name(&self) -> &'static str {
        match self {
            QuerySuffix::UserName(_) => "user.name",
            QuerySuffix::DoAs(_) => "doAs",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            QuerySuffix::UserName(v) | QuerySuffix::DoAs(v) => v,
        }
    }
}

impl fmt::Display for QuerySuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}={}", self.name(), self.value())
    }
}

/// Login backend
///
/// Kerberos logins need a GSS-API capable backend that attaches a negotiate
/// token to the returned identity. The bundled [`LocalLogin`] only serves
/// simple authentication and refuses both Kerberos logins.
#[async_trait]
pub trait SecureLogin: Send + Sync {
    /// No-credential login bound to a user name
    async fn login(&self, username: &str) -> KmsClientResult<Identity>;

    async fn login_from_keytab(
        &self,
        principal: &str,
        keytab: &Path,
    ) -> KmsClientResult<Identity>;

    async fn login_with_password(
        &self,
        username: &str,
        password: &Secret,
    ) -> KmsClientResult<Identity>;
}

/// Message of the error [`LocalLogin`] returns for Kerberos logins
pub const NO_KERBEROS_BACKEND: &str = "no Kerberos login backend configured";

/// Simple-authentication login
#[derive(Debug, Clone, Default)]
pub struct LocalLogin;

#[async_trait]
impl SecureLogin for LocalLogin {
    async fn login(&self, username: &str) -> KmsClientResult<Identity> {
        if username.trim().is_empty() {
            return Err(KmsClientError::Credential(
                "Cannot log in without a user name".to_string(),
            ));
        }
        Ok(Identity::new(username, LoginMethod::Simple))
    }

    async fn login_from_keytab(
        &self,
        principal: &str,
        _keytab: &Path,
    ) -> KmsClientResult<Identity> {
        warn!(principal = principal, "Keytab login requested without a Kerberos backend");
        Err(KmsClientError::Credential(NO_KERBEROS_BACKEND.to_string()))
    }

    async fn login_with_password(
        &self,
        username: &str,
        _password: &Secret,
    ) -> KmsClientResult<Identity> {
        warn!(username = username, "Password login requested without a Kerberos backend");
        Err(KmsClientError::Credential(NO_KERBEROS_BACKEND.to_string()))
    }
}

/// Fail early on a missing or non-keytab file, before any backend sees it
async fn check_keytab(principal: &str, keytab: &Path) -> KmsClientResult<()> {
    if principal.trim().is_empty() {
        return Err(KmsClientError::Credential(
            "Cannot log in from keytab without a principal".to_string(),
        ));
    }

    let contents = tokio::fs::read(keytab).await.map_err(|e| {
        KmsClientError::Credential(format!(
            "Unable to read keytab {}: {}",
            keytab.display(),
            e
        ))
    })?;

    let valid =
        contents.len() >= 2 && contents[0] == KEYTAB_MAGIC && matches!(contents[1], 1 | 2);
    if !valid {
        return Err(KmsClientError::Credential(format!(
            "{} is not a Kerberos keytab",
            keytab.display()
        )));
    }
    Ok(())
}

/// One of the three ways to authenticate, chosen once from configuration
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    Anonymous {
        username: String,
    },
    Keytab {
        principal: String,
        keytab: PathBuf,
        name_rules: NameRules,
    },
    Password {
        username: String,
        encrypted_password: String,
        name_rules: NameRules,
    },
}

impl AuthStrategy {
    pub fn select(config: &KmsClientConfig) -> KmsClientResult<Self> {
        if !config.is_kerberos() {
            let username = config.username.clone().ok_or_else(|| {
                KmsClientError::Credential(
                    "No username configured for simple authentication".to_string(),
                )
            })?;
            return Ok(AuthStrategy::Anonymous { username });
        }

        let name_rules = NameRules::parse(&config.name_rules)?;

        if let (Some(principal), Some(keytab)) =
            (&config.ranger_principal, &config.ranger_keytab)
        {
            return Ok(AuthStrategy::Keytab {
                principal: principal.clone(),
                keytab: PathBuf::from(keytab),
                name_rules,
            });
        }

        let username = config.username.clone().ok_or_else(|| {
            KmsClientError::Credential(
                "Kerberos needs either rangerprincipal/rangerkeytab or username/password"
                    .to_string(),
            )
        })?;
        let encrypted_password = config.password.clone().ok_or_else(|| {
            KmsClientError::Credential(format!("No password configured for {}", username))
        })?;

        Ok(AuthStrategy::Password {
            username,
            encrypted_password,
            name_rules,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthStrategy::Anonymous { .. } => "anonymous",
            AuthStrategy::Keytab { .. } => "keytab",
            AuthStrategy::Password { .. } => "password",
        }
    }

    /// Query parameter for this strategy; no I/O
    pub fn query_suffix(&self) -> KmsClientResult<QuerySuffix> {
        match self {
            AuthStrategy::Anonymous { username } => Ok(QuerySuffix::UserName(username.clone())),
            AuthStrategy::Keytab {
                principal,
                name_rules,
                ..
            } => Ok(QuerySuffix::DoAs(name_rules.short_name(principal)?)),
            AuthStrategy::Password {
                username,
                name_rules,
                ..
            } => Ok(QuerySuffix::DoAs(name_rules.short_name(username)?)),
        }
    }

    /// Log in through `login`
    ///
    /// The password branch decrypts with `cipher`, or with the master key
    /// from the environment when no cipher is given.
    pub async fn login(
        &self,
        login: &dyn SecureLogin,
        cipher: Option<&PasswordCipher>,
    ) -> KmsClientResult<Identity> {
        match self {
            AuthStrategy::Anonymous { username } => {
                info!("Init Login: security not enabled, using username");
                login.login(username).await
            }
            AuthStrategy::Keytab {
                principal, keytab, ..
            } => {
                info!("Init Lookup Login: security enabled, using rangerPrincipal/rangerKeytab");
                check_keytab(principal, keytab).await?;
                login.login_from_keytab(principal, keytab).await
            }
            AuthStrategy::Password {
                username,
                encrypted_password,
                ..
            } => {
                info!("Init Login: using username/password");
                let password = match cipher {
                    Some(cipher) => cipher.decrypt(encrypted_password)?,
                    None => PasswordCipher::from_env()
                        .map_err(|e| {
                            KmsClientError::Credential(format!(
                                "Cannot decrypt the password of {}: {}",
                                username, e
                            ))
                        })?
                        .decrypt(encrypted_password)?,
                };
                if password.is_empty() {
                    return Err(KmsClientError::Credential(format!(
                        "Empty password configured for {}",
                        username
                    )));
                }
                login.login_with_password(username, &password).await
            }
        }
    }
}

/// Identity plus query parameter for one discovery call
#[derive(Debug, Clone)]
pub struct CredentialContext {
    pub identity: Identity,
    pub query: QuerySuffix,
}

/// Select a strategy, compute its query parameter, and log in
pub async fn establish(
    config: &KmsClientConfig,
    login: &dyn SecureLogin,
    cipher: Option<&PasswordCipher>,
) -> KmsClientResult<CredentialContext> {
    let strategy = AuthStrategy::select(config)?;
    let query = strategy.query_suffix()?;
    let identity = strategy.login(login, cipher).await?;

    Ok(CredentialContext { identity, query })
}


#[cfg(test)]
mod tests {
    use super::*;
    use kms_lookup_config::{AuthType, DEFAULT_NAME_RULES, DEFAULT_TIMEOUT_SECONDS};
    use std::io::Write;

    /// Accepts one password and hands out a negotiate token
    struct StubKerberos;

    #[async_trait]
    impl SecureLogin for StubKerberos {
        async fn login(&self, username: &str) -> KmsClientResult<Identity> {
            LocalLogin.login(username).await
        }

        async fn login_from_keytab(
            &self,
            principal: &str,
            _keytab: &Path,
        ) -> KmsClientResult<Identity> {
            Ok(Identity::new(principal, LoginMethod::Keytab).with_negotiate_token("a2V5dGFi"))
        }

        async fn login_with_password(
            &self,
            username: &str,
            password: &Secret,
        ) -> KmsClientResult<Identity> {
            if password.expose() != "pw" {
                return Err(KmsClientError::Credential("Pre-authentication failed".to_string()));
            }
            Ok(Identity::new(username, LoginMethod::Password).with_negotiate_token("cGFzcw=="))
        }
    }

    fn config(auth_type: AuthType) -> KmsClientConfig {
        KmsClientConfig {
            provider: "kms://http@kms.example.com:9600/kms".to_string(),
            username: None,
            password: None,
            ranger_principal: None,
            ranger_keytab: None,
            name_rules: DEFAULT_NAME_RULES.to_string(),
            auth_type,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    fn keytab_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x05, 0x02, 0x00, 0x00]).unwrap();
        file
    }

    fn keytab_config(keytab: &tempfile::NamedTempFile) -> KmsClientConfig {
        let mut cfg = config(AuthType::Kerberos);
        cfg.username = Some("alice".to_string());
        cfg.password = Some("ignored".to_string());
        cfg.ranger_principal = Some("rangeradmin/admin.example.com@EXAMPLE.COM".to_string());
        cfg.ranger_keytab = Some(keytab.path().to_string_lossy().into_owned());
        cfg
    }

    #[tokio::test]
    async fn test_simple_uses_user_name() {
        let mut cfg = config(AuthType::Simple);
        cfg.username = Some("alice".to_string());

        let ctx = establish(&cfg, &LocalLogin, None).await.unwrap();
        assert_eq!(ctx.query.to_string(), "?user.name=alice");
        assert_eq!(ctx.identity.principal(), "alice");
        assert_eq!(ctx.identity.method(), LoginMethod::Simple);
    }

    #[tokio::test]
    async fn test_keytab_wins_over_username() {
        let keytab = keytab_file();
        let cfg = keytab_config(&keytab);

        let ctx = establish(&cfg, &StubKerberos, None).await.unwrap();
        assert_eq!(ctx.query, QuerySuffix::DoAs("rangeradmin".to_string()));
        assert_eq!(ctx.identity.method(), LoginMethod::Keytab);
    }

    #[tokio::test]
    async fn test_local_login_refuses_keytab() {
        let keytab = keytab_file();
        let cfg = keytab_config(&keytab);

        match establish(&cfg, &LocalLogin, None).await {
            Err(KmsClientError::Credential(message)) => assert_eq!(message, NO_KERBEROS_BACKEND),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_local_login_refuses_password() {
        let cipher = PasswordCipher::from_passphrase("master");
        let mut cfg = config(AuthType::Kerberos);
        cfg.username = Some("keyadmin".to_string());
        cfg.password = Some(cipher.encrypt("pw").unwrap());

        match establish(&cfg, &LocalLogin, Some(&cipher)).await {
            Err(KmsClientError::Credential(message)) => assert_eq!(message, NO_KERBEROS_BACKEND),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_keytab_is_credential_error() {
        let mut cfg = config(AuthType::Kerberos);
        cfg.ranger_principal = Some("rangeradmin@EXAMPLE.COM".to_string());
        cfg.ranger_keytab = Some("/nonexistent/rangeradmin.keytab".to_string());

        let err = establish(&cfg, &StubKerberos, None).await.unwrap_err();
        assert!(matches!(err, KmsClientError::Credential(ref m) if m.contains("Unable to read")));
    }

    #[tokio::test]
    async fn test_non_keytab_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a keytab").unwrap();
        let mut cfg = config(AuthType::Kerberos);
        cfg.ranger_principal = Some("rangeradmin@EXAMPLE.COM".to_string());
        cfg.ranger_keytab = Some(file.path().to_string_lossy().into_owned());

        let err = establish(&cfg, &StubKerberos, None).await.unwrap_err();
        assert!(matches!(
            err,
            KmsClientError::Credential(ref m) if m.contains("not a Kerberos keytab")
        ));
    }

    #[tokio::test]
    async fn test_password_branch_decrypts() {
        let cipher = PasswordCipher::from_passphrase("master");
        let mut cfg = config(AuthType::Kerberos);
        cfg.username = Some("keyadmin@EXAMPLE.COM".to_string());
        cfg.password = Some(cipher.encrypt("pw").unwrap());

        let ctx = establish(&cfg, &StubKerberos, Some(&cipher)).await.unwrap();
        assert_eq!(ctx.query.to_string(), "?doAs=keyadmin");
        assert_eq!(ctx.identity.method(), LoginMethod::Password);
    }

    #[tokio::test]
    async fn test_wrong_password_fails_login() {
        let cipher = PasswordCipher::from_passphrase("master");
        let mut cfg = config(AuthType::Kerberos);
        cfg.username = Some("keyadmin".to_string());
        cfg.password = Some(cipher.encrypt("definitely-wrong").unwrap());

        let err = establish(&cfg, &StubKerberos, Some(&cipher)).await.unwrap_err();
        assert!(matches!(
            err,
            KmsClientError::Credential(ref m) if m.contains("Pre-authentication")
        ));
    }

    #[tokio::test]
    async fn test_missing_master_key_is_explained() {
        if std::env::var(crate::password::MASTER_KEY_ENV).is_ok() {
            return;
        }
        let mut cfg = config(AuthType::Kerberos);
        cfg.username = Some("keyadmin".to_string());
        cfg.password = Some("deadbeef".to_string());

        match establish(&cfg, &StubKerberos, None).await {
            Err(KmsClientError::Credential(message)) => {
                assert!(message.contains("keyadmin"));
                assert!(message.contains("KMS_LOOKUP_MASTER_KEY is not set"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_password_decrypt_failure() {
        let mut cfg = config(AuthType::Kerberos);
        cfg.username = Some("keyadmin".to_string());
        cfg.password = Some("deadbeef".to_string());

        let cipher = PasswordCipher::from_passphrase("master");
        let err = establish(&cfg, &StubKerberos, Some(&cipher)).await.unwrap_err();
        assert!(matches!(err, KmsClientError::Credential(_)));
    }

    #[test]
    fn test_simple_without_username_fails_selection() {
        let err = AuthStrategy::select(&config(AuthType::Simple)).unwrap_err();
        assert!(matches!(err, KmsClientError::Credential(_)));
    }

    #[test]
    fn test_strategy_names() {
        let mut cfg = config(AuthType::Kerberos);
        cfg.username = Some("keyadmin".to_string());
        cfg.password = Some("00".to_string());
        assert_eq!(AuthStrategy::select(&cfg).unwrap().name(), "password");
    }
}
