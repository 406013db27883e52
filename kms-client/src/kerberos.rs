//! Kerberos principal names and `auth_to_local` short-name rules
//!
//! A principal is `primary[/instance][@REALM]`. Rules are written in the
//! usual Hadoop form, separated by whitespace:
//!
//! ```text
//! RULE:[2:$1@$0](rangeradmin@EXAMPLE\.COM)s/.*/keyadmin/
//! RULE:[1:$1@$0](.*@EXAMPLE\.COM)s/@.*//L
//! DEFAULT
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


use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{KmsClientError, KmsClientResult};

fn rule_parser() -> &'static Regex {
    static PARSER: OnceLock<Regex> = OnceLock::new();
    PARSER.get_or_init(|| {
        Regex::new(concat!(
            r"^\s*(?:(DEFAULT)|RULE:\[(\d*):([^\]]*)\]",
            r"(?:\(([^)]*)\))?(?:s/([^/]*)/([^/]*)/(g)?)?)/?(L)?",
        ))
        .expect("rule grammar is a valid regex")
    })
}

/// A parsed Kerberos principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KerberosName {
    pub service: String,
    pub host: Option<String>,
    pub realm: Option<String>,
}

impl KerberosName {
    pub fn parse(principal: &str) -> KmsClientResult<Self> {
        let malformed =
            || KmsClientError::Credential(format!("Malformed Kerberos name: {}", principal));

        let (primary_part, realm) = match principal.split_once('@') {
            Some((primary, realm)) => {
                if realm.is_empty() || realm.contains('@') || realm.contains('/') {
                    return Err(malformed());
                }
                (primary, Some(realm.to_string()))
            }
            None => (principal, None),
        };

        let (service, host) = match primary_part.split_once('/') {
            Some((service, host)) => {
                if host.is_empty() || host.contains('/') {
                    return Err(malformed());
                }
                (service, Some(host.to_string()))
            }
            None => (primary_part, None),
        };

        if service.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            service: service.to_string(),
            host,
            realm,
        })
    }

    /// `[realm, service]` or `[realm, service, host]`, indexed by `$n`
    fn components(&self) -> Vec<&str> {
        let mut params = vec![self.realm.as_deref().unwrap_or_default(), self.service.as_str()];
        if let Some(host) = &self.host {
            params.push(host);
        }
        params
    }
}

#[derive(Debug, Clone)]
enum NameRule {
    Default {
        lowercase: bool,
    },
    Rule {
        components: usize,
        format: String,
        matcher: Option<Regex>,
        from: Option<Regex>,
        to: String,
        global: bool,
        lowercase: bool,
    },
}

impl NameRule {
    fn apply(
        &self,
        name: &KerberosName,
        default_realm: Option<&str>,
    ) -> KmsClientResult<Option<String>> {
        let (result, lowercase) = match self {
            NameRule::Default { lowercase } => {
                let realm_matches = match (default_realm, name.realm.as_deref()) {
                    (None, _) => true,
                    (Some(expected), Some(actual)) => expected == actual,
                    (Some(_), None) => false,
                };
                if !realm_matches {
                    return Ok(None);
                }
                (name.service.clone(), *lowercase)
            }
            NameRule::Rule {
                components,
                format,
                matcher,
                from,
                to,
                global,
                lowercase,
            } => {
                let params = name.components();
                if params.len() - 1 != *components {
                    return Ok(None);
                }
                let base = substitute_components(format, &params)?;
                if let Some(matcher) = matcher {
                    if !matcher.is_match(&base) {
                        return Ok(None);
                    }
                }
                let replaced = match from {
                    Some(from) if *global => from.replace_all(&base, to.as_str()).into_owned(),
                    Some(from) => from.replace(&base, to.as_str()).into_owned(),
                    None => base,
                };
                (replaced, *lowercase)
            }
        };

        if result.contains('@') || result.contains('/') {
            return Err(KmsClientError::Credential(format!(
                "Non-simple name {} after auth_to_local rule",
                result
            )));
        }

        Ok(Some(if lowercase { result.to_lowercase() } else { result }))
    }
}

/// Replace `$0`, `$1`, `$2` in a rule format with principal components
fn substitute_components(format: &str, params: &[&str]) -> KmsClientResult<String> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            out.push('$');
            continue;
        }
        let index: usize = digits.parse().map_err(|_| {
            let message = format!("Bad component index ${} in rule {}", digits, format);
            KmsClientError::Credential(message)
        })?;
        let value = params.get(index).ok_or_else(|| {
            KmsClientError::Credential(format!(
                "Component index ${} out of range in rule {}",
                index, format
            ))
        })?;
        out.push_str(value);
    }

    Ok(out)
}

/// Ordered `auth_to_local` rules
#[derive(Debug, Clone)]
pub struct NameRules {
    rules: Vec<NameRule>,
    default_realm: Option<String>,
}

impl Default for NameRules {
    fn default() -> Self {
        Self {
            rules: vec![NameRule::Default { lowercase: false }],
            default_realm: None,
        }
    }
}

impl NameRules {
    pub fn parse(rules: &str) -> KmsClientResult<Self> {
        let invalid = |detail: String| {
            KmsClientError::Credential(format!("Invalid name rules [{}]: {}", rules, detail))
        };

        let mut parsed = Vec::new();
        let mut remaining = rules.trim();

        while !remaining.is_empty() {
            let caps = rule_parser()
                .captures(remaining)
                .ok_or_else(|| invalid(format!("cannot parse near '{}'", remaining)))?;
            let lowercase = caps.get(8).is_some();

            if caps.get(1).is_some() {
                parsed.push(NameRule::Default { lowercase });
            } else {
                let components = caps[2]
                    .parse()
                    .map_err(|_| invalid(format!("bad component count '{}'", &caps[2])))?;
                let matcher = caps
                    .get(4)
                    .map(|m| Regex::new(&format!("^(?:{})$", m.as_str())))
                    .transpose()
                    .map_err(|e| invalid(e.to_string()))?;
                let from = caps
                    .get(5)
                    .map(|m| Regex::new(m.as_str()))
                    .transpose()
                    .map_err(|e| invalid(e.to_string()))?;

                parsed.push(NameRule::Rule {
                    components,
                    format: caps[3].to_string(),
                    matcher,
                    from,
                    to: caps.get(6).map(|m| m.as_str().to_string()).unwrap_or_default(),
                    global: caps.get(7).is_some(),
                    lowercase,
                });
            }

            let consumed = caps.get(0).map(|m| m.end()).unwrap_or(remaining.len());
            remaining = remaining[consumed..].trim_start();
        }

        if parsed.is_empty() {
            return Err(invalid("no rules".to_string()));
        }

        Ok(Self {
            rules: parsed,
            default_realm: None,
        })
    }

    /// Restrict `DEFAULT` to principals of this realm
    pub fn with_default_realm(mut self, realm: impl Into<String>) -> Self {
        self.default_realm = Some(realm.into());
        self
    }

    /// Short name of a principal under these rules
    pub fn short_name(&self, principal: &str) -> KmsClientResult<String> {
        let name = KerberosName::parse(principal)?;

        if name.host.is_none() && name.realm.is_none() {
            return Ok(name.service);
        }

        for rule in &self.rules {
            if let Some(short) = rule.apply(&name, self.default_realm.as_deref())? {
                debug!(principal = principal, short_name = %short, "Applied auth_to_local rule");
                return Ok(short);
            }
        }

        Err(KmsClientError::Credential(format!(
            "No auth_to_local rule applied to {}",
            principal
        )))
    }
}
