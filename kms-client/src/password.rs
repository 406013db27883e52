//! Password encryption at rest
//!
//! Service passwords are stored in the configuration as hex of
//! `nonce || ciphertext` (AES-256-GCM) and decrypted only for the
//! duration of a password login.
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


use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{KmsClientError, KmsClientResult};

/// Environment variable holding the master key
pub const MASTER_KEY_ENV: &str = "KMS_LOOKUP_MASTER_KEY";

const NONCE_LEN: usize = 12;

/// Decrypted password; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Encrypts and decrypts stored passwords with a 32-byte master key
#[derive(Clone)]
pub struct PasswordCipher {
    master_key: [u8; 32],
}

impl PasswordCipher {
    pub fn new(master_key: [u8; 32]) -> Self {
        Self { master_key }
    }

    /// Hex of exactly 32 bytes is used as-is; any other text is hashed with SHA-256
    pub fn from_passphrase(passphrase: &str) -> Self {
        if let Ok(bytes) = hex::decode(passphrase) {
            if bytes.len() == 32 {
                let mut key = [0u8; 32];
                key.copy_from_slice(&bytes);
                return Self::new(key);
            }
        }
        let hash = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&hash);
        Self::new(key)
    }

    /// Read the master key from `KMS_LOOKUP_MASTER_KEY` (or `.env`)
    pub fn from_env() -> KmsClientResult<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let passphrase = std::env::var(MASTER_KEY_ENV).map_err(|_| {
            KmsClientError::configuration(format!(
                "{} is not set; cannot decrypt the stored password",
                MASTER_KEY_ENV
            ))
        })?;
        Ok(Self::from_passphrase(&passphrase))
    }

    pub fn encrypt(&self, password: &str) -> KmsClientResult<String> {
        let cipher = Aes256Gcm::new(&self.master_key.into());
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, password.as_bytes())
            .map_err(|e| KmsClientError::Credential(format!("Password encryption failed: {}", e)))?;

        let mut stored = nonce.to_vec();
        stored.extend_from_slice(&ciphertext);
        Ok(hex::encode(stored))
    }

    pub fn decrypt(&self, stored: &str) -> KmsClientResult<Secret> {
        let encrypted = hex::decode(stored.trim()).map_err(|_| {
            KmsClientError::Credential("Stored password is not valid hex".to_string())
        })?;
        if encrypted.len() <= NONCE_LEN {
            return Err(KmsClientError::Credential(
                "Stored password is too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = Aes256Gcm::new(&self.master_key.into());

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| KmsClientError::Credential("Unable to decrypt password".to_string()))?;

        String::from_utf8(plaintext)
            .map(Secret)
            .map_err(|_| KmsClientError::Credential("Decrypted password is not UTF-8".to_string()))
    }
}

impl fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordCipher(<redacted>)")
    }
}
