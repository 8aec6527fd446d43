// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide master key.
//!
//! Either 32 uniformly random bytes persisted to `master.key` (owner-only),
//! or derived from a passphrase via scrypt with a salt persisted next to it.
//! Lives in memory for the lifetime of a run; zeroized on drop; never
//! logged, never returned from any API, never included in an error.

use std::fs;
use std::io::IsTerminal;
use std::path::Path;

use keyfort_core::KeyfortError;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::atomic;
use crate::crypto::{self, KEY_LEN};
use crate::kdf::{self, SALT_LEN};

/// Environment variable consulted before prompting for the passphrase.
pub const PASSPHRASE_ENV_VAR: &str = "KEYFORT_PASSPHRASE";

/// The in-memory master key.
///
/// Debug output intentionally omits the key material.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; KEY_LEN]>);

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MasterKey").field(&"[REDACTED]").finish()
    }
}

impl MasterKey {
    /// Generate a fresh random master key (not persisted).
    pub fn generate() -> Result<Self, KeyfortError> {
        Ok(Self(crypto::generate_key()?))
    }

    /// Wrap existing key bytes. Fails unless exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyfortError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyfortError::InvalidKeyLength {
                actual: bytes.len(),
            });
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Load the key file, or generate and persist one on first run.
    pub fn load_or_create(path: &Path) -> Result<Self, KeyfortError> {
        if path.exists() {
            let bytes = Zeroizing::new(fs::read(path).map_err(|e| KeyfortError::io(path, e))?);
            if bytes.len() != KEY_LEN {
                return Err(KeyfortError::Vault(format!(
                    "corrupted master key file at {} ({} bytes, expected {KEY_LEN}); \
                     restore it from backup -- credentials cannot be recovered without it",
                    path.display(),
                    bytes.len()
                )));
            }
            let key = Self::from_bytes(&bytes)?;
            debug!(path = %path.display(), "master key loaded");
            return Ok(key);
        }

        let key = Self::generate()?;
        atomic::atomic_write(path, key.0.as_ref())?;
        info!(path = %path.display(), "master key generated");
        Ok(key)
    }

    /// Derive the key from the operator's passphrase, creating the salt
    /// file on first use.
    ///
    /// The passphrase is resolved from [`PASSPHRASE_ENV_VAR`] when set, or
    /// an interactive prompt when stdin is a terminal. Headless runs with
    /// no variable set fail with a message naming both options; a variable
    /// that is set but empty is a configuration mistake and never falls
    /// through to a prompt.
    pub fn unlock_with_passphrase(
        salt_path: &Path,
        log_n: u8,
        r: u32,
        p: u32,
    ) -> Result<Self, KeyfortError> {
        let passphrase = resolve_passphrase()?;
        Self::from_passphrase(&passphrase, salt_path, log_n, r, p)
    }

    /// Derive the key from a passphrase, creating the salt file on first use.
    pub fn from_passphrase(
        passphrase: &SecretString,
        salt_path: &Path,
        log_n: u8,
        r: u32,
        p: u32,
    ) -> Result<Self, KeyfortError> {
        let salt: [u8; SALT_LEN] = if salt_path.exists() {
            let bytes = fs::read(salt_path).map_err(|e| KeyfortError::io(salt_path, e))?;
            bytes.as_slice().try_into().map_err(|_| {
                KeyfortError::Vault(format!(
                    "corrupted KDF salt at {} (expected {SALT_LEN} bytes)",
                    salt_path.display()
                ))
            })?
        } else {
            let salt = kdf::generate_salt()?;
            atomic::atomic_write(salt_path, &salt)?;
            info!(path = %salt_path.display(), "KDF salt generated");
            salt
        };

        let key = kdf::derive_key(
            passphrase.expose_secret().as_bytes(),
            &salt,
            log_n,
            r,
            p,
        )?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

fn resolve_passphrase() -> Result<SecretString, KeyfortError> {
    match std::env::var(PASSPHRASE_ENV_VAR) {
        Ok(value) if !value.is_empty() => Ok(SecretString::from(value)),
        Ok(_) => Err(KeyfortError::Config(format!(
            "{PASSPHRASE_ENV_VAR} is set but empty; give it the passphrase, \
             or unset it to be prompted"
        ))),
        Err(_) if std::io::stdin().is_terminal() => {
            let entered = rpassword::prompt_password("keyfort master passphrase: ")
                .map_err(|e| KeyfortError::Vault(format!("passphrase prompt failed: {e}")))?;
            if entered.is_empty() {
                return Err(KeyfortError::Vault(
                    "the master passphrase must not be empty".to_string(),
                ));
            }
            Ok(SecretString::from(entered))
        }
        Err(_) => Err(KeyfortError::Config(format!(
            "vault.passphrase_protected is enabled but {PASSPHRASE_ENV_VAR} is unset \
             and stdin is not a terminal"
        ))),
    }
}
