// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Keyfort security wrapper.

use std::path::Path;

use thiserror::Error;

/// The primary error type used across all Keyfort crates.
///
/// Crypto variants carry no key or plaintext material. I/O variants carry
/// the offending path so fatal messages can name it.
#[derive(Debug, Error)]
pub enum KeyfortError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// An encryption or decryption key with the wrong length was supplied.
    #[error("encryption key must be exactly 32 bytes, got {actual}")]
    InvalidKeyLength { actual: usize },

    /// An encrypted blob shorter than the fixed IV + tag framing.
    #[error("ciphertext too short: {actual} bytes, need at least {minimum}")]
    CiphertextTooShort { actual: usize, minimum: usize },

    /// GCM tag verification failed: wrong key or corrupted data.
    #[error("decryption failed: authentication tag mismatch (wrong key or corrupted data)")]
    AuthenticationFailed,

    /// Other cryptographic failures (RNG, cipher construction, KDF).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The vault document carries a version this build does not understand.
    #[error("unsupported vault version {found} (this build supports version {supported})")]
    UnsupportedVaultVersion { found: u32, supported: u32 },

    /// Credential vault errors (malformed document, bad reference id).
    #[error("vault error: {0}")]
    Vault(String),

    /// Secure session store errors (bad state transition, corrupt pack).
    #[error("session store error: {0}")]
    Session(String),

    /// Launcher errors (profile rewrite, agent spawn).
    #[error("launcher error: {0}")]
    Launcher(String),

    /// Policy denials (blocked tool, rate limit).
    #[error("policy violation: {0}")]
    Policy(String),

    /// Wire protocol errors (malformed JSON-RPC, unknown method).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Audit log write failures.
    #[error("audit log error: {0}")]
    Audit(String),

    /// I/O errors, annotated with the path being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl KeyfortError {
    /// Wrap an `io::Error` with the path that produced it.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_variant_carries_path() {
        let err = KeyfortError::io("/tmp/vault.json", std::io::Error::other("boom"));
        let msg = err.to_string();
        assert!(msg.contains("/tmp/vault.json"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn crypto_errors_name_the_failure_not_the_data() {
        let err = KeyfortError::AuthenticationFailed;
        assert!(err.to_string().contains("wrong key or corrupted data"));

        let err = KeyfortError::CiphertextTooShort {
            actual: 5,
            minimum: 28,
        };
        assert!(err.to_string().contains("28"));
    }

    #[test]
    fn unsupported_version_names_both_versions() {
        let err = KeyfortError::UnsupportedVaultVersion {
            found: 9,
            supported: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains('9'));
        assert!(msg.contains('1'));
    }
}
