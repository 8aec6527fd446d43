// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Keyfort security wrapper.
//!
//! Provides the workspace-wide error type and the shared domain types.
//! Everything else (crypto, vault, session store, launcher, proxy) lives
//! in its own crate and builds on these.

pub mod error;
pub mod types;

pub use error::KeyfortError;
pub use types::CredentialType;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyfort_error_variants_construct() {
        let _config = KeyfortError::Config("test".into());
        let _key = KeyfortError::InvalidKeyLength { actual: 16 };
        let _short = KeyfortError::CiphertextTooShort {
            actual: 4,
            minimum: 28,
        };
        let _auth = KeyfortError::AuthenticationFailed;
        let _crypto = KeyfortError::Crypto("test".into());
        let _version = KeyfortError::UnsupportedVaultVersion {
            found: 2,
            supported: 1,
        };
        let _vault = KeyfortError::Vault("test".into());
        let _session = KeyfortError::Session("test".into());
        let _launcher = KeyfortError::Launcher("test".into());
        let _policy = KeyfortError::Policy("test".into());
        let _protocol = KeyfortError::Protocol("test".into());
        let _audit = KeyfortError::Audit("test".into());
        let _io = KeyfortError::io("/tmp/x", std::io::Error::other("test"));
    }
}
