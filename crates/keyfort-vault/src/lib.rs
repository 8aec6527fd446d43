// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM encrypted credential vault for the Keyfort security wrapper.
//!
//! One master key encrypts every credential record. Records are addressed
//! by opaque reference ids (`cred_<service>_<type>_<4-hex>`), persisted to
//! a versioned JSON document that is rewritten atomically on every
//! mutation, and decrypted only on demand.

pub mod atomic;
pub mod crypto;
pub mod kdf;
pub mod lock;
pub mod master;
pub mod refid;
pub mod vault;
pub mod wipe;

pub use master::{MasterKey, PASSPHRASE_ENV_VAR};
pub use vault::{CredentialRecord, CredentialSummary, Vault, VAULT_VERSION};
