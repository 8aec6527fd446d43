// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The credential vault: a versioned JSON document of encrypted records.
//!
//! Records are encrypted individually under the master key and addressed by
//! reference id. Every mutation rewrites the document atomically (temp file,
//! fsync, rename), so an interrupted save leaves the previous document
//! intact. An advisory file lock serializes co-resident processes.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use keyfort_core::{CredentialType, KeyfortError};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::atomic;
use crate::crypto;
use crate::lock::VaultLock;
use crate::master::MasterKey;
use crate::refid;

/// The vault document version this build reads and writes.
pub const VAULT_VERSION: u32 = 1;

/// One stored credential. `encryptedValue` is base64(IV ‖ tag ‖ ciphertext)
/// under the master key; timestamps are ISO-8601.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub service: String,
    #[serde(rename = "type")]
    pub cred_type: CredentialType,
    #[serde(rename = "encryptedValue")]
    pub encrypted_value: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

/// A credential record stripped of its encrypted payload, safe to display.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub id: String,
    pub service: String,
    #[serde(rename = "type")]
    pub cred_type: CredentialType,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id.clone(),
            service: record.service.clone(),
            cred_type: record.cred_type,
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct VaultDocument {
    version: u32,
    #[serde(default)]
    credentials: Vec<CredentialRecord>,
}

/// The open credential vault.
///
/// Debug output intentionally omits key material and payloads.
pub struct Vault {
    path: PathBuf,
    key: MasterKey,
    document: VaultDocument,
    lock: VaultLock,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("path", &self.path)
            .field("credentials", &self.document.credentials.len())
            .finish()
    }
}

impl Vault {
    /// Open the vault document at `path`. A missing file is an empty vault.
    ///
    /// Records are not decrypted here; a wrong master key surfaces as an
    /// authentication failure on the first `get`.
    pub fn open(key: MasterKey, path: impl Into<PathBuf>) -> Result<Self, KeyfortError> {
        let path = path.into();
        let lock = VaultLock::new(&path);

        let document = if path.exists() {
            let _guard = lock.acquire()?;
            let content = fs::read_to_string(&path).map_err(|e| KeyfortError::io(&path, e))?;
            let document: VaultDocument = serde_json::from_str(&content).map_err(|e| {
                KeyfortError::Vault(format!(
                    "malformed vault document at {}: {e}; restore vault.json from backup",
                    path.display()
                ))
            })?;
            if document.version != VAULT_VERSION {
                return Err(KeyfortError::UnsupportedVaultVersion {
                    found: document.version,
                    supported: VAULT_VERSION,
                });
            }
            for record in &document.credentials {
                refid::parse(&record.id)?;
            }
            document
        } else {
            VaultDocument {
                version: VAULT_VERSION,
                credentials: Vec::new(),
            }
        };

        debug!(
            path = %path.display(),
            credentials = document.credentials.len(),
            "vault opened"
        );
        Ok(Self {
            path,
            key,
            document,
            lock,
        })
    }

    /// Encrypt `value` and append a new record, persisting atomically.
    ///
    /// Duplicate `(service, type)` pairs are allowed and coexist; an id
    /// collision (same 4-hex suffix) triggers a fresh allocation.
    pub fn import(
        &mut self,
        service: &str,
        cred_type: CredentialType,
        value: &[u8],
    ) -> Result<CredentialSummary, KeyfortError> {
        let _guard = self.lock.acquire()?;

        let mut id = refid::generate(service, cred_type)?;
        while self.find(&id).is_some() {
            id = refid::generate(service, cred_type)?;
        }

        let encrypted_value = crypto::encrypt(self.key.as_bytes(), value)?;
        let now = Utc::now().to_rfc3339();
        let record = CredentialRecord {
            id: id.clone(),
            service: service.to_string(),
            cred_type,
            encrypted_value,
            created_at: now.clone(),
            updated_at: now,
        };
        let summary = CredentialSummary::from(&record);
        self.document.credentials.push(record);
        self.save()?;

        debug!(id = %id, service = %service, "credential imported");
        Ok(summary)
    }

    /// All records stripped of their encrypted payloads.
    pub fn list(&self) -> Vec<CredentialSummary> {
        self.document
            .credentials
            .iter()
            .map(CredentialSummary::from)
            .collect()
    }

    /// Decrypt one record on demand.
    ///
    /// The plaintext comes back in a [`Zeroizing`] buffer the caller should
    /// keep short-lived; the vault does not cache it.
    pub fn get(
        &self,
        id: &str,
    ) -> Result<Option<(CredentialSummary, Zeroizing<Vec<u8>>)>, KeyfortError> {
        match self.find(id) {
            Some(record) => {
                let plaintext = crypto::decrypt(self.key.as_bytes(), &record.encrypted_value)?;
                Ok(Some((CredentialSummary::from(record), plaintext)))
            }
            None => Ok(None),
        }
    }

    /// Decrypt the first record matching `service` (and `cred_type`, when
    /// given).
    pub fn get_by_service(
        &self,
        service: &str,
        cred_type: Option<CredentialType>,
    ) -> Result<Option<(CredentialSummary, Zeroizing<Vec<u8>>)>, KeyfortError> {
        let record = self.document.credentials.iter().find(|r| {
            r.service == service && cred_type.is_none_or(|t| r.cred_type == t)
        });
        match record {
            Some(record) => {
                let plaintext = crypto::decrypt(self.key.as_bytes(), &record.encrypted_value)?;
                Ok(Some((CredentialSummary::from(record), plaintext)))
            }
            None => Ok(None),
        }
    }

    /// Remove a record entirely. Returns whether anything was deleted.
    pub fn delete(&mut self, id: &str) -> Result<bool, KeyfortError> {
        let _guard = self.lock.acquire()?;
        let before = self.document.credentials.len();
        self.document.credentials.retain(|r| r.id != id);
        if self.document.credentials.len() == before {
            return Ok(false);
        }
        self.save()?;
        debug!(id = %id, "credential deleted");
        Ok(true)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.document.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.credentials.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn find(&self, id: &str) -> Option<&CredentialRecord> {
        self.document.credentials.iter().find(|r| r.id == id)
    }

    fn save(&self) -> Result<(), KeyfortError> {
        let json = serde_json::to_string_pretty(&self.document)
            .map_err(|e| KeyfortError::Vault(format!("failed to serialize vault document: {e}")))?;
        atomic::atomic_write(&self.path, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_vault(dir: &Path) -> Vault {
        let key = MasterKey::generate().unwrap();
        Vault::open(key, dir.join("vault.json")).unwrap()
    }

    #[test]
    fn import_list_get_delete_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = open_test_vault(dir.path());

        let summary = vault
            .import("openai", CredentialType::ApiKey, b"sk-test-key-12345")
            .unwrap();
        assert!(refid::parse(&summary.id).is_ok());
        assert_eq!(summary.service, "openai");

        let listed = vault.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, summary.id);

        let (record, plaintext) = vault.get(&summary.id).unwrap().unwrap();
        assert_eq!(record.service, "openai");
        assert_eq!(&*plaintext, b"sk-test-key-12345");

        assert!(vault.delete(&summary.id).unwrap());
        assert!(vault.list().is_empty());
        assert!(!vault.delete(&summary.id).unwrap());
    }

    #[test]
    fn reopen_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let key = MasterKey::generate().unwrap();
        let path = dir.path().join("vault.json");

        let id = {
            let mut vault = Vault::open(key.clone(), &path).unwrap();
            vault
                .import("telegram", CredentialType::OauthToken, b"123456:ABCdef")
                .unwrap()
                .id
        };

        let vault = Vault::open(key, &path).unwrap();
        let (_, plaintext) = vault.get(&id).unwrap().unwrap();
        assert_eq!(&*plaintext, b"123456:ABCdef");
    }

    #[test]
    fn get_with_wrong_key_is_authentication_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");

        let id = {
            let mut vault = Vault::open(MasterKey::generate().unwrap(), &path).unwrap();
            vault
                .import("svc", CredentialType::Password, b"hunter2hunter2")
                .unwrap()
                .id
        };

        let vault = Vault::open(MasterKey::generate().unwrap(), &path).unwrap();
        let err = vault.get(&id).unwrap_err();
        assert!(matches!(err, KeyfortError::AuthenticationFailed));
        // No ciphertext bytes in the message.
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn missing_file_is_an_empty_vault() {
        let dir = tempfile::tempdir().unwrap();
        let vault = open_test_vault(dir.path());
        assert!(vault.is_empty());
        assert!(vault.get("cred_x_api_key_0000").unwrap().is_none());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        fs::write(&path, r#"{"version": 9, "credentials": []}"#).unwrap();

        let err = Vault::open(MasterKey::generate().unwrap(), &path).unwrap_err();
        assert!(matches!(
            err,
            KeyfortError::UnsupportedVaultVersion {
                found: 9,
                supported: 1
            }
        ));
    }

    #[test]
    fn malformed_document_is_rejected_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Vault::open(MasterKey::generate().unwrap(), &path).unwrap_err();
        assert!(err.to_string().contains("vault.json"));
    }

    #[test]
    fn duplicate_service_type_pairs_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = open_test_vault(dir.path());

        let a = vault
            .import("openai", CredentialType::ApiKey, b"first-key-value")
            .unwrap();
        let b = vault
            .import("openai", CredentialType::ApiKey, b"second-key-value")
            .unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(vault.len(), 2);
    }

    #[test]
    fn get_by_service_filters_on_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = open_test_vault(dir.path());

        vault
            .import("github", CredentialType::ApiKey, b"ghp-like-value")
            .unwrap();
        vault
            .import("github", CredentialType::OauthToken, b"oauth-value")
            .unwrap();

        let (record, plaintext) = vault
            .get_by_service("github", Some(CredentialType::OauthToken))
            .unwrap()
            .unwrap();
        assert_eq!(record.cred_type, CredentialType::OauthToken);
        assert_eq!(&*plaintext, b"oauth-value");

        assert!(vault
            .get_by_service("gitlab", None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn document_shape_on_disk_is_versioned_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = open_test_vault(dir.path());
        vault
            .import("openai", CredentialType::ApiKey, b"value")
            .unwrap();

        let raw = fs::read_to_string(vault.path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["version"], 1);
        let record = &doc["credentials"][0];
        assert!(record["encryptedValue"].is_string());
        assert!(record["createdAt"].is_string());
        assert!(record["updatedAt"].is_string());
        assert_eq!(record["type"], "api_key");
        // Plaintext never appears on disk.
        assert!(!raw.contains("value\""));
    }

    #[test]
    fn interrupted_save_leaves_previous_document() {
        // Simulate the failure mode: a stray .tmp file must never shadow
        // the real document, and open must ignore it.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        let key = MasterKey::generate().unwrap();

        let mut vault = Vault::open(key.clone(), &path).unwrap();
        vault
            .import("svc", CredentialType::ApiKey, b"persisted")
            .unwrap();
        fs::write(dir.path().join("vault.json.tmp"), b"garbage").unwrap();

        let vault = Vault::open(key, &path).unwrap();
        assert_eq!(vault.len(), 1);
    }
}
