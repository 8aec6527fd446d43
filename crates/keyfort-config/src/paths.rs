// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk layout under the per-user application root.
//!
//! ```text
//! <root>/
//!   master.key                      32 random bytes, owner-only
//!   master.salt                     16-byte KDF salt (passphrase mode)
//!   vault.json                      credential vault document
//!   auth-profiles.json              agent auth profiles (rewritten key-free)
//!   channels/<channel>/<acct>.vault encrypted session vaults
//!   audit.jsonl                     append-only audit log
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use keyfort_core::KeyfortError;

/// Resolved filesystem layout for one Keyfort installation.
#[derive(Debug, Clone)]
pub struct KeyfortPaths {
    root: PathBuf,
}

impl KeyfortPaths {
    /// Resolve the application root: the configured override if present,
    /// otherwise `<platform data dir>/keyfort`.
    pub fn resolve(data_dir_override: Option<&str>) -> Result<Self, KeyfortError> {
        let root = match data_dir_override {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .ok_or_else(|| {
                    KeyfortError::Config(
                        "cannot determine platform data directory; set daemon.data_dir".to_string(),
                    )
                })?
                .join("keyfort"),
        };
        Ok(Self { root })
    }

    /// Build a layout rooted at an explicit directory (tests, tooling).
    pub fn at_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the application root with owner-only permissions if absent.
    pub fn ensure_root(&self) -> Result<(), KeyfortError> {
        fs::create_dir_all(&self.root).map_err(|e| KeyfortError::io(&self.root, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.root, fs::Permissions::from_mode(0o700))
                .map_err(|e| KeyfortError::io(&self.root, e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn master_key(&self) -> PathBuf {
        self.root.join("master.key")
    }

    pub fn master_salt(&self) -> PathBuf {
        self.root.join("master.salt")
    }

    pub fn vault_document(&self) -> PathBuf {
        self.root.join("vault.json")
    }

    pub fn auth_profiles(&self) -> PathBuf {
        self.root.join("auth-profiles.json")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.root.join("audit.jsonl")
    }

    pub fn channels_root(&self) -> PathBuf {
        self.root.join("channels")
    }

    /// Session vault path for one `(channel, account)` pair.
    pub fn channel_vault(&self, channel: &str, account: &str) -> PathBuf {
        self.channels_root()
            .join(channel)
            .join(format!("{account}.vault"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_wins() {
        let paths = KeyfortPaths::resolve(Some("/tmp/keyfort-test")).unwrap();
        assert_eq!(paths.root(), Path::new("/tmp/keyfort-test"));
    }

    #[test]
    fn layout_is_stable() {
        let paths = KeyfortPaths::at_root("/data/keyfort");
        assert_eq!(paths.master_key(), Path::new("/data/keyfort/master.key"));
        assert_eq!(
            paths.vault_document(),
            Path::new("/data/keyfort/vault.json")
        );
        assert_eq!(paths.audit_log(), Path::new("/data/keyfort/audit.jsonl"));
        assert_eq!(
            paths.channel_vault("telegram", "primary"),
            Path::new("/data/keyfort/channels/telegram/primary.vault")
        );
    }

    #[test]
    fn ensure_root_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let paths = KeyfortPaths::at_root(dir.path().join("nested/keyfort"));
        paths.ensure_root().unwrap();
        assert!(paths.root().is_dir());
    }
}
