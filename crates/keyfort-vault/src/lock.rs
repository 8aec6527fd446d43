// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-process vault lock using advisory file locking (fs2 flock).
//!
//! Held across every load-mutate-save sequence so two co-resident processes
//! cannot interleave writes and corrupt each other's view of the document.

use std::fs::File;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use keyfort_core::KeyfortError;

/// Advisory file lock for one vault document.
///
/// The lock file lives next to the document as `<path>.lock` so it is never
/// clobbered by the atomic rename of the document itself.
#[derive(Debug, Clone)]
pub struct VaultLock {
    path: PathBuf,
}

/// RAII guard that releases the lock on drop.
#[derive(Debug)]
pub struct VaultLockGuard {
    file: File,
}

impl Drop for VaultLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl VaultLock {
    pub fn new(vault_path: &Path) -> Self {
        let mut os = vault_path.as_os_str().to_owned();
        os.push(".lock");
        Self {
            path: PathBuf::from(os),
        }
    }

    /// Blocking acquire. Waits until the lock is available.
    pub fn acquire(&self) -> Result<VaultLockGuard, KeyfortError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| KeyfortError::io(parent, e))?;
        }
        let file = File::create(&self.path).map_err(|e| KeyfortError::io(&self.path, e))?;
        file.lock_exclusive()
            .map_err(|e| KeyfortError::io(&self.path, e))?;
        Ok(VaultLockGuard { file })
    }
}
