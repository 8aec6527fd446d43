// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed secure wipe of file contents.
//!
//! Overwrites a file with three passes of cryptographically random bytes of
//! its original length, syncing after each pass, then unlinks it. On
//! copy-on-write filesystems the overwrites may land on fresh extents, so
//! this is defense in depth, not a guarantee.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use keyfort_core::KeyfortError;

use crate::crypto;

const WIPE_PASSES: usize = 3;

/// Overwrite a file three times with random bytes, then unlink it.
pub fn secure_wipe(path: &Path) -> Result<(), KeyfortError> {
    let len = fs::metadata(path)
        .map_err(|e| KeyfortError::io(path, e))?
        .len() as usize;

    if len > 0 {
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| KeyfortError::io(path, e))?;
        let mut noise = vec![0u8; len];
        for _ in 0..WIPE_PASSES {
            crypto::random_bytes(&mut noise)?;
            file.seek(SeekFrom::Start(0))
                .map_err(|e| KeyfortError::io(path, e))?;
            file.write_all(&noise)
                .map_err(|e| KeyfortError::io(path, e))?;
            file.sync_data().map_err(|e| KeyfortError::io(path, e))?;
        }
    }

    fs::remove_file(path).map_err(|e| KeyfortError::io(path, e))
}

/// Securely wipe every file under a directory, then remove the directory.
///
/// Recurses into subdirectories; symlinks and other non-regular entries are
/// unlinked without overwrite.
pub fn secure_wipe_dir(dir: &Path) -> Result<(), KeyfortError> {
    for entry in fs::read_dir(dir).map_err(|e| KeyfortError::io(dir, e))? {
        let entry = entry.map_err(|e| KeyfortError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| KeyfortError::io(&path, e))?;
        if file_type.is_dir() {
            secure_wipe_dir(&path)?;
        } else if file_type.is_file() {
            secure_wipe(&path)?;
        } else {
            fs::remove_file(&path).map_err(|e| KeyfortError::io(&path, e))?;
        }
    }
    fs::remove_dir(dir).map_err(|e| KeyfortError::io(dir, e))
}
