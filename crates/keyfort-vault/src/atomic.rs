// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic file replacement: write to a temp sibling, fsync, rename.
//!
//! If the process dies mid-write, the previous file survives untouched;
//! readers never observe a truncated document.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use keyfort_core::KeyfortError;

/// Atomically replace `path` with `contents`, mode 0o600.
///
/// Writes `<path>.tmp` in the same directory, fsyncs it, renames it over
/// `path`, and fsyncs the parent directory on unix so the rename itself is
/// durable.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), KeyfortError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| KeyfortError::io(parent, e))?;
    }

    let tmp = tmp_path(path);
    {
        let mut file = File::create(&tmp).map_err(|e| KeyfortError::io(&tmp, e))?;
        set_owner_only(&tmp)?;
        file.write_all(contents)
            .map_err(|e| KeyfortError::io(&tmp, e))?;
        file.sync_all().map_err(|e| KeyfortError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| KeyfortError::io(path, e))?;

    #[cfg(unix)]
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        File::open(parent)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| KeyfortError::io(parent, e))?;
    }

    Ok(())
}

/// Restrict a file to owner-only access. No-op on platforms without POSIX
/// permission bits.
pub fn set_owner_only(path: &Path) -> Result<(), KeyfortError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| KeyfortError::io(path, e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
