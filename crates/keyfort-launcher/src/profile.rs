// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auth profile loading and reference-only rewrite.
//!
//! The profile file is a versioned JSON map from profile name to
//! `{ type, provider, key, ... }`. A `key` value is either a vault
//! reference (`keyfort:vault:<id>`), a legacy `${ENVNAME}` marker, or a
//! literal secret. The rewrite removes every reference- or env-form `key`
//! so nothing the wrapped agent can read contains one, backing the original
//! up to a `.bak` sibling first. Rewriting an already-clean profile is a
//! no-op. Unknown fields are preserved verbatim.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use keyfort_core::KeyfortError;
use keyfort_vault::{atomic, refid};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The profile file version this build reads and writes.
pub const PROFILE_VERSION: u32 = 1;

/// Reference form recognized in `key` fields.
pub const REFERENCE_PREFIX: &str = "keyfort:vault:";

static ENV_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{[A-Za-z_][A-Za-z0-9_]*\}$").unwrap());

/// One auth profile entry. Fields beyond the known three are preserved
/// through rewrite via the flattened map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthProfile {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub profile_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The whole profile file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthProfileFile {
    pub version: u32,
    #[serde(default)]
    pub profiles: BTreeMap<String, AuthProfile>,
}

impl Default for AuthProfileFile {
    fn default() -> Self {
        Self {
            version: PROFILE_VERSION,
            profiles: BTreeMap::new(),
        }
    }
}

/// Extract the reference id from a `keyfort:vault:<id>` key value.
pub fn vault_reference(key: &str) -> Option<&str> {
    key.strip_prefix(REFERENCE_PREFIX)
        .filter(|id| refid::parse(id).is_ok())
}

/// Whether a key value is the legacy `${ENVNAME}` form.
pub fn is_env_form(key: &str) -> bool {
    ENV_FORM.is_match(key)
}

/// Load the profile file. A missing file is an empty profile set.
pub fn load_profiles(path: &Path) -> Result<AuthProfileFile, KeyfortError> {
    if !path.exists() {
        debug!(path = %path.display(), "no auth profile file");
        return Ok(AuthProfileFile::default());
    }
    let content = fs::read_to_string(path).map_err(|e| KeyfortError::io(path, e))?;
    let file: AuthProfileFile = serde_json::from_str(&content).map_err(|e| {
        KeyfortError::Launcher(format!(
            "malformed auth profile file at {}: {e}",
            path.display()
        ))
    })?;
    if file.version != PROFILE_VERSION {
        return Err(KeyfortError::Launcher(format!(
            "unsupported auth profile version {} at {} (this build supports {PROFILE_VERSION})",
            file.version,
            path.display()
        )));
    }
    Ok(file)
}

/// What a rewrite did.
#[derive(Debug, Default)]
pub struct RewriteReport {
    /// Profile names whose `key` field was removed.
    pub removed: Vec<String>,
    /// The backup written before the rewrite, if any.
    pub backup: Option<PathBuf>,
}

/// Remove every reference-form and env-form `key` from the profile file.
///
/// The wrapped agent then finds credentials only through its environment.
/// A profile with no removable keys is left untouched (successful no-op).
pub fn rewrite_profiles(path: &Path) -> Result<RewriteReport, KeyfortError> {
    let mut file = load_profiles(path)?;

    let mut report = RewriteReport::default();
    for (name, profile) in file.profiles.iter_mut() {
        if let Some(key) = &profile.key
            && (vault_reference(key).is_some() || is_env_form(key))
        {
            profile.key = None;
            report.removed.push(name.clone());
        }
    }

    if report.removed.is_empty() {
        debug!(path = %path.display(), "auth profile already reference-free");
        return Ok(report);
    }

    let backup = backup_path(path);
    fs::copy(path, &backup).map_err(|e| KeyfortError::io(&backup, e))?;
    report.backup = Some(backup);

    let json = serde_json::to_string_pretty(&file).map_err(|e| {
        KeyfortError::Launcher(format!("failed to serialize auth profile file: {e}"))
    })?;
    atomic::atomic_write(path, json.as_bytes())?;

    info!(
        path = %path.display(),
        removed = report.removed.len(),
        "auth profile rewritten to reference-only state"
    );
    Ok(report)
}

/// Restore the `.bak` sibling over the profile file, if one exists.
pub fn restore_backup(path: &Path) -> Result<bool, KeyfortError> {
    let backup = backup_path(path);
    if !backup.exists() {
        return Ok(false);
    }
    fs::copy(&backup, path).map_err(|e| KeyfortError::io(path, e))?;
    atomic::set_owner_only(path)?;
    info!(path = %path.display(), "auth profile restored from backup");
    Ok(true)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".bak");
    PathBuf::from(os)
}
