// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared startup wiring for all subcommands: config, tracing, master key,
//! vault.

use std::path::Path;

use keyfort_config::{KeyfortConfig, KeyfortPaths};
use keyfort_core::KeyfortError;
use keyfort_vault::{MasterKey, Vault};

/// Load and validate configuration, from an explicit file or the XDG
/// hierarchy.
pub fn load_config(explicit: Option<&Path>) -> Result<KeyfortConfig, KeyfortError> {
    let config = match explicit {
        Some(path) => keyfort_config::load_config_from_path(path),
        None => keyfort_config::load_config(),
    }
    .map_err(|e| KeyfortError::Config(e.to_string()))?;
    keyfort_config::validate(&config)?;
    Ok(config)
}

/// Resolve the on-disk layout and open the vault under the master key.
pub fn open_vault(config: &KeyfortConfig) -> Result<(KeyfortPaths, Vault), KeyfortError> {
    let paths = KeyfortPaths::resolve(config.daemon.data_dir.as_deref())?;
    paths.ensure_root()?;
    let key = master_key(config, &paths)?;
    let vault = Vault::open(key, paths.vault_document())?;
    Ok((paths, vault))
}

/// Acquire the master key: random key file by default, or
/// passphrase-derived when configured.
pub fn master_key(
    config: &KeyfortConfig,
    paths: &KeyfortPaths,
) -> Result<MasterKey, KeyfortError> {
    if config.vault.passphrase_protected {
        MasterKey::unlock_with_passphrase(
            &paths.master_salt(),
            config.vault.kdf_log_n,
            config.vault.kdf_r,
            config.vault.kdf_p,
        )
    } else {
        MasterKey::load_or_create(&paths.master_key())
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr: the proxy's stdout is its wire protocol.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("keyfort={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
