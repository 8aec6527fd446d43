// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyfort session` subcommand implementations.

use std::time::Duration;

use keyfort_config::{KeyfortConfig, KeyfortPaths};
use keyfort_core::KeyfortError;
use keyfort_session::SecureSessionStore;
use keyfort_vault::wipe;
use tracing::info;

use crate::common;
use crate::SessionAction;

pub async fn run_session(
    config: &KeyfortConfig,
    action: SessionAction,
) -> Result<(), KeyfortError> {
    let paths = KeyfortPaths::resolve(config.daemon.data_dir.as_deref())?;
    paths.ensure_root()?;
    let key = common::master_key(config, &paths)?;

    match action {
        SessionAction::Import {
            channel,
            account,
            source,
            wipe_source,
        } => {
            let vault_path = paths.channel_vault(&channel, &account);
            let store = SecureSessionStore::new(
                key.as_bytes(),
                &vault_path,
                Duration::from_secs(config.session.flush_interval_secs),
            )?;
            store.import_plaintext(&source).await?;
            println!("imported {} into {}", source.display(), vault_path.display());

            if wipe_source {
                wipe::secure_wipe_dir(&source)?;
                info!(source = %source.display(), "plaintext source directory wiped");
                println!("wiped {}", source.display());
            } else {
                println!(
                    "plaintext source left in place; re-run with --wipe-source to destroy it"
                );
            }
        }
        SessionAction::Restore {
            channel,
            account,
            dest,
        } => {
            // Decrypts one session vault into a plaintext directory for
            // inspection or migration away. The caller owns the result.
            let vault_path = paths.channel_vault(&channel, &account);
            if !vault_path.exists() {
                return Err(KeyfortError::Session(format!(
                    "no session vault at {}",
                    vault_path.display()
                )));
            }
            let mut store =
                SecureSessionStore::new(key.as_bytes(), &vault_path, Duration::ZERO)?;
            let scratch = store.open().await?;
            std::fs::create_dir_all(&dest).map_err(|e| KeyfortError::io(&dest, e))?;
            let mut restored = 0usize;
            for entry in std::fs::read_dir(&scratch).map_err(|e| KeyfortError::io(&scratch, e))? {
                let entry = entry.map_err(|e| KeyfortError::io(&scratch, e))?;
                let is_file = entry
                    .file_type()
                    .map_err(|e| KeyfortError::io(entry.path(), e))?
                    .is_file();
                if is_file {
                    let target = dest.join(entry.file_name());
                    std::fs::copy(entry.path(), &target)
                        .map_err(|e| KeyfortError::io(&target, e))?;
                    restored += 1;
                }
            }
            store.close().await?;
            println!("restored {restored} files into {}", dest.display());
        }
    }
    Ok(())
}
