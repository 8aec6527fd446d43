// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyfort launch` command implementation.

use std::time::Duration;

use keyfort_config::KeyfortConfig;
use keyfort_core::KeyfortError;
use keyfort_launcher::Launcher;
use tracing::info;

use crate::common;

/// Boot the wrapped agent with environment-injected credentials and return
/// its exit code.
pub async fn run_launch(config: &KeyfortConfig, command: &[String]) -> Result<i32, KeyfortError> {
    let (paths, vault) = common::open_vault(config).map_err(|e| {
        eprintln!(
            "error: cannot open the credential vault. \
             Run `keyfort vault import` first, or check permissions under {}",
            paths_hint(config)
        );
        e
    })?;

    let profile_path = match &config.launcher.profile_path {
        Some(path) => path.into(),
        None => paths.auth_profiles(),
    };
    info!(profile = %profile_path.display(), "starting launcher");

    let launcher = Launcher::new(
        vault,
        profile_path,
        config.launcher.env_prefix.clone(),
        Duration::from_secs(config.launcher.grace_timeout_secs),
    );
    launcher.run(command).await
}

fn paths_hint(config: &KeyfortConfig) -> String {
    config
        .daemon
        .data_dir
        .clone()
        .unwrap_or_else(|| "the keyfort data directory".to_string())
}
