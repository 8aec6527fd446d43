// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./keyfort.toml` > `~/.config/keyfort/keyfort.toml`
//! > `/etc/keyfort/keyfort.toml` with environment variable overrides via
//! the `KEYFORT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KeyfortConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/keyfort/keyfort.toml` (system-wide)
/// 3. `~/.config/keyfort/keyfort.toml` (user XDG config)
/// 4. `./keyfort.toml` (local directory)
/// 5. `KEYFORT_*` environment variables
pub fn load_config() -> Result<KeyfortConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeyfortConfig::default()))
        .merge(Toml::file("/etc/keyfort/keyfort.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("keyfort/keyfort.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("keyfort.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from inline TOML only (no XDG lookup).
///
/// Used for testing and for callers that already hold the TOML text.
pub fn load_config_from_str(toml_content: &str) -> Result<KeyfortConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeyfortConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KeyfortConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeyfortConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `KEYFORT_PROXY_RATE_LIMIT` must map to
/// `proxy.rate_limit`, not `proxy.rate.limit`.
fn env_provider() -> Env {
    Env::prefixed("KEYFORT_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("daemon_", "daemon.", 1)
            .replacen("vault_", "vault.", 1)
            .replacen("session_", "session.", 1)
            .replacen("proxy_", "proxy.", 1)
            .replacen("launcher_", "launcher.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_str_overrides_defaults() {
        let config = load_config_from_str("[proxy]\nrate_limit = 3\n").unwrap();
        assert_eq!(config.proxy.rate_limit, 3);
        // Untouched sections keep their defaults.
        assert_eq!(config.session.flush_interval_secs, 300);
    }

    #[test]
    fn load_from_str_empty_is_all_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.daemon.log_level, "info");
    }

    #[test]
    fn load_from_str_rejects_bad_types() {
        let result = load_config_from_str("[proxy]\nrate_limit = \"lots\"\n");
        assert!(result.is_err());
    }
}
