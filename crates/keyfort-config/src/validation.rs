// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup validation with actionable error messages.

use keyfort_core::KeyfortError;

use crate::model::KeyfortConfig;

/// Validate a loaded configuration before any subsystem starts.
///
/// Catches values that would only fail later with a confusing error:
/// out-of-range KDF cost, a zero rate window, empty blocklist entries.
pub fn validate(config: &KeyfortConfig) -> Result<(), KeyfortError> {
    let level = config.daemon.log_level.as_str();
    if !matches!(level, "trace" | "debug" | "info" | "warn" | "error") {
        return Err(KeyfortError::Config(format!(
            "daemon.log_level must be one of trace/debug/info/warn/error, got {level:?}"
        )));
    }

    // scrypt rejects log_n >= 64 at runtime; anything under 10 is too weak
    // to protect a passphrase-wrapped master key.
    let log_n = config.vault.kdf_log_n;
    if !(10..=24).contains(&log_n) {
        return Err(KeyfortError::Config(format!(
            "vault.kdf_log_n must be between 10 and 24, got {log_n}"
        )));
    }
    if config.vault.kdf_r == 0 || config.vault.kdf_p == 0 {
        return Err(KeyfortError::Config(
            "vault.kdf_r and vault.kdf_p must be at least 1".to_string(),
        ));
    }

    if config.proxy.rate_limit > 0 && config.proxy.rate_window_secs == 0 {
        return Err(KeyfortError::Config(
            "proxy.rate_window_secs must be at least 1 when proxy.rate_limit is set".to_string(),
        ));
    }
    if config.proxy.blocked_tools.iter().any(|t| t.is_empty()) {
        return Err(KeyfortError::Config(
            "proxy.blocked_tools must not contain empty names".to_string(),
        ));
    }
    for tool in &config.proxy.tools {
        if tool.name.is_empty() {
            return Err(KeyfortError::Config(
                "proxy.tools entries must have a non-empty name".to_string(),
            ));
        }
    }

    if config.launcher.env_prefix.is_empty()
        || !config
            .launcher
            .env_prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(KeyfortError::Config(format!(
            "launcher.env_prefix must be non-empty and use only A-Z, 0-9, and _, got {:?}",
            config.launcher.env_prefix
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyfortConfig;

    #[test]
    fn default_config_validates() {
        validate(&KeyfortConfig::default()).unwrap();
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let mut config = KeyfortConfig::default();
        config.daemon.log_level = "verbose".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn weak_kdf_cost_is_rejected() {
        let mut config = KeyfortConfig::default();
        config.vault.kdf_log_n = 4;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_rate_window_with_limit_is_rejected() {
        let mut config = KeyfortConfig::default();
        config.proxy.rate_window_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_rate_limit_disables_window_check() {
        let mut config = KeyfortConfig::default();
        config.proxy.rate_limit = 0;
        config.proxy.rate_window_secs = 0;
        validate(&config).unwrap();
    }

    #[test]
    fn lowercase_env_prefix_is_rejected() {
        let mut config = KeyfortConfig::default();
        config.launcher.env_prefix = "keyfort".into();
        assert!(validate(&config).is_err());
    }
}
