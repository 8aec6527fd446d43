// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Keyfort security wrapper.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Keyfort configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeyfortConfig {
    /// Process-wide settings (log level, data directory).
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Master key and KDF settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Secure session store settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Tool proxy policy and declared tool/resource catalog.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Credential-injection launcher settings.
    #[serde(default)]
    pub launcher: LauncherConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Override for the application data root. `None` uses the platform
    /// data directory.
    #[serde(default)]
    pub data_dir: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Master key and KDF settings.
///
/// The scrypt defaults (N=2^15, r=8, p=1) make brute-forcing a short
/// passphrase impractical on a workstation. Tests lower `kdf_log_n`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Derive the master key from a passphrase instead of a random key file.
    #[serde(default)]
    pub passphrase_protected: bool,

    /// scrypt cost parameter as log2(N).
    #[serde(default = "default_kdf_log_n")]
    pub kdf_log_n: u8,

    /// scrypt block size parameter r.
    #[serde(default = "default_kdf_r")]
    pub kdf_r: u32,

    /// scrypt parallelism parameter p.
    #[serde(default = "default_kdf_p")]
    pub kdf_p: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            passphrase_protected: false,
            kdf_log_n: default_kdf_log_n(),
            kdf_r: default_kdf_r(),
            kdf_p: default_kdf_p(),
        }
    }
}

fn default_kdf_log_n() -> u8 {
    15
}

fn default_kdf_r() -> u32 {
    8
}

fn default_kdf_p() -> u32 {
    1
}

/// Secure session store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds between periodic re-encryptions of open session
    /// directories. Zero disables the periodic flush; the store still
    /// flushes on close.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

fn default_flush_interval_secs() -> u64 {
    300
}

/// Tool proxy policy and declared catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Maximum `tools/call` invocations per tool within the rate window.
    /// Zero disables rate limiting.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Length of the sliding rate window in seconds.
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,

    /// Tool names the proxy refuses to call.
    #[serde(default)]
    pub blocked_tools: Vec<String>,

    /// Tools advertised by `tools/list`.
    #[serde(default)]
    pub tools: Vec<ToolDecl>,

    /// Resources advertised by `resources/list`.
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            rate_window_secs: default_rate_window_secs(),
            blocked_tools: Vec::new(),
            tools: Vec::new(),
            resources: Vec::new(),
        }
    }
}

fn default_rate_limit() -> u32 {
    60
}

fn default_rate_window_secs() -> u64 {
    60
}

/// One tool advertised through `tools/list`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolDecl {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One resource advertised through `resources/list`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    pub uri: String,
    #[serde(default)]
    pub name: String,
}

/// Credential-injection launcher settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    /// Prefix for synthetic per-credential environment variable names.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    /// Path to the auth profile file. `None` uses
    /// `<data root>/auth-profiles.json`.
    #[serde(default)]
    pub profile_path: Option<String>,

    /// Seconds the wrapped agent is given to exit after SIGTERM before
    /// it is force-killed.
    #[serde(default = "default_grace_timeout_secs")]
    pub grace_timeout_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
            profile_path: None,
            grace_timeout_secs: default_grace_timeout_secs(),
        }
    }
}

fn default_env_prefix() -> String {
    "KEYFORT".to_string()
}

fn default_grace_timeout_secs() -> u64 {
    5
}
