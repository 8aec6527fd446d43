// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential-injection launcher for the Keyfort security wrapper.
//!
//! Boots the wrapped agent so it sees decrypted secrets only through
//! environment variables, never in any file it can read, and restores the
//! on-disk auth profile to a reference-only state.

pub mod env;
pub mod launcher;
pub mod profile;

pub use env::{build_env, provider_env_names, synthetic_name, ResolvedEnv};
pub use launcher::{install_signal_handler, Launcher};
pub use profile::{
    load_profiles, restore_backup, rewrite_profiles, AuthProfile, AuthProfileFile, RewriteReport,
    REFERENCE_PREFIX,
};
