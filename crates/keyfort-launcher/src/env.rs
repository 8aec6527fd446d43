// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment construction for the wrapped agent.
//!
//! Every vault reference in the auth profiles is resolved in memory and
//! exported twice: under a synthetic name derived from the reference id,
//! and under the provider-canonical names the agent's own HTTP libraries
//! look for. Plaintexts live in zeroizing buffers that are wiped during
//! launcher cleanup.

use keyfort_core::KeyfortError;
use keyfort_vault::Vault;
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::profile::{vault_reference, AuthProfileFile};

/// Canonical env var names for a known provider tag. Unknown providers get
/// only the synthetic name.
pub fn provider_env_names(provider: &str) -> &'static [&'static str] {
    match provider {
        "google" => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        "openrouter" => &["OPENROUTER_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "anthropic" => &["ANTHROPIC_API_KEY"],
        "cohere" => &["COHERE_API_KEY"],
        "mistral" => &["MISTRAL_API_KEY"],
        "groq" => &["GROQ_API_KEY"],
        "together" => &["TOGETHER_API_KEY"],
        "perplexity" => &["PERPLEXITY_API_KEY"],
        _ => &[],
    }
}

/// The synthetic env name for a reference id: the prefix, then the id
/// uppercased with every non-alphanumeric mapped to `_`.
pub fn synthetic_name(prefix: &str, reference_id: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + 1 + reference_id.len());
    name.push_str(prefix);
    name.push('_');
    for ch in reference_id.chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch.to_ascii_uppercase());
        } else {
            name.push('_');
        }
    }
    name
}

/// The resolved environment: name/plaintext pairs in zeroizing buffers.
pub struct ResolvedEnv {
    vars: Vec<(String, Zeroizing<String>)>,
}

impl ResolvedEnv {
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Iterate as `(name, value)` for `Command::envs`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Eagerly wipe every plaintext. Also happens on drop via [`Zeroizing`];
    /// this is the synchronous cleanup path.
    pub fn wipe(&mut self) {
        for (_, value) in self.vars.iter_mut() {
            value.zeroize();
        }
        self.vars.clear();
    }
}

impl std::fmt::Debug for ResolvedEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.vars.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("ResolvedEnv").field("names", &names).finish()
    }
}

/// Resolve every vault reference in `profiles` into an environment map.
///
/// A reference the vault cannot find is a warning, not an error: the env
/// var stays unset and the agent gets its auth failure at call time, which
/// is the intended failure mode. A decryption failure is fatal.
pub fn build_env(
    profiles: &AuthProfileFile,
    vault: &Vault,
    prefix: &str,
) -> Result<ResolvedEnv, KeyfortError> {
    let mut vars: Vec<(String, Zeroizing<String>)> = Vec::new();

    for (name, profile) in &profiles.profiles {
        let Some(key) = &profile.key else { continue };
        let Some(reference_id) = vault_reference(key) else {
            continue;
        };

        let Some((_, plaintext)) = vault.get(reference_id)? else {
            warn!(
                profile = %name,
                id = %reference_id,
                "credential reference not found in vault; env var not set"
            );
            continue;
        };
        let value = Zeroizing::new(String::from_utf8(plaintext.to_vec()).map_err(|_| {
            KeyfortError::Launcher(format!(
                "credential {reference_id} is not valid UTF-8 and cannot be exported"
            ))
        })?);

        vars.push((synthetic_name(prefix, reference_id), value.clone()));
        if let Some(provider) = &profile.provider {
            for canonical in provider_env_names(provider) {
                vars.push((canonical.to_string(), value.clone()));
            }
        }
        debug!(profile = %name, id = %reference_id, "credential resolved into environment");
    }

    Ok(ResolvedEnv { vars })
}
