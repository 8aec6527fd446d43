// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque credential reference ids: `cred_<service>_<type>_<4-hex>`.
//!
//! The 4-hex suffix is a truncated SHA-256 over service, type, current time,
//! and 8 random bytes. Collisions within one vault are possible but
//! unlikely; the vault retries allocation when it observes one.

use std::sync::LazyLock;

use chrono::Utc;
use keyfort_core::{CredentialType, KeyfortError};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::crypto;

// Service is alphanumeric; type may contain underscores (e.g. oauth_token);
// the trailing group is exactly four lowercase hex characters.
static REFERENCE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^cred_([a-zA-Z0-9]+)_([a-z0-9_]+)_([0-9a-f]{4})$").unwrap()
});

/// The components of a parsed reference id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId {
    pub service: String,
    pub cred_type: String,
    pub hash: String,
}

/// Allocate a fresh reference id for `(service, type)`.
///
/// The service tag must be non-empty alphanumeric; it becomes part of the
/// id's grammar, so anything else would make the id unparseable.
pub fn generate(service: &str, cred_type: CredentialType) -> Result<String, KeyfortError> {
    if service.is_empty() || !service.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(KeyfortError::Vault(format!(
            "service tag must be non-empty alphanumeric, got {service:?}"
        )));
    }

    let mut entropy = [0u8; 8];
    crypto::random_bytes(&mut entropy)?;

    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update(cred_type.as_tag().as_bytes());
    hasher.update(Utc::now().timestamp_millis().to_be_bytes());
    hasher.update(entropy);
    let digest = hasher.finalize();

    let suffix = hex::encode(&digest[..2]);
    Ok(format!("cred_{service}_{}_{suffix}", cred_type.as_tag()))
}

/// Parse a reference id back into its components.
pub fn parse(id: &str) -> Result<ParsedId, KeyfortError> {
    let captures = REFERENCE_ID.captures(id).ok_or_else(|| {
        KeyfortError::Vault(format!("not a valid credential reference id: {id:?}"))
    })?;
    Ok(ParsedId {
        service: captures[1].to_string(),
        cred_type: captures[2].to_string(),
        hash: captures[3].to_string(),
    })
}

/// Whether a string has the reference id shape.
pub fn is_reference(s: &str) -> bool {
    REFERENCE_ID.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_parses_back_to_its_inputs() {
        let id = generate("openai", CredentialType::ApiKey).unwrap();
        let parsed = parse(&id).unwrap();
        assert_eq!(parsed.service, "openai");
        assert_eq!(parsed.cred_type, "api_key");
        assert_eq!(parsed.hash.len(), 4);
        assert!(parsed.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn underscore_type_tags_parse_unambiguously() {
        let id = generate("github", CredentialType::OauthToken).unwrap();
        let parsed = parse(&id).unwrap();
        assert_eq!(parsed.service, "github");
        assert_eq!(parsed.cred_type, "oauth_token");
    }

    #[test]
    fn generated_ids_are_usually_distinct() {
        // 16 bits of suffix, so a pair can collide; eight allocations all
        // landing on one value cannot.
        let ids: std::collections::HashSet<String> = (0..8)
            .map(|_| generate("svc", CredentialType::Password).unwrap())
            .collect();
        assert!(ids.len() > 1);
    }

    #[test]
    fn invalid_ids_fail_to_parse() {
        for bad in [
            "",
            "cred_",
            "cred_openai_api_key",
            "cred_openai_api_key_XYZW",
            "cred_openai_api_key_ab1",
            "cred_my-svc_api_key_ab12",
            "token_openai_api_key_ab12",
        ] {
            assert!(parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn empty_or_symbolic_service_is_rejected() {
        assert!(generate("", CredentialType::ApiKey).is_err());
        assert!(generate("my-service", CredentialType::ApiKey).is_err());
    }

    #[test]
    fn is_reference_matches_the_format() {
        assert!(is_reference("cred_test_api_key_0a1b"));
        assert!(!is_reference("cred_test_api_key_0a1bX"));
        assert!(!is_reference("not-a-ref"));
    }
}
