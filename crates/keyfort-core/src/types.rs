// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared domain types used throughout the Keyfort workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KeyfortError;

/// The kind of secret a credential record holds.
///
/// Serialized in snake_case to match the vault document and the
/// `cred_<service>_<type>_<hash>` reference format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    ApiKey,
    OauthToken,
    Password,
    Certificate,
}

impl CredentialType {
    /// The snake_case tag used inside reference ids.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::OauthToken => "oauth_token",
            Self::Password => "password",
            Self::Certificate => "certificate",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for CredentialType {
    type Err = KeyfortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api_key" => Ok(Self::ApiKey),
            "oauth_token" => Ok(Self::OauthToken),
            "password" => Ok(Self::Password),
            "certificate" => Ok(Self::Certificate),
            other => Err(KeyfortError::Vault(format!(
                "unknown credential type: {other} (expected api_key, oauth_token, password, or certificate)"
            ))),
        }
    }
}
