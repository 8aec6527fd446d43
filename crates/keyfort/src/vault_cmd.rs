// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyfort vault` subcommand implementations.

use std::io::Read;

use keyfort_config::KeyfortConfig;
use keyfort_core::KeyfortError;
use zeroize::Zeroizing;

use crate::common;
use crate::VaultAction;

pub fn run_vault(config: &KeyfortConfig, action: VaultAction) -> Result<(), KeyfortError> {
    let (_paths, mut vault) = common::open_vault(config)?;

    match action {
        VaultAction::Import {
            service,
            cred_type,
            value,
        } => {
            let value = match value {
                Some(value) => Zeroizing::new(value),
                None => read_value_from_stdin()?,
            };
            let record = vault.import(&service, cred_type, value.as_bytes())?;
            println!("{}", record.id);
        }
        VaultAction::List => {
            for record in vault.list() {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.id, record.service, record.cred_type, record.created_at
                );
            }
        }
        VaultAction::Delete { id } => {
            if vault.delete(&id)? {
                println!("deleted {id}");
            } else {
                println!("no credential with id {id}");
            }
        }
    }
    Ok(())
}

fn read_value_from_stdin() -> Result<Zeroizing<String>, KeyfortError> {
    let mut buffer = Zeroizing::new(String::new());
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| KeyfortError::io("stdin", e))?;
    let trimmed = Zeroizing::new(buffer.trim_end_matches(['\r', '\n']).to_string());
    if trimmed.is_empty() {
        return Err(KeyfortError::Vault(
            "empty secret value; pass it as an argument or pipe it on stdin".to_string(),
        ));
    }
    Ok(trimmed)
}
