// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyfort - a security wrapper for AI-agent runtimes.
//!
//! This is the binary entry point. It hosts the two long-running surfaces
//! (the credential-injection launcher and the mediated tool proxy) plus the
//! minimal vault management commands they depend on.

use clap::{Parser, Subcommand};
use keyfort_core::CredentialType;
use std::path::PathBuf;

mod common;
mod launch;
mod proxy;
mod session_cmd;
mod vault_cmd;

/// Keyfort - a security wrapper for AI-agent runtimes.
#[derive(Parser, Debug)]
#[command(name = "keyfort", version, about, long_about = None)]
struct Cli {
    /// Explicit config file path (defaults to the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch the wrapped agent with environment-injected credentials.
    Launch {
        /// The wrapped agent's command line.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Serve the mediated tool proxy over stdio.
    Proxy,
    /// Manage the credential vault.
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },
    /// Manage encrypted channel session vaults.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    /// Encrypt an existing plaintext session directory into a vault.
    Import {
        /// Channel name, e.g. "telegram".
        channel: String,
        /// Account identifier within the channel.
        account: String,
        /// The plaintext session directory to encrypt.
        source: PathBuf,
        /// Securely wipe the plaintext directory after import.
        #[arg(long)]
        wipe_source: bool,
    },
    /// Decrypt a session vault into a plaintext directory.
    Restore {
        channel: String,
        account: String,
        /// Destination directory for the decrypted files.
        dest: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum VaultAction {
    /// Encrypt and store a secret, printing its reference id.
    Import {
        /// Service tag (alphanumeric), e.g. "openai".
        service: String,
        /// Credential type: api_key, oauth_token, password, or certificate.
        cred_type: CredentialType,
        /// The secret value. Read from stdin when omitted.
        value: Option<String>,
    },
    /// List stored credentials (ids and metadata only).
    List,
    /// Remove a credential entirely.
    Delete {
        /// The reference id to remove.
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match common::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    common::init_tracing(&config.daemon.log_level);

    let result = match cli.command {
        Commands::Launch { command } => launch::run_launch(&config, &command).await,
        Commands::Proxy => proxy::run_proxy(&config).await.map(|()| 0),
        Commands::Vault { action } => vault_cmd::run_vault(&config, action).map(|()| 0),
        Commands::Session { action } => {
            session_cmd::run_session(&config, action).await.map(|()| 0)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
