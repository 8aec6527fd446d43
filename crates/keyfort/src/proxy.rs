// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyfort proxy` command implementation.

use std::sync::Arc;

use keyfort_audit::AuditWriter;
use keyfort_config::KeyfortConfig;
use keyfort_core::KeyfortError;
use keyfort_proxy::{ProxyPolicy, ToolProxy};
use tracing::info;

use crate::common;

/// Serve the mediated tool proxy over stdin/stdout until EOF.
pub async fn run_proxy(config: &KeyfortConfig) -> Result<(), KeyfortError> {
    let (paths, vault) = common::open_vault(config)?;

    let policy = ProxyPolicy::from_config(&config.proxy);
    info!(
        rate_limit = policy.rate_limit,
        rate_window_secs = policy.rate_window.as_secs(),
        blocked = policy.blocked_tools.len(),
        "proxy policy loaded"
    );

    let mut proxy = ToolProxy::new(
        Arc::new(vault),
        policy,
        AuditWriter::new(paths.audit_log()),
        config.proxy.tools.clone(),
        config.proxy.resources.clone(),
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    proxy.run(stdin, stdout).await
}
