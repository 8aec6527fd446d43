// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The credential-injection launcher: resolve, rewrite, spawn, supervise.
//!
//! Startup pipeline: load the auth profiles, resolve every vault reference
//! into an in-memory environment, rewrite the profile file to its
//! reference-only state, then spawn the wrapped agent with the environment
//! attached and stdio inherited. The agent never sees a secret in any file
//! it can read.
//!
//! Shutdown: SIGINT/SIGTERM forward a SIGTERM to the agent, wait out a
//! grace window, force-kill if needed, and run cleanup exactly once.
//! Cleanup zeroizes every exported plaintext; the synchronous path lives in
//! a drop guard so it also runs when the launcher unwinds on an error.

use std::path::PathBuf;
use std::time::Duration;

use keyfort_core::KeyfortError;
use keyfort_vault::Vault;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::env::{self, ResolvedEnv};
use crate::profile;

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    token_clone.cancel();
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT, initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
    });

    token
}

/// Runs cleanup exactly once: on the normal path via [`finish`], or on the
/// unwind path via `Drop` (the synchronous variant, where no further async
/// work is safe).
///
/// [`finish`]: CleanupGuard::finish
struct CleanupGuard {
    env: Option<ResolvedEnv>,
}

impl CleanupGuard {
    fn new(env: ResolvedEnv) -> Self {
        Self { env: Some(env) }
    }

    fn finish(&mut self) {
        if let Some(mut env) = self.env.take() {
            env.wipe();
            debug!("exported plaintexts zeroized");
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

/// The launcher: boots the wrapped agent with environment-injected secrets.
pub struct Launcher {
    vault: Vault,
    profile_path: PathBuf,
    env_prefix: String,
    grace: Duration,
}

impl Launcher {
    pub fn new(
        vault: Vault,
        profile_path: impl Into<PathBuf>,
        env_prefix: impl Into<String>,
        grace: Duration,
    ) -> Self {
        Self {
            vault,
            profile_path: profile_path.into(),
            env_prefix: env_prefix.into(),
            grace,
        }
    }

    /// Run the wrapped agent to completion and return its exit code.
    ///
    /// Failures before the spawn are fatal: an agent running without its
    /// credentials would be worse than not running at all.
    pub async fn run(&self, command: &[String]) -> Result<i32, KeyfortError> {
        let Some((program, args)) = command.split_first() else {
            return Err(KeyfortError::Launcher(
                "no agent command given; pass the wrapped agent's command line".to_string(),
            ));
        };

        let profiles = profile::load_profiles(&self.profile_path)?;
        let resolved = env::build_env(&profiles, &self.vault, &self.env_prefix)?;
        info!(
            profiles = profiles.profiles.len(),
            env_vars = resolved.len(),
            "credentials resolved into environment"
        );

        let report = profile::rewrite_profiles(&self.profile_path)?;
        if !report.removed.is_empty() {
            info!(
                removed = report.removed.len(),
                "profile keys removed; agent relies on environment fallback"
            );
        }

        let cancel = install_signal_handler();

        let mut agent = Command::new(program);
        agent.args(args);
        for (name, value) in resolved.iter() {
            agent.env(name, value);
        }
        // Command holds its own copies now; the guard owns the zeroizing
        // originals for both cleanup paths.
        let mut guard = CleanupGuard::new(resolved);

        let child = agent.spawn().map_err(|e| {
            KeyfortError::Launcher(format!("failed to spawn agent process {program:?}: {e}"))
        })?;
        info!(program = %program, "wrapped agent started");

        let code = self.supervise(child, &cancel).await?;
        guard.finish();

        info!(code, "wrapped agent exited");
        Ok(code)
    }

    /// Wait for the agent, forwarding shutdown signals to it.
    ///
    /// A normal agent exit propagates the agent's status; a signal-driven
    /// shutdown exits 0 once the agent is down and cleanup has run.
    async fn supervise(
        &self,
        mut child: Child,
        cancel: &CancellationToken,
    ) -> Result<i32, KeyfortError> {
        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| {
                    KeyfortError::Launcher(format!("failed to wait on agent: {e}"))
                })?;
                Ok(status_code(&status))
            }
            _ = cancel.cancelled() => {
                self.terminate(&mut child).await?;
                Ok(0)
            }
        }
    }

    /// SIGTERM, grace window, then SIGKILL.
    async fn terminate(
        &self,
        child: &mut Child,
    ) -> Result<std::process::ExitStatus, KeyfortError> {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => debug!(pid, "forwarded SIGTERM to agent"),
                Err(e) => warn!(pid, error = %e, "failed to signal agent"),
            }
        }

        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(status) => status
                .map_err(|e| KeyfortError::Launcher(format!("failed to wait on agent: {e}"))),
            Err(_elapsed) => {
                warn!(grace_secs = self.grace.as_secs(), "agent ignored SIGTERM, force-killing");
                child
                    .kill()
                    .await
                    .map_err(|e| KeyfortError::Launcher(format!("failed to kill agent: {e}")))?;
                child
                    .wait()
                    .await
                    .map_err(|e| KeyfortError::Launcher(format!("failed to wait on agent: {e}")))
            }
        }
    }
}

fn status_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    // Terminated by signal (unix): conventional 128 + signo.
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
