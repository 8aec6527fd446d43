// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The secure session store: tarball-at-rest for a live directory of files.
//!
//! A third-party session library demands a directory of mutable files; this
//! store keeps that directory encrypted as a single blob on disk and
//! projects it into a private scratch directory only while open.
//!
//! State machine: `Closed → Open → Closed` (flushing is internal). `open()`
//! decrypts the vault blob into a fresh 0o700 scratch directory and starts
//! a periodic flush task; `flush()` re-encrypts a snapshot of the scratch
//! directory atomically; `close()` stops the timer, flushes once more,
//! three-pass wipes every scratch file, and removes the directory.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use keyfort_core::KeyfortError;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use keyfort_vault::atomic;
use keyfort_vault::crypto::{self, IV_LEN, KEY_LEN, TAG_LEN};
use keyfort_vault::wipe;

use crate::pack;

/// The session blob version this build reads and writes.
pub const BLOB_VERSION: u32 = 1;

/// On-disk shape of one encrypted session vault.
#[derive(Debug, Serialize, Deserialize)]
struct SessionBlob {
    version: u32,
    iv: String,
    ciphertext: String,
    tag: String,
}

#[derive(Debug)]
enum StoreState {
    Closed,
    Open { scratch: PathBuf },
}

/// Tarball-at-rest store for one `(vault path, account)` session.
///
/// Exactly one `open()` at a time; a second open while the store is open is
/// rejected. The store exclusively owns its scratch directory and its vault
/// file.
pub struct SecureSessionStore {
    vault_path: PathBuf,
    key: Zeroizing<[u8; KEY_LEN]>,
    flush_interval: Duration,
    state: Arc<Mutex<StoreState>>,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for SecureSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSessionStore")
            .field("vault_path", &self.vault_path)
            .field("flush_interval", &self.flush_interval)
            .finish()
    }
}

impl SecureSessionStore {
    /// Create a store handle. The key must be exactly 32 bytes; a zero
    /// `flush_interval` disables the periodic flush (close still flushes).
    pub fn new(
        key: &[u8],
        vault_path: impl Into<PathBuf>,
        flush_interval: Duration,
    ) -> Result<Self, KeyfortError> {
        if key.len() != KEY_LEN {
            return Err(KeyfortError::InvalidKeyLength { actual: key.len() });
        }
        let mut owned = Zeroizing::new([0u8; KEY_LEN]);
        owned.copy_from_slice(key);
        Ok(Self {
            vault_path: vault_path.into(),
            key: owned,
            flush_interval,
            state: Arc::new(Mutex::new(StoreState::Closed)),
            cancel: None,
        })
    }

    /// Project the encrypted vault into a fresh private scratch directory
    /// and return its path.
    ///
    /// A missing vault file means a brand-new session: the scratch
    /// directory starts empty. Leftover scratch directories from a crashed
    /// run are never re-imported; the encrypted vault is the only source.
    pub async fn open(&mut self) -> Result<PathBuf, KeyfortError> {
        let mut state = self.state.lock().await;
        if let StoreState::Open { scratch } = &*state {
            return Err(KeyfortError::Session(format!(
                "session store is already open at {}",
                scratch.display()
            )));
        }

        let scratch = create_scratch_dir()?;
        if self.vault_path.exists() {
            let packed = read_vault(self.key.as_ref(), &self.vault_path)?;
            let restored = pack::unpack(&packed, &scratch)?;
            debug!(
                vault = %self.vault_path.display(),
                files = restored,
                "session vault restored into scratch directory"
            );
        } else {
            debug!(vault = %self.vault_path.display(), "no prior session vault; starting empty");
        }
        *state = StoreState::Open {
            scratch: scratch.clone(),
        };
        drop(state);

        if !self.flush_interval.is_zero() {
            let cancel = CancellationToken::new();
            self.spawn_flush_task(cancel.clone());
            self.cancel = Some(cancel);
        }

        info!(scratch = %scratch.display(), "session store opened");
        Ok(scratch)
    }

    /// Re-encrypt the current scratch contents into the vault file.
    ///
    /// Safe to call repeatedly; the pack is a snapshot read, so concurrent
    /// writes by the wrapped library land in the next flush.
    pub async fn flush(&self) -> Result<(), KeyfortError> {
        let state = self.state.lock().await;
        match &*state {
            StoreState::Open { scratch } => write_vault(self.key.as_ref(), scratch, &self.vault_path),
            StoreState::Closed => Err(KeyfortError::Session(
                "flush requires an open session store".to_string(),
            )),
        }
    }

    /// Final flush, then secure-wipe the scratch directory. Idempotent.
    pub async fn close(&mut self) -> Result<(), KeyfortError> {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        let mut state = self.state.lock().await;
        let scratch = match &*state {
            StoreState::Open { scratch } => scratch.clone(),
            StoreState::Closed => return Ok(()),
        };

        // The final flush must complete before anything is wiped.
        write_vault(self.key.as_ref(), &scratch, &self.vault_path)?;
        wipe::secure_wipe_dir(&scratch)?;
        *state = StoreState::Closed;

        info!(vault = %self.vault_path.display(), "session store closed and scratch wiped");
        Ok(())
    }

    /// Encrypt a plaintext directory into the vault without opening.
    ///
    /// Used by the migration flow to adopt an existing session directory.
    pub async fn import_plaintext(&self, source_dir: &Path) -> Result<(), KeyfortError> {
        let state = self.state.lock().await;
        if let StoreState::Open { .. } = &*state {
            return Err(KeyfortError::Session(
                "import_plaintext requires a closed session store".to_string(),
            ));
        }
        write_vault(self.key.as_ref(), source_dir, &self.vault_path)?;
        info!(
            source = %source_dir.display(),
            vault = %self.vault_path.display(),
            "plaintext session directory imported"
        );
        Ok(())
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    fn spawn_flush_task(&self, cancel: CancellationToken) {
        let state = Arc::clone(&self.state);
        let key = self.key.clone();
        let vault_path = self.vault_path.clone();
        let period = self.flush_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the immediate first tick; open() just wrote nothing new.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let state = state.lock().await;
                        if let StoreState::Open { scratch } = &*state {
                            if let Err(e) = write_vault(key.as_ref(), scratch, &vault_path) {
                                warn!(error = %e, "periodic session flush failed");
                            }
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("session flush task shutting down");
                        break;
                    }
                }
            }
        });
    }
}

/// Pack, gzip, encrypt, and atomically write one directory snapshot.
fn write_vault(key: &[u8], dir: &Path, vault_path: &Path) -> Result<(), KeyfortError> {
    let packed = pack::pack_dir(dir)?;
    let compressed = gzip(&packed)?;
    let parts = crypto::seal(key, &compressed)?;
    let blob = SessionBlob {
        version: BLOB_VERSION,
        iv: hex::encode(parts.iv),
        ciphertext: hex::encode(&parts.ciphertext),
        tag: hex::encode(parts.tag),
    };
    let json = serde_json::to_string_pretty(&blob)
        .map_err(|e| KeyfortError::Session(format!("failed to serialize session blob: {e}")))?;
    atomic::atomic_write(vault_path, json.as_bytes())
}

/// Read, decrypt, and decompress one session vault into pack bytes.
fn read_vault(key: &[u8], vault_path: &Path) -> Result<Zeroizing<Vec<u8>>, KeyfortError> {
    let content =
        std::fs::read_to_string(vault_path).map_err(|e| KeyfortError::io(vault_path, e))?;
    let blob: SessionBlob = serde_json::from_str(&content).map_err(|e| {
        KeyfortError::Session(format!(
            "malformed session vault at {}: {e}",
            vault_path.display()
        ))
    })?;
    if blob.version != BLOB_VERSION {
        return Err(KeyfortError::Session(format!(
            "unsupported session vault version {} at {}",
            blob.version,
            vault_path.display()
        )));
    }

    let iv: [u8; IV_LEN] = decode_hex_field(&blob.iv, "iv", vault_path)?
        .as_slice()
        .try_into()
        .map_err(|_| malformed_field("iv", vault_path))?;
    let tag: [u8; TAG_LEN] = decode_hex_field(&blob.tag, "tag", vault_path)?
        .as_slice()
        .try_into()
        .map_err(|_| malformed_field("tag", vault_path))?;
    let ciphertext = decode_hex_field(&blob.ciphertext, "ciphertext", vault_path)?;

    let compressed = crypto::open(key, &iv, &tag, &ciphertext)?;
    gunzip(&compressed)
}

fn decode_hex_field(value: &str, field: &str, path: &Path) -> Result<Vec<u8>, KeyfortError> {
    hex::decode(value).map_err(|_| malformed_field(field, path))
}

fn malformed_field(field: &str, path: &Path) -> KeyfortError {
    KeyfortError::Session(format!(
        "malformed {field} field in session vault at {}",
        path.display()
    ))
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, KeyfortError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| KeyfortError::Session(format!("gzip compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| KeyfortError::Session(format!("gzip compression failed: {e}")))
}

fn gunzip(data: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyfortError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Zeroizing::new(Vec::new());
    decoder
        .read_to_end(&mut out)
        .map_err(|e| KeyfortError::Session(format!("gzip decompression failed: {e}")))?;
    Ok(out)
}

/// Allocate a private scratch directory under the system temporary root
/// with owner-only permissions.
fn create_scratch_dir() -> Result<PathBuf, KeyfortError> {
    let mut suffix = [0u8; 8];
    crypto::random_bytes(&mut suffix)?;
    let dir = std::env::temp_dir().join(format!("keyfort-session-{}", hex::encode(suffix)));
    std::fs::create_dir(&dir).map_err(|e| KeyfortError::io(&dir, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
            .map_err(|e| KeyfortError::io(&dir, e))?;
    }
    Ok(dir)
}
