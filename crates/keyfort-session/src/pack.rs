// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flat pack format for a one-level directory of small files.
//!
//! Frame layout: `[u32be name_len][name bytes][u32be data_len][data bytes]`
//! repeated. No file modes, no timestamps; those are not part of session
//! semantics. Pack writes entries in a stable order (sorted by name).
//! Unpack is path-traversal-safe: entries with separators, a leading dot,
//! or overlong names are skipped, and a truncated or overlong length field
//! ends the stream cleanly instead of panicking.

use std::fs;
use std::path::Path;

use keyfort_core::KeyfortError;
use tracing::warn;

use keyfort_vault::atomic;

/// Maximum packed filename length in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Pack the regular files of one directory into a single buffer.
///
/// Subdirectories and other non-file entries are ignored. Names must be
/// valid UTF-8 and at most [`MAX_NAME_LEN`] bytes.
pub fn pack_dir(dir: &Path) -> Result<Vec<u8>, KeyfortError> {
    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| KeyfortError::io(dir, e))? {
        let entry = entry.map_err(|e| KeyfortError::io(dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| KeyfortError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }

        let name = entry.file_name().into_string().map_err(|_| {
            KeyfortError::Session(format!(
                "non-UTF-8 filename in session directory {}",
                dir.display()
            ))
        })?;
        if name.len() > MAX_NAME_LEN {
            return Err(KeyfortError::Session(format!(
                "filename exceeds {MAX_NAME_LEN} bytes: {name:?}"
            )));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(KeyfortError::Session(format!(
                "filename contains a path separator: {name:?}"
            )));
        }

        let path = entry.path();
        let data = fs::read(&path).map_err(|e| KeyfortError::io(&path, e))?;
        entries.push((name, data));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let total: usize = entries.iter().map(|(n, d)| 8 + n.len() + d.len()).sum();
    let mut out = Vec::with_capacity(total);
    for (name, data) in &entries {
        out.extend_from_slice(&(name.len() as u32).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
    }
    Ok(out)
}

/// Unpack a buffer produced by [`pack_dir`] into `dest`.
///
/// Returns the number of files written. Unsafe entries are skipped, not
/// fatal: a partially corrupted archive should still yield its good files.
pub fn unpack(buf: &[u8], dest: &Path) -> Result<usize, KeyfortError> {
    let mut offset = 0usize;
    let mut written = 0usize;

    while let Some(frame) = next_frame(buf, &mut offset) {
        let Frame { name_bytes, data } = frame;

        let Ok(name) = std::str::from_utf8(name_bytes) else {
            warn!("skipping packed entry with non-UTF-8 name");
            continue;
        };
        if !is_safe_name(name) {
            warn!(name = %name, "skipping unsafe packed entry");
            continue;
        }

        let path = dest.join(name);
        fs::write(&path, data).map_err(|e| KeyfortError::io(&path, e))?;
        atomic::set_owner_only(&path)?;
        written += 1;
    }

    Ok(written)
}

struct Frame<'a> {
    name_bytes: &'a [u8],
    data: &'a [u8],
}

/// Read the next frame, advancing `offset`. Returns `None` when the buffer
/// is exhausted or a length field points past the end (clean truncation).
/// A zero-length name still parses as a frame; the caller skips it like any
/// other unsafe name, so the rest of the stream survives.
fn next_frame<'a>(buf: &'a [u8], offset: &mut usize) -> Option<Frame<'a>> {
    let name_len = read_u32(buf, offset)? as usize;
    if name_len > buf.len().saturating_sub(*offset) {
        return None;
    }
    let name_bytes = &buf[*offset..*offset + name_len];
    *offset += name_len;

    let data_len = read_u32(buf, offset)? as usize;
    if data_len > buf.len().saturating_sub(*offset) {
        return None;
    }
    let data = &buf[*offset..*offset + data_len];
    *offset += data_len;

    Some(Frame { name_bytes, data })
}

fn read_u32(buf: &[u8], offset: &mut usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    if end > buf.len() {
        return None;
    }
    let value = u32::from_be_bytes(buf[*offset..end].try_into().ok()?);
    *offset = end;
    Some(value)
}

/// A name is safe when it is a bare filename: no separators, no leading
/// dot, within the length bound.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
}
