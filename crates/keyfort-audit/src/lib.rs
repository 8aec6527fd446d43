// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only JSONL audit sink.
//!
//! One JSON object per line: `{ timestamp, method, tool, status, ...context }`.
//! Entries are appended in request order; each append is a single write of
//! the full line including the trailing newline, with the file opened in
//! append mode. No edits, no deletes, no rotation (rotation belongs to the
//! embedder). Timestamps are ISO-8601 and never run backwards within one
//! process.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use keyfort_core::KeyfortError;
use serde::{Deserialize, Serialize};

/// Outcome of one mediated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Blocked,
    RateLimited,
    Error,
}

/// One audit log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// ISO-8601 timestamp, millisecond precision.
    pub timestamp: String,
    /// The JSON-RPC method that produced this record.
    pub method: String,
    /// The tool named in the call.
    pub tool: String,
    /// Outcome.
    pub status: AuditStatus,
    /// Diagnostic context. Must never contain a secret.
    #[serde(flatten)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// Append-only writer for one audit file.
pub struct AuditWriter {
    path: PathBuf,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl AuditWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_stamp: Mutex::new(None),
        }
    }

    /// Append one record. Creates the enclosing directory if absent.
    pub fn append(
        &self,
        method: &str,
        tool: &str,
        status: AuditStatus,
        context: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), KeyfortError> {
        let record = AuditRecord {
            timestamp: self.next_timestamp(),
            method: method.to_string(),
            tool: tool.to_string(),
            status,
            context,
        };
        let mut line = serde_json::to_vec(&record)
            .map_err(|e| KeyfortError::Audit(format!("failed to serialize audit record: {e}")))?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| KeyfortError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| KeyfortError::io(&self.path, e))?;
        file.write_all(&line)
            .map_err(|e| KeyfortError::io(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Monotonic timestamp: never earlier than the previous record's, even
    /// if the wall clock steps backwards.
    fn next_timestamp(&self) -> String {
        let mut last = match self.last_stamp.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Utc::now();
        let stamped = match *last {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        *last = Some(stamped);
        stamped.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Read all records back from an audit file (test and tooling helper).
pub fn read_records(path: &Path) -> Result<Vec<AuditRecord>, KeyfortError> {
    let content = fs::read_to_string(path).map_err(|e| KeyfortError::io(path, e))?;
    content
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| KeyfortError::Audit(format!("malformed audit line: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let writer = AuditWriter::new(&path);

        writer
            .append("tools/call", "search", AuditStatus::Success, Default::default())
            .unwrap();
        writer
            .append("tools/call", "search", AuditStatus::Blocked, Default::default())
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));

        let records = read_records(&path).unwrap();
        assert_eq!(records[0].status, AuditStatus::Success);
        assert_eq!(records[1].status, AuditStatus::Blocked);
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/nested/audit.jsonl");
        let writer = AuditWriter::new(&path);
        writer
            .append("tools/list", "", AuditStatus::Success, Default::default())
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn timestamps_are_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let writer = AuditWriter::new(&path);

        for _ in 0..20 {
            writer
                .append("tools/call", "t", AuditStatus::Success, Default::default())
                .unwrap();
        }

        let records = read_records(&path).unwrap();
        for pair in records.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn context_fields_are_flattened_into_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let writer = AuditWriter::new(&path);

        let mut context = serde_json::Map::new();
        context.insert("error".to_string(), serde_json::json!("rate window full"));
        writer
            .append("tools/call", "limited", AuditStatus::RateLimited, context)
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(line["status"], "rate_limited");
        assert_eq!(line["error"], "rate window full");
        assert_eq!(line["tool"], "limited");
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AuditStatus::RateLimited).unwrap(),
            "\"rate_limited\""
        );
    }
}
