// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deep-walk substitution of `{ref:<id>}` markers inside call arguments.
//!
//! The walk is exhaustive over the JSON variant: every string is scanned,
//! arrays and objects are traversed recursively with key order preserved,
//! non-string leaves pass through unchanged. Unresolved references are left
//! intact, so a missing credential fails open at call time rather than at
//! resolution. A depth cap guards against stack abuse from crafted input.

use std::sync::LazyLock;

use keyfort_core::KeyfortError;
use regex::{Captures, Regex};
use serde_json::Value;

/// Maximum nesting depth before input is rejected as a protocol error.
pub const MAX_DEPTH: usize = 1024;

static REF_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{ref:(cred_[a-zA-Z0-9]+_[a-z0-9_]+_[0-9a-f]{4})\}").unwrap()
});

/// Replace every `{ref:<id>}` occurrence in every string of `value` with
/// the plaintext returned by `lookup`. Ids `lookup` cannot resolve keep
/// their original marker text.
pub fn resolve_references<F>(value: &Value, lookup: &F) -> Result<Value, KeyfortError>
where
    F: Fn(&str) -> Option<String>,
{
    walk(value, lookup, 0)
}

fn walk<F>(value: &Value, lookup: &F, depth: usize) -> Result<Value, KeyfortError>
where
    F: Fn(&str) -> Option<String>,
{
    if depth > MAX_DEPTH {
        return Err(KeyfortError::Protocol(format!(
            "arguments nested deeper than {MAX_DEPTH} levels"
        )));
    }
    match value {
        Value::String(s) => Ok(Value::String(resolve_str(s, lookup))),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk(item, lookup, depth + 1)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), walk(item, lookup, depth + 1)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_str<F>(s: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    REF_MARKER
        .replace_all(s, |caps: &Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
