// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-RPC 2.0 wire types for the line-delimited stdio transport.
//!
//! Requests are parsed leniently (every field optional) so the dispatcher
//! can answer malformed input with a structured `-32600` instead of a
//! transport failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Malformed JSON or missing required fields.
pub const INVALID_REQUEST: i64 = -32600;
/// Unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Catch-all handler failure. The `data` field must never leak secrets.
pub const INTERNAL_ERROR: i64 = -32603;
/// Policy denial (blocked tool).
pub const POLICY_DENIED: i64 = -32000;
/// Rate limit exceeded.
pub const RATE_LIMITED: i64 = 429;

/// One incoming request line, parsed leniently.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
}

/// One outgoing response line.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// Structured error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Serialize to one line. Serialization of these shapes cannot fail;
    /// a broken response is replaced by a minimal internal error.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{{\"code\":{INTERNAL_ERROR},\"message\":\"Internal error\"}}}}"
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_with_all_fields() {
        let request: JsonRpcRequest = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"t"}}"#,
        )
        .unwrap();
        assert_eq!(request.jsonrpc.as_deref(), Some("2.0"));
        assert_eq!(request.id, Some(serde_json::json!(1)));
        assert_eq!(request.method.as_deref(), Some("tools/call"));
        assert_eq!(request.params["name"], "t");
    }

    #[test]
    fn request_parses_with_missing_fields() {
        let request: JsonRpcRequest = serde_json::from_str(r#"{"method":"x"}"#).unwrap();
        assert!(request.jsonrpc.is_none());
        assert!(request.id.is_none());
        assert!(request.params.is_null());
    }

    #[test]
    fn success_response_omits_error() {
        let line =
            JsonRpcResponse::success(serde_json::json!(7), serde_json::json!({"ok": true}))
                .to_line();
        assert!(line.contains("\"result\""));
        assert!(!line.contains("\"error\""));
        assert!(line.contains("\"id\":7"));
    }

    #[test]
    fn failure_response_carries_code_and_message() {
        let line = JsonRpcResponse::failure(
            serde_json::json!(3),
            POLICY_DENIED,
            "Tool x is blocked by policy",
        )
        .to_line();
        assert!(line.contains("-32000"));
        assert!(line.contains("blocked by policy"));
        assert!(!line.contains("\"result\""));
    }
}
