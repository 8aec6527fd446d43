// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The mediated tool proxy: a line-delimited JSON-RPC 2.0 stdio server.
//!
//! One request per line, one response per line, single-threaded dispatch.
//! Methods: `tools/list`, `resources/list`, `tools/call`. For `tools/call`
//! the processing order is: blocklist check, rate check, reference
//! resolution, result construction, redaction of the serialized response,
//! audit append. Every `tools/call` produces exactly one audit record.

use std::sync::Arc;

use keyfort_audit::{AuditStatus, AuditWriter};
use keyfort_config::model::{ResourceDecl, ToolDecl};
use keyfort_core::KeyfortError;
use keyfort_vault::Vault;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::policy::{ProxyPolicy, RateLimiter};
use crate::redact::redact;
use crate::resolve::resolve_references;
use crate::rpc::{
    JsonRpcRequest, JsonRpcResponse, INVALID_REQUEST, METHOD_NOT_FOUND, POLICY_DENIED,
    RATE_LIMITED,
};

/// The proxy server state: a shared read-only vault handle, the static
/// policy, per-tool rate state, and the audit sink.
pub struct ToolProxy {
    vault: Arc<Vault>,
    policy: ProxyPolicy,
    limiter: RateLimiter,
    audit: AuditWriter,
    tools: Vec<ToolDecl>,
    resources: Vec<ResourceDecl>,
}

impl ToolProxy {
    pub fn new(
        vault: Arc<Vault>,
        policy: ProxyPolicy,
        audit: AuditWriter,
        tools: Vec<ToolDecl>,
        resources: Vec<ResourceDecl>,
    ) -> Self {
        let limiter = RateLimiter::new(policy.rate_limit, policy.rate_window);
        Self {
            vault,
            policy,
            limiter,
            audit,
            tools,
            resources,
        }
    }

    /// Serve requests until the input stream closes.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> Result<(), KeyfortError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(
            tools = self.tools.len(),
            blocked = self.policy.blocked_tools.len(),
            "tool proxy serving"
        );
        let mut lines = reader.lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| KeyfortError::Protocol(format!("request stream read failed: {e}")))?
        {
            if line.trim().is_empty() {
                continue;
            }
            let response = self.handle_line(&line);
            writer
                .write_all(response.as_bytes())
                .await
                .map_err(|e| KeyfortError::Protocol(format!("response write failed: {e}")))?;
            writer
                .write_all(b"\n")
                .await
                .map_err(|e| KeyfortError::Protocol(format!("response write failed: {e}")))?;
            writer
                .flush()
                .await
                .map_err(|e| KeyfortError::Protocol(format!("response write failed: {e}")))?;
        }
        info!("tool proxy input closed, shutting down");
        Ok(())
    }

    /// Dispatch one request line to one response line.
    pub fn handle_line(&mut self, line: &str) -> String {
        let Ok(request) = serde_json::from_str::<JsonRpcRequest>(line) else {
            return JsonRpcResponse::failure(Value::Null, INVALID_REQUEST, "Invalid Request")
                .to_line();
        };

        let Some(id) = request.id.clone() else {
            return JsonRpcResponse::failure(Value::Null, INVALID_REQUEST, "Invalid Request")
                .to_line();
        };
        if request.jsonrpc.as_deref() != Some("2.0") {
            return JsonRpcResponse::failure(id, INVALID_REQUEST, "Invalid Request").to_line();
        }

        match request.method.as_deref() {
            Some("tools/list") => {
                JsonRpcResponse::success(id, json!({ "tools": self.tools })).to_line()
            }
            Some("resources/list") => {
                JsonRpcResponse::success(id, json!({ "resources": self.resources })).to_line()
            }
            Some("tools/call") => self.handle_tools_call(id, &request.params),
            Some(other) => {
                debug!(method = %other, "unknown method");
                JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
                    .to_line()
            }
            None => JsonRpcResponse::failure(id, INVALID_REQUEST, "Invalid Request").to_line(),
        }
    }

    fn handle_tools_call(&mut self, id: Value, params: &Value) -> String {
        let Some(tool) = params.get("name").and_then(Value::as_str) else {
            self.audit("unknown", AuditStatus::Error, context("missing tool name"));
            return JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                "tools/call requires a string 'name' field",
            )
            .to_line();
        };
        let tool = tool.to_string();

        // 1. Blocklist.
        if self.policy.is_blocked(&tool) {
            self.audit(&tool, AuditStatus::Blocked, Default::default());
            return JsonRpcResponse::failure(
                id,
                POLICY_DENIED,
                format!("Tool {tool} is blocked by policy"),
            )
            .to_line();
        }

        // 2. Rate window.
        if !self.limiter.check(&tool) {
            self.audit(&tool, AuditStatus::RateLimited, Default::default());
            return JsonRpcResponse::failure(id, RATE_LIMITED, "Rate limit exceeded").to_line();
        }

        // 3. Reference resolution over the argument tree.
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let resolved = match resolve_references(&arguments, &|ref_id| self.lookup_secret(ref_id)) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.audit(&tool, AuditStatus::Error, context(&e.to_string()));
                return redact(
                    &JsonRpcResponse::failure(id, INVALID_REQUEST, e.to_string()).to_line(),
                );
            }
        };

        // 4. Result construction. Downstream dispatch is the embedder's
        //    concern; the proxy's contract is the mediated parameter set.
        let result = json!({
            "success": true,
            "tool": tool.as_str(),
            "params": resolved,
        });

        // 5 + 6. Redact the serialized response, then audit.
        let line = redact(&JsonRpcResponse::success(id, result).to_line());
        self.audit(&tool, AuditStatus::Success, Default::default());
        line
    }

    fn lookup_secret(&self, reference_id: &str) -> Option<String> {
        match self.vault.get(reference_id) {
            Ok(Some((_, plaintext))) => String::from_utf8(plaintext.to_vec()).ok(),
            Ok(None) => {
                debug!(id = %reference_id, "unresolved credential reference left intact");
                None
            }
            Err(e) => {
                warn!(id = %reference_id, error = %e, "credential lookup failed");
                None
            }
        }
    }

    fn audit(
        &self,
        tool: &str,
        status: AuditStatus,
        context: serde_json::Map<String, Value>,
    ) {
        if let Err(e) = self.audit.append("tools/call", tool, status, context) {
            warn!(error = %e, "audit append failed");
        }
    }
}

fn context(message: &str) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert("error".to_string(), Value::String(message.to_string()));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfort_audit::read_records;
    use keyfort_config::model::ProxyConfig;
    use keyfort_core::CredentialType;
    use keyfort_vault::MasterKey;
    use std::path::Path;
    use std::time::Duration;

    struct Fixture {
        proxy: ToolProxy,
        audit_path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    fn fixture(config: ProxyConfig, seed: &[(&str, CredentialType, &[u8])]) -> (Fixture, Vec<String>) {
        let dir = tempfile::tempdir().unwrap();
        let mut vault =
            Vault::open(MasterKey::generate().unwrap(), dir.path().join("vault.json")).unwrap();
        let mut ids = Vec::new();
        for (service, cred_type, value) in seed {
            ids.push(vault.import(service, *cred_type, value).unwrap().id);
        }

        let audit_path = dir.path().join("audit.jsonl");
        let proxy = ToolProxy::new(
            Arc::new(vault),
            ProxyPolicy::from_config(&config),
            AuditWriter::new(&audit_path),
            config.tools.clone(),
            config.resources.clone(),
        );
        (
            Fixture {
                proxy,
                audit_path,
                _dir: dir,
            },
            ids,
        )
    }

    fn call_line(id: u64, name: &str, arguments: Value) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
        .to_string()
    }

    fn statuses(path: &Path) -> Vec<AuditStatus> {
        read_records(path).unwrap().iter().map(|r| r.status).collect()
    }

    #[test]
    fn malformed_json_is_invalid_request_with_null_id() {
        let (mut fx, _) = fixture(ProxyConfig::default(), &[]);
        let response: Value =
            serde_json::from_str(&fx.proxy.handle_line("{ not json")).unwrap();
        assert_eq!(response["error"]["code"], INVALID_REQUEST);
        assert!(response["id"].is_null());
    }

    #[test]
    fn missing_id_is_invalid_request() {
        let (mut fx, _) = fixture(ProxyConfig::default(), &[]);
        let line = json!({"jsonrpc": "2.0", "method": "tools/list"}).to_string();
        let response: Value = serde_json::from_str(&fx.proxy.handle_line(&line)).unwrap();
        assert_eq!(response["error"]["code"], INVALID_REQUEST);
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let (mut fx, _) = fixture(ProxyConfig::default(), &[]);
        let line =
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/exec"}).to_string();
        let response: Value = serde_json::from_str(&fx.proxy.handle_line(&line)).unwrap();
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("tools/exec"));
    }

    #[test]
    fn tools_list_returns_declared_tools() {
        let config = ProxyConfig {
            tools: vec![ToolDecl {
                name: "search".into(),
                description: "Web search".into(),
            }],
            ..Default::default()
        };
        let (mut fx, _) = fixture(config, &[]);
        let line = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string();
        let response: Value = serde_json::from_str(&fx.proxy.handle_line(&line)).unwrap();
        assert_eq!(response["result"]["tools"][0]["name"], "search");
    }

    #[test]
    fn resources_list_returns_declared_resources() {
        let config = ProxyConfig {
            resources: vec![ResourceDecl {
                uri: "memory://notes".into(),
                name: "notes".into(),
            }],
            ..Default::default()
        };
        let (mut fx, _) = fixture(config, &[]);
        let line =
            json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}).to_string();
        let response: Value = serde_json::from_str(&fx.proxy.handle_line(&line)).unwrap();
        assert_eq!(response["result"]["resources"][0]["uri"], "memory://notes");
    }

    #[test]
    fn blocked_tool_is_denied_and_audited() {
        let config = ProxyConfig {
            blocked_tools: vec!["dangerous-tool".into()],
            ..Default::default()
        };
        let (mut fx, _) = fixture(config, &[]);

        let response: Value = serde_json::from_str(
            &fx.proxy
                .handle_line(&call_line(1, "dangerous-tool", json!({}))),
        )
        .unwrap();
        assert_eq!(response["error"]["code"], POLICY_DENIED);
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("blocked by policy"));

        assert_eq!(statuses(&fx.audit_path), vec![AuditStatus::Blocked]);
    }

    #[test]
    fn rate_limit_allows_two_then_rejects_the_third() {
        let config = ProxyConfig {
            rate_limit: 2,
            rate_window_secs: 60,
            ..Default::default()
        };
        let (mut fx, _) = fixture(config, &[]);

        let r1: Value = serde_json::from_str(
            &fx.proxy.handle_line(&call_line(1, "limited-tool", json!({}))),
        )
        .unwrap();
        let r2: Value = serde_json::from_str(
            &fx.proxy.handle_line(&call_line(2, "limited-tool", json!({}))),
        )
        .unwrap();
        let r3: Value = serde_json::from_str(
            &fx.proxy.handle_line(&call_line(3, "limited-tool", json!({}))),
        )
        .unwrap();

        assert_eq!(r1["result"]["success"], true);
        assert_eq!(r2["result"]["success"], true);
        assert_eq!(r3["error"]["code"], RATE_LIMITED);
        assert_eq!(r3["error"]["message"], "Rate limit exceeded");

        assert_eq!(
            statuses(&fx.audit_path),
            vec![
                AuditStatus::Success,
                AuditStatus::Success,
                AuditStatus::RateLimited
            ]
        );
    }

    #[test]
    fn references_resolve_and_flow_back_in_the_response() {
        let (mut fx, ids) = fixture(
            ProxyConfig::default(),
            &[("test", CredentialType::ApiKey, b"injected-secret-value")],
        );
        let marker = format!("{{ref:{}}}", ids[0]);

        let response: Value = serde_json::from_str(
            &fx.proxy
                .handle_line(&call_line(1, "auth", json!({ "token": marker }))),
        )
        .unwrap();

        // The literal value does not match any declared secret shape, so it
        // survives redaction verbatim.
        assert_eq!(response["result"]["params"]["token"], "injected-secret-value");
        assert_eq!(statuses(&fx.audit_path), vec![AuditStatus::Success]);
    }

    #[test]
    fn secret_shaped_response_content_is_redacted() {
        let (mut fx, ids) = fixture(
            ProxyConfig::default(),
            &[(
                "openai",
                CredentialType::ApiKey,
                b"sk-abcdefghijklmnopqrstuvwxyz123456",
            )],
        );
        let marker = format!("{{ref:{}}}", ids[0]);

        let raw = fx
            .proxy
            .handle_line(&call_line(1, "auth", json!({ "token": marker })));
        assert!(!raw.contains("sk-abcdefghijklmnop"));
        assert!(raw.contains("[REDACTED]"));
    }

    #[test]
    fn unresolved_references_are_left_intact_in_the_call() {
        let (mut fx, _) = fixture(ProxyConfig::default(), &[]);
        let response: Value = serde_json::from_str(&fx.proxy.handle_line(&call_line(
            1,
            "auth",
            json!({ "token": "{ref:cred_ghost_api_key_0000}" }),
        )))
        .unwrap();
        assert_eq!(
            response["result"]["params"]["token"],
            "{ref:cred_ghost_api_key_0000}"
        );
    }

    #[test]
    fn deeply_nested_wire_input_is_invalid_request() {
        // serde_json's own recursion limit rejects pathological nesting at
        // the parse boundary, well before the resolver's 1024-level cap
        // (which guards programmatic callers; see resolve::tests).
        let (mut fx, _) = fixture(ProxyConfig::default(), &[]);
        let mut nested = json!("leaf");
        for _ in 0..1100 {
            nested = json!([nested]);
        }
        let response: Value = serde_json::from_str(
            &fx.proxy.handle_line(&call_line(1, "deep", nested)),
        )
        .unwrap();
        assert_eq!(response["error"]["code"], INVALID_REQUEST);
    }

    #[test]
    fn audit_records_appear_in_request_order_with_monotonic_timestamps() {
        let config = ProxyConfig {
            blocked_tools: vec!["blocked".into()],
            ..Default::default()
        };
        let (mut fx, _) = fixture(config, &[]);

        fx.proxy.handle_line(&call_line(1, "first", json!({})));
        fx.proxy.handle_line(&call_line(2, "blocked", json!({})));
        fx.proxy.handle_line(&call_line(3, "third", json!({})));

        let records = read_records(&fx.audit_path).unwrap();
        let tools: Vec<&str> = records.iter().map(|r| r.tool.as_str()).collect();
        assert_eq!(tools, ["first", "blocked", "third"]);
        for pair in records.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn run_serves_line_delimited_requests_over_a_stream() {
        let (mut fx, _) = fixture(ProxyConfig::default(), &[]);

        let input = format!(
            "{}\n{}\n",
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            call_line(2, "echo", json!({"msg": "hi"})),
        );
        let reader = tokio::io::BufReader::new(input.as_bytes());
        let mut output: Vec<u8> = Vec::new();

        fx.proxy.run(reader, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], 1);
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["id"], 2);
        assert_eq!(second["result"]["params"]["msg"], "hi");
    }

    #[test]
    fn rate_limiter_window_is_configurable() {
        let config = ProxyConfig {
            rate_limit: 1,
            rate_window_secs: 1,
            ..Default::default()
        };
        let policy = ProxyPolicy::from_config(&config);
        assert_eq!(policy.rate_window, Duration::from_secs(1));
        assert_eq!(policy.rate_limit, 1);
    }
}
