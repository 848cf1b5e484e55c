//! End-to-end pipeline scenarios
//!
//! Each test assembles a fresh server so the behavior counters start clean.

use serde_json::{json, Value};

use mcpwarden::pipeline::ValidationContext;
use mcpwarden::policy::tools::{ArgSpec, ToolRegistry, ToolSpec};
use mcpwarden::policy::ResourcePolicy;
use mcpwarden::protocol::mcp::ParamKind;
use mcpwarden::sanitize::ErrorSanitizer;
use mcpwarden::server::{SecureMcpServer, ServerInfo, ServerOptions};
use mcpwarden::{Severity, ViolationType};

fn registry() -> ToolRegistry {
    ToolRegistry::new()
        .with(ToolSpec::new("debug-echo").with_arg("text", ArgSpec::required(ParamKind::String)))
        .with(
            ToolSpec::new("debug-file-reader")
                .with_arg("path", ArgSpec::required(ParamKind::String)),
        )
}

fn server_with(options: ServerOptions) -> SecureMcpServer {
    SecureMcpServer::new(ServerInfo::new("integration", "0.0.0"), options)
        .expect("server must build")
}

fn server() -> SecureMcpServer {
    server_with(ServerOptions {
        tool_registry: registry(),
        resource_policy: ResourcePolicy::builder()
            .allow_schemes(["file", "https"])
            .root_dir("/srv/data")
            .build()
            .unwrap(),
        ..Default::default()
    })
}

fn validate(server: &SecureMcpServer, message: Value) -> mcpwarden::Verdict {
    server
        .pipeline()
        .validate(&message, &mut ValidationContext::now())
}

#[test]
fn scenario_benign_tool_call_passes() {
    let server = server();
    let message = json!({
        "jsonrpc": "2.0", "method": "tools/call", "id": 1,
        "params": {"name": "debug-echo", "arguments": {"text": "hello"}}
    });
    let verdict = validate(&server, message);
    assert!(verdict.passed, "reason: {}", verdict.reason);
    assert_eq!(verdict.severity, Severity::None);
}

#[test]
fn scenario_triple_encoded_traversal_blocked_at_content() {
    let server = server();
    let message = json!({
        "jsonrpc": "2.0", "method": "tools/call", "id": 2,
        "params": {"name": "debug-file-reader",
                   "arguments": {"path": "%252e%252e%252f%252e%252e%252fetc%252fpasswd"}}
    });
    let verdict = validate(&server, message);
    assert!(!verdict.passed);
    assert_eq!(verdict.layer, "Layer2-Content");
    assert_eq!(verdict.violation, ViolationType::PathTraversal);
    assert_eq!(ErrorSanitizer::error_code(verdict.violation), -32602);
}

#[test]
fn scenario_structure_failure_precedes_content() {
    let server = server();
    // Missing jsonrpc, and the params would also trip content checks -
    // structure must win
    let message = json!({
        "method": "tools/call", "id": "abc",
        "params": {"name": "debug-echo", "arguments": {"path": "../../etc/passwd"}}
    });
    let verdict = validate(&server, message);
    assert!(!verdict.passed);
    assert!(verdict.layer.to_lowercase().contains("structure"));
    assert_eq!(verdict.violation, ViolationType::InvalidProtocol);
}

#[test]
fn scenario_burst_of_fifteen_blocks_at_least_seven() {
    let server = server_with(ServerOptions {
        tool_registry: registry(),
        burst_threshold: 8,
        ..Default::default()
    });
    let message = json!({
        "jsonrpc": "2.0", "method": "tools/call", "id": 1,
        "params": {"name": "debug-echo", "arguments": {"text": "hi"}}
    });

    let mut blocked = Vec::new();
    for _ in 0..15 {
        let verdict = validate(&server, message.clone());
        if !verdict.passed {
            blocked.push(verdict);
        }
    }
    assert!(
        blocked.len() >= 7,
        "expected at least 7 blocked, got {}",
        blocked.len()
    );
    for verdict in &blocked {
        assert!(matches!(
            verdict.violation,
            ViolationType::RateLimitExceeded | ViolationType::BurstActivity
        ));
        assert_eq!(verdict.severity, Severity::High);
    }
}

#[test]
fn scenario_tool_contract_violation() {
    let server = server();
    let message = json!({
        "jsonrpc": "2.0", "method": "tools/call", "id": 3,
        "params": {"name": "debug-file-reader", "arguments": {}}
    });
    let verdict = validate(&server, message);
    assert!(!verdict.passed);
    assert!(verdict.layer.to_lowercase().contains("semantics"));
    assert_eq!(verdict.violation, ViolationType::MissingRequiredParam);
}

#[test]
fn scenario_ssrf_against_cloud_metadata() {
    let server = server();
    let message = json!({
        "jsonrpc": "2.0", "method": "tools/call", "id": 4,
        "params": {"name": "debug-echo",
                   "arguments": {"text": "fetch", "url": "http://169.254.169.254/latest/meta-data/iam/security-credentials/"}}
    });
    let verdict = validate(&server, message);
    assert!(!verdict.passed);
    assert_eq!(verdict.violation, ViolationType::SsrfAttempt);
}

#[test]
fn every_message_gets_exactly_one_verdict() {
    let server = server();
    let messages = vec![
        json!(null),
        json!({}),
        json!([1, 2, 3]),
        json!({"jsonrpc": "2.0", "method": "ping", "id": 1}),
        json!({"jsonrpc": "2.0", "method": "tools/call", "id": 2,
               "params": {"name": "debug-echo", "arguments": {"text": "ok"}}}),
        json!({"jsonrpc": "1.0", "method": "x", "id": 3}),
    ];
    for message in messages {
        // Must terminate and return a verdict for any input
        let verdict = validate(&server, message.clone());
        assert!(!verdict.layer.is_empty(), "message: {}", message);
    }
}

#[test]
fn canonicalization_is_idempotent_on_pipeline_inputs() {
    use mcpwarden::canonicalize;
    let samples = [
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"path":"%252e%252e%252f"}}"#,
        r#"{"text":"&amp;lt;b&amp;gt;"}"#,
        "plain",
    ];
    for s in samples {
        assert_eq!(canonicalize(&canonicalize(s)), canonicalize(s));
    }
}

#[test]
fn unknown_method_rejected_semantically() {
    let server = server();
    let verdict = validate(
        &server,
        json!({"jsonrpc": "2.0", "method": "tools/uninstall", "id": 5}),
    );
    assert!(!verdict.passed);
    assert_eq!(verdict.violation, ViolationType::InvalidMcpMethod);
}

#[test]
fn resource_read_policy_end_to_end() {
    let server = server();

    let ok = validate(
        &server,
        json!({"jsonrpc": "2.0", "method": "resources/read", "id": 6,
               "params": {"uri": "file:///srv/data/notes.txt"}}),
    );
    assert!(ok.passed, "reason: {}", ok.reason);

    let escape = validate(
        &server,
        json!({"jsonrpc": "2.0", "method": "resources/read", "id": 7,
               "params": {"uri": "file:///srv/data/../secrets.txt"}}),
    );
    assert!(!escape.passed);
    // The traversal is caught by content patterns before the semantic layer
    // sees the path; either way the request must not survive
    assert!(matches!(
        escape.violation,
        ViolationType::PathTraversal | ViolationType::ResourcePolicyViolation
    ));
}
