//! Layer 1 - structure
//!
//! JSON-RPC 2.0 shape, size and encoding hygiene, and MCP method-specific
//! required fields. Checks run in a fixed order and the first failure is
//! returned.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::pipeline::context::ValidationContext;
use crate::pipeline::result::{LayerResult, Severity, ViolationType};
use crate::protocol::mcp::MethodTable;

use super::ValidationLayer;

pub const MAX_METHOD_LENGTH: usize = 100;

static METHOD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_/-]+$").expect("method name regex"));

/// Size and fan-out limits for the structure layer.
#[derive(Debug, Clone)]
pub struct StructureConfig {
    pub min_bytes: usize,
    pub max_bytes: usize,
    pub max_params: usize,
    pub max_string_length: usize,
    pub max_control_chars: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            min_bytes: 10,
            max_bytes: 50_000,
            max_params: 20,
            max_string_length: 5_000,
            max_control_chars: 10,
        }
    }
}

pub struct StructureLayer {
    config: StructureConfig,
    methods: Arc<MethodTable>,
}

impl StructureLayer {
    pub fn new(config: StructureConfig, methods: Arc<MethodTable>) -> Self {
        Self { config, methods }
    }

    fn check_method(&self, message: &Value) -> Option<LayerResult> {
        let method = match message.get("method") {
            Some(Value::String(m)) => m,
            Some(_) => {
                return Some(LayerResult::block(
                    Severity::High,
                    ViolationType::InvalidMethod,
                    "method must be a string",
                ))
            }
            None => {
                return Some(LayerResult::block(
                    Severity::High,
                    ViolationType::InvalidMethod,
                    "method is required",
                ))
            }
        };
        if method.len() > MAX_METHOD_LENGTH {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::InvalidMethod,
                format!("method exceeds {} characters", MAX_METHOD_LENGTH),
            ));
        }
        if !METHOD_NAME.is_match(method) {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::InvalidMethod,
                "method contains disallowed characters",
            ));
        }
        None
    }

    fn check_hygiene(&self, message: &Value) -> Option<LayerResult> {
        let mut strings = Vec::new();
        collect_strings(message, &mut strings);

        let mut control_chars = 0usize;
        for s in &strings {
            if s.contains('\0') {
                return Some(LayerResult::block(
                    Severity::Critical,
                    ViolationType::DangerousEncoding,
                    "message contains a null byte",
                ));
            }
            for ch in s.chars() {
                if is_dangerous_invisible(ch) {
                    return Some(LayerResult::block(
                        Severity::High,
                        ViolationType::SuspiciousEncoding,
                        format!("message contains invisible unicode U+{:04X}", ch as u32),
                    ));
                }
                if ch.is_control() && !matches!(ch, '\n' | '\r' | '\t') {
                    control_chars += 1;
                }
            }
        }
        if control_chars > self.config.max_control_chars {
            return Some(LayerResult::block(
                Severity::Medium,
                ViolationType::SuspiciousEncoding,
                format!(
                    "message contains {} control characters (limit {})",
                    control_chars, self.config.max_control_chars
                ),
            ));
        }
        None
    }

    fn check_size(&self, serialized_len: usize) -> Option<LayerResult> {
        if serialized_len > self.config.max_bytes {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::SizeLimitExceeded,
                format!(
                    "message is {} bytes (limit {})",
                    serialized_len, self.config.max_bytes
                ),
            ));
        }
        if serialized_len < self.config.min_bytes {
            return Some(LayerResult::block(
                Severity::Medium,
                ViolationType::MalformedMessage,
                format!(
                    "message is {} bytes (minimum {})",
                    serialized_len, self.config.min_bytes
                ),
            ));
        }
        None
    }

    fn check_params(&self, message: &Value) -> Option<LayerResult> {
        let params = message.get("params")?;
        let entries = match params {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => {
                return Some(LayerResult::block(
                    Severity::High,
                    ViolationType::InvalidSchema,
                    "params must be an object or array",
                ))
            }
        };
        if entries > self.config.max_params {
            return Some(LayerResult::block(
                Severity::Medium,
                ViolationType::ParamLimitExceeded,
                format!(
                    "params has {} entries (limit {})",
                    entries, self.config.max_params
                ),
            ));
        }
        if let Some(len) = longest_string(params) {
            if len > self.config.max_string_length {
                return Some(LayerResult::block(
                    Severity::Medium,
                    ViolationType::StringLimitExceeded,
                    format!(
                        "a string parameter is {} characters (limit {})",
                        len, self.config.max_string_length
                    ),
                ));
            }
        }
        None
    }

    fn check_mcp_required(&self, message: &Value) -> Option<LayerResult> {
        let method = message.get("method")?.as_str()?;
        let params = message.get("params");
        let (name, kind, present) = self.methods.missing_required(method, params)?;
        let reason = if present {
            format!("parameter '{}' must be a {}", name, kind.as_str())
        } else {
            format!("required parameter '{}' is missing", name)
        };
        Some(LayerResult::block(
            Severity::High,
            ViolationType::MissingRequiredParam,
            reason,
        ))
    }
}

impl ValidationLayer for StructureLayer {
    fn name(&self) -> &str {
        "Layer1-Structure"
    }

    fn validate(&self, message: &Value, _ctx: &mut ValidationContext) -> LayerResult {
        if message.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return LayerResult::block(
                Severity::Critical,
                ViolationType::InvalidProtocol,
                "jsonrpc must be \"2.0\"",
            );
        }
        if let Some(result) = self.check_method(message) {
            return result;
        }
        match message.get("id") {
            None | Some(Value::String(_)) | Some(Value::Number(_)) | Some(Value::Null) => {}
            Some(_) => {
                return LayerResult::block(
                    Severity::High,
                    ViolationType::InvalidSchema,
                    "id must be a string, number, or null",
                )
            }
        }
        if let Some(result) = self.check_hygiene(message) {
            return result;
        }
        let serialized_len = serde_json::to_string(message).map(|s| s.len()).unwrap_or(0);
        if let Some(result) = self.check_size(serialized_len) {
            return result;
        }
        if let Some(result) = self.check_params(message) {
            return result;
        }
        if let Some(result) = self.check_mcp_required(message) {
            return result;
        }
        LayerResult::Pass
    }
}

/// Keys and string leaves, recursively.
fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                out.push(key);
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

/// Longest string leaf (in chars) anywhere under a value.
fn longest_string(value: &Value) -> Option<usize> {
    let mut strings = Vec::new();
    collect_strings(value, &mut strings);
    strings.iter().map(|s| s.chars().count()).max()
}

fn is_dangerous_invisible(ch: char) -> bool {
    matches!(
        ch as u32,
        0x200B..=0x200F | 0x202A..=0x202E | 0x2060..=0x2064 | 0x2066..=0x2069 | 0xFEFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer() -> StructureLayer {
        StructureLayer::new(StructureConfig::default(), Arc::new(MethodTable::standard()))
    }

    fn validate(message: Value) -> LayerResult {
        layer().validate(&message, &mut ValidationContext::now())
    }

    fn blocked_with(message: Value, violation: ViolationType) {
        match validate(message) {
            LayerResult::Block(b) => assert_eq!(b.violation, violation, "reason: {}", b.reason),
            LayerResult::Pass => panic!("expected {:?}, message passed", violation),
        }
    }

    #[test]
    fn valid_request_passes() {
        let msg = json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "id": 1,
            "params": {"name": "debug-echo", "arguments": {"text": "hello"}}
        });
        assert!(validate(msg).is_pass());
    }

    #[test]
    fn missing_jsonrpc_is_invalid_protocol() {
        blocked_with(
            json!({"method": "tools/call", "id": "abc", "params": {"name": "debug-echo"}}),
            ViolationType::InvalidProtocol,
        );
    }

    #[test]
    fn wrong_jsonrpc_version() {
        blocked_with(
            json!({"jsonrpc": "1.0", "method": "ping", "id": 1}),
            ViolationType::InvalidProtocol,
        );
    }

    #[test]
    fn non_object_message_fails() {
        blocked_with(json!("just a string"), ViolationType::InvalidProtocol);
        blocked_with(json!(null), ViolationType::InvalidProtocol);
    }

    #[test]
    fn method_must_be_present_and_string() {
        blocked_with(json!({"jsonrpc": "2.0", "id": 1}), ViolationType::InvalidMethod);
        blocked_with(
            json!({"jsonrpc": "2.0", "method": 42, "id": 1}),
            ViolationType::InvalidMethod,
        );
    }

    #[test]
    fn method_length_boundary() {
        let at_limit = "m".repeat(100);
        let msg = json!({"jsonrpc": "2.0", "method": at_limit, "id": 1});
        assert!(validate(msg).is_pass());

        let over = "m".repeat(101);
        blocked_with(
            json!({"jsonrpc": "2.0", "method": over, "id": 1}),
            ViolationType::InvalidMethod,
        );
    }

    #[test]
    fn method_charset() {
        assert!(validate(json!({"jsonrpc": "2.0", "method": "tools/call_v2-x", "id": 1})).is_pass());
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "tools.call", "id": 1}),
            ViolationType::InvalidMethod,
        );
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "rm -rf", "id": 1}),
            ViolationType::InvalidMethod,
        );
    }

    #[test]
    fn id_type_checked() {
        assert!(validate(json!({"jsonrpc": "2.0", "method": "ping", "id": null})).is_pass());
        assert!(validate(json!({"jsonrpc": "2.0", "method": "ping", "id": "x"})).is_pass());
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "ping", "id": [1, 2]}),
            ViolationType::InvalidSchema,
        );
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "ping", "id": {"a": 1}}),
            ViolationType::InvalidSchema,
        );
    }

    #[test]
    fn null_byte_rejected() {
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": {"text": "a\u{0}b"}}),
            ViolationType::DangerousEncoding,
        );
    }

    #[test]
    fn invisible_unicode_rejected() {
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": {"text": "a\u{202E}b"}}),
            ViolationType::SuspiciousEncoding,
        );
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": {"t": "x\u{200B}y"}}),
            ViolationType::SuspiciousEncoding,
        );
    }

    #[test]
    fn control_char_budget() {
        let within: String = "\u{1}".repeat(10);
        let msg = json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": {"t": within}});
        assert!(validate(msg).is_pass());

        let over: String = "\u{1}".repeat(11);
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": {"t": over}}),
            ViolationType::SuspiciousEncoding,
        );
    }

    #[test]
    fn size_boundaries() {
        let mut config = StructureConfig::default();
        config.max_bytes = 100;
        let layer = StructureLayer::new(config, Arc::new(MethodTable::standard()));

        let base = json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": {"t": ""}});
        let base_len = serde_json::to_string(&base).unwrap().len();

        // Exactly at the limit passes
        let padding = "x".repeat(100 - base_len);
        let msg = json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": {"t": padding}});
        assert_eq!(serde_json::to_string(&msg).unwrap().len(), 100);
        assert!(layer.validate(&msg, &mut ValidationContext::now()).is_pass());

        // One byte over fails
        let padding = "x".repeat(101 - base_len);
        let msg = json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": {"t": padding}});
        match layer.validate(&msg, &mut ValidationContext::now()) {
            LayerResult::Block(b) => assert_eq!(b.violation, ViolationType::SizeLimitExceeded),
            LayerResult::Pass => panic!("expected size failure"),
        }
    }

    #[test]
    fn undersized_message_fails() {
        let mut config = StructureConfig::default();
        config.min_bytes = 100;
        let layer = StructureLayer::new(config, Arc::new(MethodTable::standard()));
        let msg = json!({"jsonrpc": "2.0", "method": "ping", "id": 1});
        match layer.validate(&msg, &mut ValidationContext::now()) {
            LayerResult::Block(b) => assert_eq!(b.violation, ViolationType::MalformedMessage),
            LayerResult::Pass => panic!("expected minimum size failure"),
        }
    }

    #[test]
    fn params_fanout_limit() {
        let mut params = serde_json::Map::new();
        for i in 0..21 {
            params.insert(format!("k{}", i), json!(1));
        }
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": params}),
            ViolationType::ParamLimitExceeded,
        );
    }

    #[test]
    fn params_must_be_structured() {
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "ping", "id": 1, "params": "text"}),
            ViolationType::InvalidSchema,
        );
    }

    #[test]
    fn string_leaf_limit_applies_to_nested_values() {
        let long = "y".repeat(5_001);
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "tools/call", "id": 1,
                   "params": {"name": "t", "arguments": {"nested": {"deep": long}}}}),
            ViolationType::StringLimitExceeded,
        );
    }

    #[test]
    fn mcp_required_params_enforced() {
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "tools/call", "id": 1, "params": {}}),
            ViolationType::MissingRequiredParam,
        );
        blocked_with(
            json!({"jsonrpc": "2.0", "method": "resources/read", "id": 1, "params": {"uri": 5}}),
            ViolationType::MissingRequiredParam,
        );
    }

    #[test]
    fn unknown_method_passes_structure() {
        // Unknown methods are a semantic-layer concern
        let msg = json!({"jsonrpc": "2.0", "method": "custom/thing", "id": 1});
        assert!(validate(msg).is_pass());
    }
}
