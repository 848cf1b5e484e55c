//! JSON-RPC 2.0 message model
//!
//! Classification operates on raw values because the whole point of the
//! middleware is to look at messages that may not deserialize cleanly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server-defined code used for rate limiting
    pub const RATE_LIMITED: i32 = -32000;
}

/// Request ID - string, number, or null per JSON-RPC 2.0
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

impl RequestId {
    /// Extract a request id from a raw message value, if the field is present
    /// and carries a legal type.
    pub fn from_message(raw: &Value) -> Option<Self> {
        match raw.get("id") {
            Some(Value::Number(n)) => n.as_i64().map(RequestId::Number),
            Some(Value::String(s)) => Some(RequestId::String(s.clone())),
            Some(Value::Null) => Some(RequestId::Null),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestId::Number(n) => Value::from(*n),
            RequestId::String(s) => Value::from(s.clone()),
            RequestId::Null => Value::Null,
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Null => write!(f, "null"),
        }
    }
}

/// What a raw inbound value looks like to the transport wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `method` and `id` both present - expects a response
    Request,
    /// `method` present, `id` absent - no response is due
    Notification,
    /// `id` present with `result` or `error` - produced by the host, never
    /// validated
    Response,
    /// None of the above; validated (and failed) as a request with a null id
    Invalid,
}

/// Classify a raw inbound message.
///
/// Responses are recognized first so that a malformed object carrying both
/// `result` and `method` is still treated as host output and forwarded.
pub fn classify(raw: &Value) -> MessageKind {
    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => return MessageKind::Invalid,
    };
    let has_id = obj.contains_key("id");
    if has_id && (obj.contains_key("result") || obj.contains_key("error")) {
        return MessageKind::Response;
    }
    match (obj.contains_key("method"), has_id) {
        (true, true) => MessageKind::Request,
        (true, false) => MessageKind::Notification,
        _ => MessageKind::Invalid,
    }
}

/// Normalize SDK-variant request shapes into the canonical field subset
/// `{jsonrpc?, method, params?, id?}`.
///
/// Fields are copied, never invented: a message that arrived without
/// `jsonrpc` stays without it and fails the structure layer. The original
/// value is left untouched; the wrapper forwards it, not the normalized copy.
pub fn normalize(raw: &Value) -> Value {
    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => return raw.clone(),
    };
    let mut out = Map::new();
    for key in ["jsonrpc", "method", "params", "id"] {
        if let Some(v) = obj.get(key) {
            out.insert(key.to_string(), v.clone());
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_request() {
        let raw = json!({"jsonrpc":"2.0","id":1,"method":"tools/call"});
        assert_eq!(classify(&raw), MessageKind::Request);
    }

    #[test]
    fn classify_notification() {
        let raw = json!({"jsonrpc":"2.0","method":"notifications/initialized"});
        assert_eq!(classify(&raw), MessageKind::Notification);
    }

    #[test]
    fn classify_response_with_result() {
        let raw = json!({"jsonrpc":"2.0","id":1,"result":{}});
        assert_eq!(classify(&raw), MessageKind::Response);
    }

    #[test]
    fn classify_response_with_error() {
        let raw = json!({"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"bad"}});
        assert_eq!(classify(&raw), MessageKind::Response);
    }

    #[test]
    fn classify_response_wins_over_method() {
        let raw = json!({"jsonrpc":"2.0","id":1,"result":{},"method":"x"});
        assert_eq!(classify(&raw), MessageKind::Response);
    }

    #[test]
    fn classify_invalid() {
        assert_eq!(classify(&json!({"id": 3})), MessageKind::Invalid);
        assert_eq!(classify(&json!("just a string")), MessageKind::Invalid);
        assert_eq!(classify(&json!(null)), MessageKind::Invalid);
    }

    #[test]
    fn normalize_strips_foreign_fields() {
        let raw = json!({"method":"ping","id":7,"jsonrpc":"2.0","_meta":{"x":1}});
        let norm = normalize(&raw);
        let obj = norm.as_object().unwrap();
        assert!(!obj.contains_key("_meta"));
        assert_eq!(obj.get("method").unwrap(), "ping");
    }

    #[test]
    fn normalize_does_not_invent_jsonrpc() {
        let raw = json!({"method":"ping","id":7});
        let norm = normalize(&raw);
        assert!(norm.get("jsonrpc").is_none());
    }

    #[test]
    fn request_id_from_message() {
        assert_eq!(
            RequestId::from_message(&json!({"id": 42})),
            Some(RequestId::Number(42))
        );
        assert_eq!(
            RequestId::from_message(&json!({"id": "abc"})),
            Some(RequestId::String("abc".to_string()))
        );
        assert_eq!(
            RequestId::from_message(&json!({"id": null})),
            Some(RequestId::Null)
        );
        assert_eq!(RequestId::from_message(&json!({"id": [1]})), None);
        assert_eq!(RequestId::from_message(&json!({})), None);
    }

    #[test]
    fn request_id_display() {
        assert_eq!(format!("{}", RequestId::Number(5)), "5");
        assert_eq!(format!("{}", RequestId::String("a".into())), "a");
        assert_eq!(format!("{}", RequestId::Null), "null");
    }

    #[test]
    fn request_id_roundtrip() {
        let id = RequestId::String("req-9".to_string());
        let v = id.to_value();
        assert_eq!(v, json!("req-9"));
        assert_eq!(RequestId::Null.to_value(), Value::Null);
    }
}
