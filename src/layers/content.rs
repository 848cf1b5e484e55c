//! Layer 2 - content
//!
//! Canonicalizes the serialized message and runs the attack catalog over the
//! canonical form. Data URIs and CSS constructs get dedicated checks before
//! the catalog rounds. The canonical string is memoized per message key so
//! repeated identical calls skip re-canonicalization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::canonicalize;
use crate::catalog::Catalog;
use crate::pipeline::context::ValidationContext;
use crate::pipeline::result::{LayerResult, Severity, ViolationType};

use super::ValidationLayer;

/// MIME types never acceptable inside a data URI.
const DISALLOWED_DATA_MIMES: &[&str] = &[
    "application/javascript",
    "application/ecmascript",
    "text/javascript",
    "text/ecmascript",
    "application/x-executable",
    "application/x-msdownload",
    "application/x-sh",
    "application/x-httpd-php",
    "application/java-archive",
    "text/html",
    "application/xhtml+xml",
    "image/svg+xml",
];

/// Substrings that mark a decoded Base64 payload as hostile.
const MALICIOUS_DECODED: &[&str] = &[
    "<script",
    "javascript:",
    "eval(",
    "/etc/passwd",
    "cmd.exe",
    "powershell",
    "rm -rf",
    "__proto__",
    "document.cookie",
];

static DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)data:([a-z0-9.+-]+/[a-z0-9.+-]+)?((?:;[a-z0-9=+-]+)*),([^\x22\s]*)")
        .expect("data uri regex")
});
static CSS_EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)expression\s*\(").expect("css expression regex"));
static CSS_SCRIPT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\s*\(\s*['\x22]?\s*(?:javascript|vbscript)\s*:"#)
        .expect("css url regex")
});

/// Content layer tuning.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Canonical-string memo entries kept before the cache is cleared
    pub cache_max_size: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            cache_max_size: 1_000,
        }
    }
}

pub struct ContentLayer {
    catalog: Arc<Catalog>,
    config: ContentConfig,
    /// `{method}:{size}:{sha256(params)}` -> canonical string.
    /// Cleared wholesale on overflow rather than LRU'd.
    cache: Mutex<HashMap<String, String>>,
}

impl ContentLayer {
    pub fn new(catalog: Arc<Catalog>, config: ContentConfig) -> Self {
        Self {
            catalog,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn standard() -> Self {
        Self::new(
            Arc::new(Catalog::compile(crate::catalog::standard_rounds()).expect("standard catalog")),
            ContentConfig::default(),
        )
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("content cache poisoned").len()
    }

    fn cache_key(message: &Value, serialized: &str) -> String {
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        let mut hasher = Sha256::new();
        if let Some(params) = message.get("params") {
            hasher.update(params.to_string().as_bytes());
        }
        format!("{}:{}:{:x}", method, serialized.len(), hasher.finalize())
    }

    fn canonical_for(&self, message: &Value, serialized: &str) -> String {
        let key = Self::cache_key(message, serialized);
        {
            let cache = self.cache.lock().expect("content cache poisoned");
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }
        let canonical = canonicalize(serialized);
        let mut cache = self.cache.lock().expect("content cache poisoned");
        if cache.len() >= self.config.cache_max_size {
            cache.clear();
        }
        cache.insert(key, canonical.clone());
        canonical
    }

    fn check_data_uris(&self, canonical: &str) -> Option<LayerResult> {
        for captures in DATA_URI.captures_iter(canonical) {
            let mime = captures
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default();
            let mime_params = captures
                .get(2)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default();
            let payload = captures.get(3).map(|m| m.as_str()).unwrap_or("");

            if DISALLOWED_DATA_MIMES.contains(&mime.as_str()) {
                return Some(LayerResult::block(
                    Severity::High,
                    ViolationType::DangerousDataUri,
                    format!("data URI with disallowed MIME type {}", mime),
                ));
            }
            if mime_params.contains("base64") {
                if let Some(result) = self.check_base64_payload(payload) {
                    return Some(result);
                }
            }
        }
        None
    }

    fn check_base64_payload(&self, payload: &str) -> Option<LayerResult> {
        if !payload
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        {
            return Some(LayerResult::block(
                Severity::Medium,
                ViolationType::Base64Injection,
                "data URI payload contains non-Base64 characters",
            ));
        }
        let decoded = match BASE64.decode(payload) {
            Ok(bytes) => bytes,
            Err(_) => {
                return Some(LayerResult::block(
                    Severity::Medium,
                    ViolationType::Base64Injection,
                    "data URI payload is not valid Base64",
                ))
            }
        };
        // UTF-8 first, Latin-1 as the total fallback
        let text = match String::from_utf8(decoded.clone()) {
            Ok(s) => s,
            Err(_) => decoded.iter().map(|&b| b as char).collect(),
        };
        let lowered = text.to_ascii_lowercase();
        if lowered.contains("data:") {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::NestedDataUri,
                "Base64 payload contains a nested data URI",
            ));
        }
        for marker in MALICIOUS_DECODED {
            if lowered.contains(marker) {
                return Some(LayerResult::block(
                    Severity::High,
                    ViolationType::DangerousDataUri,
                    format!("Base64 payload contains '{}'", marker),
                ));
            }
        }
        None
    }

    fn check_css(&self, canonical: &str) -> Option<LayerResult> {
        if CSS_EXPRESSION.is_match(canonical) {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::CssInjection,
                "CSS expression() detected",
            ));
        }
        if CSS_SCRIPT_URL.is_match(canonical) {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::CssInjection,
                "script URL inside CSS url() detected",
            ));
        }
        None
    }
}

impl ValidationLayer for ContentLayer {
    fn name(&self) -> &str {
        "Layer2-Content"
    }

    fn validate(&self, message: &Value, ctx: &mut ValidationContext) -> LayerResult {
        let object = match message.as_object() {
            Some(obj) => obj,
            None => {
                return LayerResult::block(
                    Severity::Critical,
                    ViolationType::ValidationError,
                    "message must be an object",
                )
            }
        };
        if object.is_empty() {
            return LayerResult::block(
                Severity::Critical,
                ViolationType::ValidationError,
                "message must not be empty",
            );
        }
        let serialized = match serde_json::to_string(message) {
            Ok(s) => s,
            Err(e) => {
                return LayerResult::block(
                    Severity::Critical,
                    ViolationType::ValidationError,
                    format!("message could not be serialized: {}", e),
                )
            }
        };

        let canonical = self.canonical_for(message, &serialized);
        ctx.canonical = Some(canonical.clone());

        if let Some(result) = self.check_data_uris(&canonical) {
            return result;
        }
        if let Some(result) = self.check_css(&canonical) {
            return result;
        }
        if let Some(hit) = self.catalog.first_match(&canonical) {
            return LayerResult::block_with_confidence(
                hit.severity,
                hit.violation,
                format!(
                    "attack pattern detected: {} ({})",
                    hit.pattern_name, hit.family
                ),
                hit.confidence,
            );
        }
        LayerResult::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer() -> ContentLayer {
        ContentLayer::standard()
    }

    fn validate_with(layer: &ContentLayer, message: &Value) -> (LayerResult, ValidationContext) {
        let mut ctx = ValidationContext::now();
        let result = layer.validate(message, &mut ctx);
        (result, ctx)
    }

    fn blocked_with(message: Value, violation: ViolationType) {
        let layer = layer();
        match validate_with(&layer, &message).0 {
            LayerResult::Block(b) => assert_eq!(b.violation, violation, "reason: {}", b.reason),
            LayerResult::Pass => panic!("expected {:?}, message passed", violation),
        }
    }

    fn call(args: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "id": 1,
            "params": {"name": "debug-echo", "arguments": args}
        })
    }

    #[test]
    fn benign_message_passes_and_fills_canonical() {
        let layer = layer();
        let msg = call(json!({"text": "hello"}));
        let (result, ctx) = validate_with(&layer, &msg);
        assert!(result.is_pass());
        let canonical = ctx.canonical.expect("canonical must be set");
        assert!(canonical.contains("debug-echo"));
    }

    #[test]
    fn null_and_empty_fail_critical() {
        for msg in [json!(null), json!({}), json!(42)] {
            let layer = layer();
            match validate_with(&layer, &msg).0 {
                LayerResult::Block(b) => {
                    assert_eq!(b.severity, Severity::Critical);
                    assert_eq!(b.violation, ViolationType::ValidationError);
                }
                LayerResult::Pass => panic!("expected critical failure"),
            }
        }
    }

    #[test]
    fn plain_traversal_detected() {
        blocked_with(
            call(json!({"path": "../../etc/passwd"})),
            ViolationType::PathTraversal,
        );
    }

    #[test]
    fn triple_encoded_traversal_detected() {
        blocked_with(
            call(json!({"path": "%252e%252e%252f%252e%252e%252fetc%252fpasswd"})),
            ViolationType::PathTraversal,
        );
    }

    #[test]
    fn fullwidth_obfuscated_script_detected() {
        // "＜ｓｃｒｉｐｔ＞" in fullwidth forms folds to "<script>"
        blocked_with(
            call(json!({"html": "\u{FF1C}\u{FF53}\u{FF43}\u{FF52}\u{FF49}\u{FF50}\u{FF54}\u{FF1E}"})),
            ViolationType::XssAttempt,
        );
    }

    #[test]
    fn html_entity_obfuscation_detected() {
        blocked_with(
            call(json!({"html": "&lt;script&gt;alert(1)&lt;/script&gt;"})),
            ViolationType::XssAttempt,
        );
    }

    #[test]
    fn ssrf_metadata_detected() {
        blocked_with(
            call(json!({"url": "http://169.254.169.254/latest/meta-data/iam/security-credentials/"})),
            ViolationType::SsrfAttempt,
        );
    }

    #[test]
    fn dangerous_data_uri_mime() {
        blocked_with(
            call(json!({"doc": "data:text/html;charset=utf-8,<h1>x</h1>"})),
            ViolationType::DangerousDataUri,
        );
    }

    #[test]
    fn malformed_base64_payload() {
        blocked_with(
            call(json!({"doc": "data:text/plain;base64,AAA"})),
            ViolationType::Base64Injection,
        );
    }

    #[test]
    fn nested_data_uri_in_base64() {
        // "data:text/plain,hi" base64-encoded
        let nested = BASE64.encode("data:text/plain,hi");
        blocked_with(
            call(json!({"doc": format!("data:text/plain;base64,{}", nested)})),
            ViolationType::NestedDataUri,
        );
    }

    #[test]
    fn malicious_decoded_base64() {
        let hostile = BASE64.encode("<script>alert(1)</script>");
        blocked_with(
            call(json!({"doc": format!("data:text/plain;base64,{}", hostile)})),
            ViolationType::DangerousDataUri,
        );
    }

    #[test]
    fn benign_base64_data_uri_passes() {
        let benign = BASE64.encode("just some plain text");
        let layer = layer();
        let msg = call(json!({"doc": format!("data:text/plain;base64,{}", benign)}));
        assert!(validate_with(&layer, &msg).0.is_pass());
    }

    #[test]
    fn css_expression_detected() {
        blocked_with(
            call(json!({"style": "width: expression(alert(1))"})),
            ViolationType::CssInjection,
        );
    }

    #[test]
    fn css_javascript_url_detected() {
        blocked_with(
            call(json!({"style": "background: url('javascript:alert(1)')"})),
            ViolationType::CssInjection,
        );
    }

    #[test]
    fn cache_reuses_canonical_and_clears_on_overflow() {
        let catalog =
            Arc::new(Catalog::compile(crate::catalog::standard_rounds()).expect("catalog"));
        let layer = ContentLayer::new(catalog, ContentConfig { cache_max_size: 2 });

        let m1 = call(json!({"text": "one"}));
        let m2 = call(json!({"text": "two"}));
        let m3 = call(json!({"text": "three"}));

        let _ = validate_with(&layer, &m1);
        let _ = validate_with(&layer, &m1);
        assert_eq!(layer.cache_len(), 1);
        let _ = validate_with(&layer, &m2);
        assert_eq!(layer.cache_len(), 2);
        // Overflow clears the cache wholesale, then inserts the new entry
        let _ = validate_with(&layer, &m3);
        assert_eq!(layer.cache_len(), 1);
    }
}
