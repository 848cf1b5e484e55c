//! Layer 4 - semantics
//!
//! Enforces tool contracts, resource access policy, side-effect gating,
//! quotas, and (optionally) method chaining. Checks run in a fixed order and
//! short-circuit on the first failure. URI and path checks read the
//! canonical form of the value, never the raw input.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::canonical::canonicalize;
use crate::pipeline::context::ValidationContext;
use crate::pipeline::result::{LayerResult, Severity, ViolationType};
use crate::policy::quota::{QuotaLimits, QuotaProvider};
use crate::policy::resources::{normalize_path, ResourcePolicy};
use crate::policy::tools::{ArgViolation, SideEffectClass, ToolRegistry, ToolSpec};
use crate::policy::{ChainingPolicy, SessionMemory};
use crate::protocol::mcp::MethodTable;

use super::ValidationLayer;

/// Multiplier used to estimate tool egress from serialized argument bytes.
const EGRESS_ESTIMATE_FACTOR: u64 = 16;
/// Per-byte weight used to estimate resource read size from URI length.
const READ_ESTIMATE_FACTOR: u64 = 1_024;
const READ_ESTIMATE_CAP: u64 = 10_000_000;

pub struct SemanticLayer {
    methods: Arc<MethodTable>,
    tools: Arc<ToolRegistry>,
    resources: Arc<ResourcePolicy>,
    quota: Arc<dyn QuotaProvider>,
    sessions: Arc<SessionMemory>,
    chaining: Option<ChainingPolicy>,
    method_quotas: HashMap<String, QuotaLimits>,
}

impl SemanticLayer {
    pub fn new(
        methods: Arc<MethodTable>,
        tools: Arc<ToolRegistry>,
        resources: Arc<ResourcePolicy>,
        quota: Arc<dyn QuotaProvider>,
        sessions: Arc<SessionMemory>,
    ) -> Self {
        Self {
            methods,
            tools,
            resources,
            quota,
            sessions,
            chaining: None,
            method_quotas: HashMap::new(),
        }
    }

    /// Chaining is opt-in; without rules the check is skipped entirely.
    pub fn with_chaining(mut self, chaining: ChainingPolicy) -> Self {
        self.chaining = Some(chaining);
        self
    }

    pub fn with_method_quotas(mut self, quotas: HashMap<String, QuotaLimits>) -> Self {
        self.method_quotas = quotas;
        self
    }

    fn check_method_shape(&self, method: &str, params: Option<&Value>) -> Option<LayerResult> {
        if !self.methods.contains(method) {
            return Some(LayerResult::block(
                Severity::Medium,
                ViolationType::InvalidMcpMethod,
                format!("method '{}' is not part of the MCP surface", method),
            ));
        }
        if let Some((name, _, _)) = self.methods.missing_required(method, params) {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::MissingRequiredParam,
                format!("required parameter '{}' is missing or mistyped", name),
            ));
        }
        None
    }

    fn check_tool_call(
        &self,
        params: Option<&Value>,
        ctx: &ValidationContext,
    ) -> Option<LayerResult> {
        let name = params?.get("name")?.as_str()?;
        let spec = match self.tools.get(name) {
            Some(spec) => spec,
            None => {
                return Some(LayerResult::block(
                    Severity::High,
                    ViolationType::ToolNotAllowed,
                    format!("tool '{}' is not registered", name),
                ))
            }
        };
        let arguments = params.and_then(|p| p.get("arguments"));

        if let Some(violation) = spec.check_args(arguments) {
            return Some(match violation {
                ArgViolation::Missing { name: arg } => LayerResult::block(
                    Severity::High,
                    ViolationType::MissingRequiredParam,
                    format!("tool '{}' requires argument '{}'", name, arg),
                ),
                ArgViolation::WrongType { name: arg, expected } => LayerResult::block(
                    Severity::High,
                    ViolationType::InvalidToolArguments,
                    format!(
                        "tool '{}' argument '{}' must be a {}",
                        name,
                        arg,
                        expected.as_str()
                    ),
                ),
            });
        }

        let args_bytes = match arguments {
            Some(args) => match serde_json::to_string(args) {
                Ok(s) => s.len(),
                Err(e) => {
                    return Some(LayerResult::block(
                        Severity::High,
                        ViolationType::ArgSerializationError,
                        format!("tool '{}' arguments are not serializable: {}", name, e),
                    ))
                }
            },
            None => 0,
        };
        if let Some(max) = spec.max_args_size {
            if args_bytes > max {
                return Some(LayerResult::block(
                    Severity::Medium,
                    ViolationType::ArgsEgressLimit,
                    format!(
                        "tool '{}' arguments are {} bytes (limit {})",
                        name, args_bytes, max
                    ),
                ));
            }
        }

        let quota_key = format!("tool:{}", name);
        let decision = self
            .quota
            .increment_and_check(&quota_key, spec.quota_limits(), ctx.now_ms());
        if !decision.passed {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::QuotaExceeded,
                decision
                    .reason
                    .unwrap_or_else(|| format!("quota exceeded for {}", quota_key)),
            ));
        }

        if let Some(result) = self.check_side_effects(spec, ctx) {
            return Some(result);
        }
        if let Some(max) = spec.max_egress_bytes {
            let estimated = args_bytes as u64 * EGRESS_ESTIMATE_FACTOR;
            if estimated > max {
                return Some(LayerResult::block(
                    Severity::Medium,
                    ViolationType::ToolEgressLimit,
                    format!(
                        "tool '{}' estimated egress {} bytes (limit {})",
                        name, estimated, max
                    ),
                ));
            }
        }
        None
    }

    fn check_side_effects(&self, spec: &ToolSpec, ctx: &ValidationContext) -> Option<LayerResult> {
        let allowed = match spec.side_effects {
            SideEffectClass::None | SideEffectClass::Read => true,
            SideEffectClass::Write => ctx.policy.allow_writes,
            SideEffectClass::Network => ctx.policy.allow_network,
        };
        if allowed {
            return None;
        }
        let capability = match spec.side_effects {
            SideEffectClass::Write => "write",
            SideEffectClass::Network => "network",
            _ => unreachable!("read and none are always allowed"),
        };
        Some(LayerResult::block(
            Severity::High,
            ViolationType::SideEffectNotAllowed,
            format!(
                "tool '{}' requires the '{}' capability",
                spec.name, capability
            ),
        ))
    }

    fn check_resource_read(
        &self,
        params: Option<&Value>,
        ctx: &ValidationContext,
    ) -> Option<LayerResult> {
        let uri = params?.get("uri")?.as_str()?;
        let canonical_uri = canonicalize(uri);

        if canonical_uri.len() > self.resources.max_uri_length {
            return Some(LayerResult::block(
                Severity::Medium,
                ViolationType::ResourcePolicyViolation,
                format!(
                    "URI is {} characters (limit {})",
                    canonical_uri.len(),
                    self.resources.max_uri_length
                ),
            ));
        }

        let scheme = extract_scheme(&canonical_uri).unwrap_or("file");
        if !self.resources.scheme_allowed(scheme) {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::ResourcePolicyViolation,
                format!("scheme '{}' is not allowed", scheme),
            ));
        }

        match scheme {
            "file" => {
                if let Some(result) = self.check_file_uri(&canonical_uri, ctx) {
                    return Some(result);
                }
            }
            "http" | "https" => {
                if let Some(result) = self.check_http_uri(&canonical_uri) {
                    return Some(result);
                }
            }
            _ => {}
        }

        let estimated = (canonical_uri.len() as u64 * READ_ESTIMATE_FACTOR).min(READ_ESTIMATE_CAP);
        if estimated > self.resources.max_read_bytes {
            return Some(LayerResult::block(
                Severity::Medium,
                ViolationType::ResourceEgressLimit,
                format!(
                    "estimated read of {} bytes (limit {})",
                    estimated, self.resources.max_read_bytes
                ),
            ));
        }

        let limits = self
            .method_quotas
            .get("method:resources/read")
            .copied()
            .unwrap_or_default();
        let decision = self
            .quota
            .increment_and_check("method:resources/read", limits, ctx.now_ms());
        if !decision.passed {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::QuotaExceeded,
                decision
                    .reason
                    .unwrap_or_else(|| "resource read quota exceeded".to_string()),
            ));
        }
        None
    }

    fn check_file_uri(&self, canonical_uri: &str, ctx: &ValidationContext) -> Option<LayerResult> {
        let raw_path = canonical_uri
            .strip_prefix("file://")
            .or_else(|| canonical_uri.strip_prefix("file:"))
            .unwrap_or(canonical_uri);
        let base_dir = ctx.base_dir.as_ref().map(|p| p.to_string_lossy().into_owned());
        let normalized = normalize_path(raw_path, base_dir.as_deref());

        if normalized.len() > self.resources.max_path_length {
            return Some(LayerResult::block(
                Severity::Medium,
                ViolationType::ResourcePolicyViolation,
                format!(
                    "path is {} characters (limit {})",
                    normalized.len(),
                    self.resources.max_path_length
                ),
            ));
        }
        if !self.resources.path_within_roots(&normalized) {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::ResourcePolicyViolation,
                format!("path '{}' is outside the allowed roots", normalized),
            ));
        }
        if self.resources.path_denied(&normalized) {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::ResourcePolicyViolation,
                format!("path '{}' matches a deny rule", normalized),
            ));
        }
        None
    }

    fn check_http_uri(&self, canonical_uri: &str) -> Option<LayerResult> {
        let parsed = match Url::parse(canonical_uri) {
            Ok(url) => url,
            Err(e) => {
                return Some(LayerResult::block(
                    Severity::High,
                    ViolationType::ResourcePolicyViolation,
                    format!("URI does not parse: {}", e),
                ))
            }
        };
        let host = parsed.host_str().unwrap_or("");
        if !self.resources.host_allowed(host, parsed.port()) {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::ResourcePolicyViolation,
                format!("host '{}' is not allowed", host),
            ));
        }
        None
    }

    fn check_chaining(&self, method: &str, ctx: &ValidationContext) -> Option<LayerResult> {
        let chaining = self.chaining.as_ref()?;
        let key = ctx.session_key();
        let previous = self.sessions.get(key, ctx.now_ms());
        if !chaining.allows(previous.as_deref(), method) {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::ChainViolation,
                format!(
                    "method '{}' may not follow '{}'",
                    method,
                    previous.as_deref().unwrap_or("(none)")
                ),
            ));
        }
        self.sessions.set(key, method, ctx.now_ms());
        None
    }
}

impl ValidationLayer for SemanticLayer {
    fn name(&self) -> &str {
        "Layer4-Semantics"
    }

    fn validate(&self, message: &Value, ctx: &mut ValidationContext) -> LayerResult {
        let method = match message.get("method").and_then(Value::as_str) {
            Some(m) => m,
            None => {
                return LayerResult::block(
                    Severity::High,
                    ViolationType::MalformedMessage,
                    "message has no method",
                )
            }
        };
        let params = message.get("params");

        if let Some(result) = self.check_method_shape(method, params) {
            return result;
        }
        if method == "tools/call" {
            if let Some(result) = self.check_tool_call(params, ctx) {
                return result;
            }
        }
        if method == "resources/read" {
            if let Some(result) = self.check_resource_read(params, ctx) {
                return result;
            }
        }
        if let Some(result) = self.check_chaining(method, ctx) {
            return result;
        }
        LayerResult::Pass
    }
}

fn extract_scheme(uri: &str) -> Option<&str> {
    let colon = uri.find(':')?;
    let scheme = &uri[..colon];
    if !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        && scheme.chars().next().map(|c| c.is_ascii_alphabetic()) == Some(true)
    {
        Some(scheme)
    } else {
        None
    }
}
