//! Validation result algebra
//!
//! A layer produces a [`LayerResult`] sum - either the message passes or it
//! is blocked with a typed violation. The pipeline projects the sum into the
//! flat [`Verdict`] shape that decision records and error responses consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a blocked message
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed taxonomy of rules a message can trip.
///
/// This is the primary key for audit records and for the sanitizer's
/// development-mode message table; it is closed on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    // Protocol / structure
    InvalidProtocol,
    InvalidMethod,
    InvalidSchema,
    MalformedMessage,
    SizeLimitExceeded,
    StringLimitExceeded,
    ParamLimitExceeded,
    DangerousEncoding,
    SuspiciousEncoding,
    MissingRequiredParam,
    InvalidMcpMethod,
    // Content
    PathTraversal,
    XssAttempt,
    SqlInjection,
    CommandInjection,
    ScriptInjection,
    CssInjection,
    BufferOverflowAttempt,
    SsrfAttempt,
    NosqlInjection,
    GraphqlInjection,
    DeserializationInjection,
    PrototypePollution,
    XmlEntityAttack,
    CrlfInjection,
    CsvInjection,
    SecretExposure,
    DangerousDataUri,
    Base64Injection,
    NestedDataUri,
    // Behavior
    RateLimitExceeded,
    BurstActivity,
    OversizedMessage,
    AutomatedTiming,
    SuspiciousMethod,
    // Semantic
    ToolNotAllowed,
    InvalidToolArguments,
    ArgsEgressLimit,
    ToolEgressLimit,
    SideEffectNotAllowed,
    ResourcePolicyViolation,
    ResourceEgressLimit,
    QuotaExceeded,
    ChainViolation,
    ArgSerializationError,
    // Framework
    ValidationError,
    ValidatorError,
    InternalError,
    Unknown,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::InvalidProtocol => "INVALID_PROTOCOL",
            ViolationType::InvalidMethod => "INVALID_METHOD",
            ViolationType::InvalidSchema => "INVALID_SCHEMA",
            ViolationType::MalformedMessage => "MALFORMED_MESSAGE",
            ViolationType::SizeLimitExceeded => "SIZE_LIMIT_EXCEEDED",
            ViolationType::StringLimitExceeded => "STRING_LIMIT_EXCEEDED",
            ViolationType::ParamLimitExceeded => "PARAM_LIMIT_EXCEEDED",
            ViolationType::DangerousEncoding => "DANGEROUS_ENCODING",
            ViolationType::SuspiciousEncoding => "SUSPICIOUS_ENCODING",
            ViolationType::MissingRequiredParam => "MISSING_REQUIRED_PARAM",
            ViolationType::InvalidMcpMethod => "INVALID_MCP_METHOD",
            ViolationType::PathTraversal => "PATH_TRAVERSAL",
            ViolationType::XssAttempt => "XSS_ATTEMPT",
            ViolationType::SqlInjection => "SQL_INJECTION",
            ViolationType::CommandInjection => "COMMAND_INJECTION",
            ViolationType::ScriptInjection => "SCRIPT_INJECTION",
            ViolationType::CssInjection => "CSS_INJECTION",
            ViolationType::BufferOverflowAttempt => "BUFFER_OVERFLOW_ATTEMPT",
            ViolationType::SsrfAttempt => "SSRF_ATTEMPT",
            ViolationType::NosqlInjection => "NOSQL_INJECTION",
            ViolationType::GraphqlInjection => "GRAPHQL_INJECTION",
            ViolationType::DeserializationInjection => "DESERIALIZATION_INJECTION",
            ViolationType::PrototypePollution => "PROTOTYPE_POLLUTION",
            ViolationType::XmlEntityAttack => "XML_ENTITY_ATTACK",
            ViolationType::CrlfInjection => "CRLF_INJECTION",
            ViolationType::CsvInjection => "CSV_INJECTION",
            ViolationType::SecretExposure => "SECRET_EXPOSURE",
            ViolationType::DangerousDataUri => "DANGEROUS_DATA_URI",
            ViolationType::Base64Injection => "BASE64_INJECTION",
            ViolationType::NestedDataUri => "NESTED_DATA_URI",
            ViolationType::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ViolationType::BurstActivity => "BURST_ACTIVITY",
            ViolationType::OversizedMessage => "OVERSIZED_MESSAGE",
            ViolationType::AutomatedTiming => "AUTOMATED_TIMING",
            ViolationType::SuspiciousMethod => "SUSPICIOUS_METHOD",
            ViolationType::ToolNotAllowed => "TOOL_NOT_ALLOWED",
            ViolationType::InvalidToolArguments => "INVALID_TOOL_ARGUMENTS",
            ViolationType::ArgsEgressLimit => "ARGS_EGRESS_LIMIT",
            ViolationType::ToolEgressLimit => "TOOL_EGRESS_LIMIT",
            ViolationType::SideEffectNotAllowed => "SIDE_EFFECT_NOT_ALLOWED",
            ViolationType::ResourcePolicyViolation => "RESOURCE_POLICY_VIOLATION",
            ViolationType::ResourceEgressLimit => "RESOURCE_EGRESS_LIMIT",
            ViolationType::QuotaExceeded => "QUOTA_EXCEEDED",
            ViolationType::ChainViolation => "CHAIN_VIOLATION",
            ViolationType::ArgSerializationError => "ARG_SERIALIZATION_ERROR",
            ViolationType::ValidationError => "VALIDATION_ERROR",
            ViolationType::ValidatorError => "VALIDATOR_ERROR",
            ViolationType::InternalError => "INTERNAL_ERROR",
            ViolationType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Details of a blocked message
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub severity: Severity,
    pub violation: ViolationType,
    pub reason: String,
    pub confidence: f64,
}

/// Outcome of one layer for one message
#[derive(Debug, Clone, PartialEq)]
pub enum LayerResult {
    Pass,
    Block(Block),
}

impl LayerResult {
    pub fn block(
        severity: Severity,
        violation: ViolationType,
        reason: impl Into<String>,
    ) -> Self {
        LayerResult::Block(Block {
            severity,
            violation,
            reason: reason.into(),
            confidence: 1.0,
        })
    }

    pub fn block_with_confidence(
        severity: Severity,
        violation: ViolationType,
        reason: impl Into<String>,
        confidence: f64,
    ) -> Self {
        LayerResult::Block(Block {
            severity,
            violation,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, LayerResult::Pass)
    }
}

/// Flat projection of a validation outcome.
///
/// Invariant: `passed == true` implies `severity == Severity::None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub severity: Severity,
    pub violation: ViolationType,
    pub reason: String,
    pub confidence: f64,
    pub layer: String,
    pub timestamp: DateTime<Utc>,
}

impl Verdict {
    pub fn pass(layer: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            passed: true,
            severity: Severity::None,
            violation: ViolationType::Unknown,
            reason: "No violations detected".to_string(),
            confidence: 1.0,
            layer: layer.into(),
            timestamp,
        }
    }

    /// Normalize a layer's block into the full verdict shape. Missing fields
    /// in host-supplied results get safe defaults: severity `Low`, violation
    /// `Unknown`, reason `"No reason provided"`.
    pub fn from_block(block: Block, layer: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let reason = if block.reason.is_empty() {
            "No reason provided".to_string()
        } else {
            block.reason
        };
        let severity = if block.severity == Severity::None {
            Severity::Low
        } else {
            block.severity
        };
        Self {
            passed: false,
            severity,
            violation: block.violation,
            reason,
            confidence: block.confidence,
            layer: layer.into(),
            timestamp,
        }
    }
}
