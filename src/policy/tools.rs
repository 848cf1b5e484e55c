//! Tool contracts
//!
//! A tool registered here declares its side-effect class, the shape of its
//! arguments, and optional size/quota limits. The semantic layer enforces
//! the contract on every `tools/call`.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::policy::quota::QuotaLimits;
use crate::protocol::mcp::ParamKind;

/// Capability a tool requires to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideEffectClass {
    #[default]
    None,
    Read,
    Write,
    Network,
}

/// Declared shape of one tool argument.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub kind: ParamKind,
    pub optional: bool,
}

impl ArgSpec {
    pub fn required(kind: ParamKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn optional(kind: ParamKind) -> Self {
        Self {
            kind,
            optional: true,
        }
    }
}

/// Contract for one registered tool.
#[derive(Debug, Clone, Default)]
pub struct ToolSpec {
    pub name: String,
    pub side_effects: SideEffectClass,
    pub max_args_size: Option<usize>,
    pub max_egress_bytes: Option<u64>,
    /// Argument name -> expected shape; arguments not listed are permitted
    pub args_shape: BTreeMap<String, ArgSpec>,
    pub quota_per_minute: Option<u32>,
    pub quota_per_hour: Option<u32>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_side_effects(mut self, side_effects: SideEffectClass) -> Self {
        self.side_effects = side_effects;
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, spec: ArgSpec) -> Self {
        self.args_shape.insert(name.into(), spec);
        self
    }

    pub fn with_max_args_size(mut self, bytes: usize) -> Self {
        self.max_args_size = Some(bytes);
        self
    }

    pub fn with_max_egress_bytes(mut self, bytes: u64) -> Self {
        self.max_egress_bytes = Some(bytes);
        self
    }

    pub fn with_quota(mut self, per_minute: Option<u32>, per_hour: Option<u32>) -> Self {
        self.quota_per_minute = per_minute;
        self.quota_per_hour = per_hour;
        self
    }

    pub fn quota_limits(&self) -> QuotaLimits {
        QuotaLimits {
            per_minute: self.quota_per_minute,
            per_hour: self.quota_per_hour,
        }
    }

    /// First contract violation in the given arguments, if any.
    pub fn check_args(&self, arguments: Option<&Value>) -> Option<ArgViolation> {
        for (name, spec) in &self.args_shape {
            match arguments.and_then(|a| a.get(name)) {
                None => {
                    if !spec.optional {
                        return Some(ArgViolation::Missing { name: name.clone() });
                    }
                }
                Some(value) => {
                    if !spec.kind.matches(value) {
                        return Some(ArgViolation::WrongType {
                            name: name.clone(),
                            expected: spec.kind,
                        });
                    }
                }
            }
        }
        None
    }
}

/// A tool-argument contract violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgViolation {
    Missing { name: String },
    WrongType { name: String, expected: ParamKind },
}

/// Registry of tool contracts, keyed by tool name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec) -> &mut Self {
        self.tools.insert(spec.name.clone(), spec);
        self
    }

    pub fn with(mut self, spec: ToolSpec) -> Self {
        self.register(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
