//! MCP method metadata
//!
//! The method table drives two checks: the structure layer verifies that
//! known methods carry their required params with the right types, and the
//! semantic layer rejects methods that are not in the table at all.

use std::collections::HashMap;

use serde_json::Value;

/// Expected JSON type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }
}

/// Required and optional parameters for one method
#[derive(Debug, Clone, Default)]
pub struct MethodShape {
    pub required: Vec<(&'static str, ParamKind)>,
    pub optional: Vec<&'static str>,
}

impl MethodShape {
    fn new(required: &[(&'static str, ParamKind)], optional: &[&'static str]) -> Self {
        Self {
            required: required.to_vec(),
            optional: optional.to_vec(),
        }
    }
}

/// Map from method name to its expected parameter shape
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, MethodShape>,
}

impl MethodTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The MCP methods this middleware knows out of the box.
    pub fn standard() -> Self {
        use ParamKind::*;
        let mut table = Self::default();
        table.insert("initialize", MethodShape::new(
            &[("protocolVersion", String), ("capabilities", Object)],
            &["clientInfo"],
        ));
        table.insert("ping", MethodShape::default());
        table.insert("tools/list", MethodShape::new(&[], &["cursor"]));
        table.insert("tools/call", MethodShape::new(
            &[("name", String)],
            &["arguments"],
        ));
        table.insert("resources/list", MethodShape::new(&[], &["cursor"]));
        table.insert("resources/read", MethodShape::new(&[("uri", String)], &[]));
        table.insert("resources/subscribe", MethodShape::new(&[("uri", String)], &[]));
        table.insert("resources/unsubscribe", MethodShape::new(&[("uri", String)], &[]));
        table.insert("prompts/list", MethodShape::new(&[], &["cursor"]));
        table.insert("prompts/get", MethodShape::new(
            &[("name", String)],
            &["arguments"],
        ));
        table.insert("completion/complete", MethodShape::new(
            &[("ref", Object), ("argument", Object)],
            &[],
        ));
        table.insert("logging/setLevel", MethodShape::new(&[("level", String)], &[]));
        table.insert("notifications/initialized", MethodShape::default());
        table.insert("notifications/cancelled", MethodShape::new(
            &[],
            &["requestId", "reason"],
        ));
        table.insert("notifications/progress", MethodShape::new(
            &[("progressToken", String)],
            &["progress", "total"],
        ));
        table
    }

    pub fn insert(&mut self, method: impl Into<String>, shape: MethodShape) {
        self.methods.insert(method.into(), shape);
    }

    pub fn get(&self, method: &str) -> Option<&MethodShape> {
        self.methods.get(method)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// First required parameter missing or mistyped in `params`, if any.
    pub fn missing_required(&self, method: &str, params: Option<&Value>) -> Option<(&'static str, ParamKind, bool)> {
        let shape = self.get(method)?;
        for (name, kind) in &shape.required {
            match params.and_then(|p| p.get(name)) {
                None => return Some((name, *kind, false)),
                Some(v) if !kind.matches(v) => return Some((name, *kind, true)),
                Some(_) => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_table_covers_core_methods() {
        let table = MethodTable::standard();
        for method in [
            "initialize",
            "ping",
            "tools/list",
            "tools/call",
            "resources/read",
            "prompts/get",
        ] {
            assert!(table.contains(method), "missing {}", method);
        }
    }

    #[test]
    fn tools_call_requires_name() {
        let table = MethodTable::standard();
        let missing = table.missing_required("tools/call", Some(&json!({"arguments": {}})));
        assert_eq!(missing.map(|(n, _, _)| n), Some("name"));
    }

    #[test]
    fn tools_call_name_must_be_string() {
        let table = MethodTable::standard();
        let missing = table.missing_required("tools/call", Some(&json!({"name": 42})));
        let (name, kind, present) = missing.unwrap();
        assert_eq!(name, "name");
        assert_eq!(kind, ParamKind::String);
        assert!(present);
    }

    #[test]
    fn resources_read_requires_uri() {
        let table = MethodTable::standard();
        assert!(table.missing_required("resources/read", None).is_some());
        assert!(table
            .missing_required("resources/read", Some(&json!({"uri": "file:///tmp/a"})))
            .is_none());
    }

    #[test]
    fn unknown_method_has_no_shape() {
        let table = MethodTable::standard();
        assert!(table.missing_required("does/not/exist", None).is_none());
        assert!(!table.contains("does/not/exist"));
    }

    #[test]
    fn param_kind_matching() {
        assert!(ParamKind::String.matches(&json!("x")));
        assert!(ParamKind::Number.matches(&json!(1.5)));
        assert!(ParamKind::Boolean.matches(&json!(true)));
        assert!(ParamKind::Array.matches(&json!([])));
        assert!(ParamKind::Object.matches(&json!({})));
        assert!(!ParamKind::Object.matches(&json!([])));
    }

    #[test]
    fn ping_has_no_required_params() {
        let table = MethodTable::standard();
        assert!(table.missing_required("ping", None).is_none());
    }
}
