//! Method chaining rules
//!
//! A chaining rule `{from, to}` permits `to` when the previous method in the
//! session was `from`; `from = "*"` matches any predecessor. A session with
//! no recorded predecessor is unconstrained - there is no chain to violate
//! yet.

use serde::{Deserialize, Serialize};

/// One allowed method transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainingRule {
    pub from: String,
    pub to: String,
}

impl ChainingRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// A rule allowing `to` after anything.
    pub fn any_to(to: impl Into<String>) -> Self {
        Self::new("*", to)
    }
}

/// The full transition graph.
#[derive(Debug, Clone, Default)]
pub struct ChainingPolicy {
    rules: Vec<ChainingRule>,
}

impl ChainingPolicy {
    pub fn new(rules: Vec<ChainingRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `current` may follow `previous`.
    pub fn allows(&self, previous: Option<&str>, current: &str) -> bool {
        let prev = match previous {
            None => return true,
            Some(p) => p,
        };
        self.rules
            .iter()
            .any(|rule| rule.to == current && (rule.from == "*" || rule.from == prev))
    }
}
