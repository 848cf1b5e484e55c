//! Pipeline decision records
//!
//! The pipeline emits one record per decision through an abstract sink; file
//! management, rotation, and shipping are host concerns. The default sink
//! writes structured `tracing` events, and [`MemorySink`] collects records
//! for tests and the shutdown report.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::result::{Severity, ViolationType};

/// Whether a message was allowed through or blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Block,
}

/// One pipeline decision, as emitted to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub layer: String,
    pub decision: Decision,
    pub passed: bool,
    pub severity: Severity,
    pub violation: ViolationType,
    /// Already sanitized; raw reasons never reach a sink
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub message_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_time_ms: Option<f64>,
}

/// Abstract destination for decision records.
pub trait DecisionSink: Send + Sync {
    fn record(&self, record: &DecisionRecord);
}

/// Default sink: structured tracing events at a level matching the decision.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DecisionSink for TracingSink {
    fn record(&self, record: &DecisionRecord) {
        match record.decision {
            Decision::Allow => tracing::debug!(
                layer = %record.layer,
                method = record.method.as_deref().unwrap_or(""),
                message_size = record.message_size,
                "message allowed"
            ),
            Decision::Block => tracing::warn!(
                layer = %record.layer,
                severity = %record.severity,
                violation = %record.violation,
                reason = %record.reason,
                method = record.method.as_deref().unwrap_or(""),
                message_size = record.message_size,
                "message blocked"
            ),
        }
    }
}

/// Collects records in memory; used by tests and the shutdown report.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.lock().expect("sink lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DecisionSink for MemorySink {
    fn record(&self, record: &DecisionRecord) {
        self.records
            .lock()
            .expect("sink lock poisoned")
            .push(record.clone());
    }
}
