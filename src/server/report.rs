//! Shutdown security report

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::logging::{Decision, DecisionRecord, DecisionSink};

/// Aggregate of every pipeline decision taken during a server's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityReport {
    pub total_messages: u64,
    pub allowed: u64,
    pub blocked: u64,
    pub blocked_by_violation: HashMap<String, u64>,
    pub blocked_by_layer: HashMap<String, u64>,
}

/// Sink that counts decisions and optionally forwards them to another sink.
///
/// Allow records are forwarded only in verbose mode; blocks always go
/// through.
pub struct ReportCollector {
    allowed: AtomicU64,
    blocked: AtomicU64,
    by_violation: Mutex<HashMap<String, u64>>,
    by_layer: Mutex<HashMap<String, u64>>,
    inner: Option<Arc<dyn DecisionSink>>,
    forward_allows: bool,
}

impl ReportCollector {
    pub fn new(inner: Option<Arc<dyn DecisionSink>>, forward_allows: bool) -> Self {
        Self {
            allowed: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            by_violation: Mutex::new(HashMap::new()),
            by_layer: Mutex::new(HashMap::new()),
            inner,
            forward_allows,
        }
    }

    pub fn report(&self) -> SecurityReport {
        let allowed = self.allowed.load(Ordering::Relaxed);
        let blocked = self.blocked.load(Ordering::Relaxed);
        SecurityReport {
            total_messages: allowed + blocked,
            allowed,
            blocked,
            blocked_by_violation: self.by_violation.lock().expect("report lock").clone(),
            blocked_by_layer: self.by_layer.lock().expect("report lock").clone(),
        }
    }
}

impl DecisionSink for ReportCollector {
    fn record(&self, record: &DecisionRecord) {
        match record.decision {
            Decision::Allow => {
                self.allowed.fetch_add(1, Ordering::Relaxed);
                if self.forward_allows {
                    if let Some(inner) = &self.inner {
                        inner.record(record);
                    }
                }
            }
            Decision::Block => {
                self.blocked.fetch_add(1, Ordering::Relaxed);
                *self
                    .by_violation
                    .lock()
                    .expect("report lock")
                    .entry(record.violation.as_str().to_string())
                    .or_insert(0) += 1;
                *self
                    .by_layer
                    .lock()
                    .expect("report lock")
                    .entry(record.layer.clone())
                    .or_insert(0) += 1;
                if let Some(inner) = &self.inner {
                    inner.record(record);
                }
            }
        }
    }
}
