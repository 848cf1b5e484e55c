//! Per-key quota counters
//!
//! Minute and hour buckets keyed by opaque strings such as `tool:<name>` or
//! `method:resources/read`. Increment-and-check is atomic per key - a single
//! mutex guards the map, and each call does O(1) work under it - so two
//! concurrent calls can never both land on count == limit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 3_600_000;

/// Limits to apply on one increment. Buckets without a limit are not
/// tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaLimits {
    pub per_minute: Option<u32>,
    pub per_hour: Option<u32>,
}

impl QuotaLimits {
    pub fn per_minute(limit: u32) -> Self {
        Self {
            per_minute: Some(limit),
            per_hour: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.per_minute.is_none() && self.per_hour.is_none()
    }
}

/// Outcome of an increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub passed: bool,
    pub reason: Option<String>,
}

impl QuotaDecision {
    fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    fn fail(reason: String) -> Self {
        Self {
            passed: false,
            reason: Some(reason),
        }
    }
}

/// Quota backend interface. The in-memory implementation below is the
/// default; hosts can inject their own (e.g. shared across processes).
pub trait QuotaProvider: Send + Sync {
    /// Count one event against `key` and report whether any bucket limit is
    /// now exceeded. Atomic per key.
    fn increment_and_check(&self, key: &str, limits: QuotaLimits, now_ms: i64) -> QuotaDecision;

    /// Drop buckets whose window is stale; O(1) per key.
    fn sweep(&self, now_ms: i64);

    /// Stop background work and clear state.
    fn destroy(&self);
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    window_start: i64,
}

#[derive(Debug, Default, Clone, Copy)]
struct KeyCounters {
    minute: Option<Bucket>,
    hour: Option<Bucket>,
}

/// In-memory quota provider.
pub struct MemoryQuotaProvider {
    counters: Mutex<HashMap<String, KeyCounters>>,
    clock_skew_ms: i64,
    destroyed: AtomicBool,
}

impl MemoryQuotaProvider {
    pub fn new(clock_skew_ms: i64) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            clock_skew_ms,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn key_count(&self) -> usize {
        self.counters.lock().expect("quota lock poisoned").len()
    }

    fn bump(bucket: &mut Option<Bucket>, window_ms: i64, skew_ms: i64, now_ms: i64) -> u32 {
        let b = bucket.get_or_insert(Bucket {
            count: 0,
            window_start: now_ms,
        });
        if now_ms - b.window_start > window_ms + skew_ms {
            b.count = 0;
            b.window_start = now_ms;
        }
        b.count += 1;
        b.count
    }
}

impl Default for MemoryQuotaProvider {
    fn default() -> Self {
        Self::new(5_000)
    }
}

impl QuotaProvider for MemoryQuotaProvider {
    fn increment_and_check(&self, key: &str, limits: QuotaLimits, now_ms: i64) -> QuotaDecision {
        if limits.is_empty() || self.destroyed.load(Ordering::Relaxed) {
            return QuotaDecision::pass();
        }
        let mut counters = self.counters.lock().expect("quota lock poisoned");
        let entry = counters.entry(key.to_string()).or_default();

        if let Some(limit) = limits.per_minute {
            let count = Self::bump(&mut entry.minute, MINUTE_MS, self.clock_skew_ms, now_ms);
            if count > limit {
                return QuotaDecision::fail(format!(
                    "Per-minute quota exceeded for {}: {}/{}",
                    key, count, limit
                ));
            }
        }
        if let Some(limit) = limits.per_hour {
            let count = Self::bump(&mut entry.hour, HOUR_MS, self.clock_skew_ms, now_ms);
            if count > limit {
                return QuotaDecision::fail(format!(
                    "Per-hour quota exceeded for {}: {}/{}",
                    key, count, limit
                ));
            }
        }
        QuotaDecision::pass()
    }

    fn sweep(&self, now_ms: i64) {
        let mut counters = self.counters.lock().expect("quota lock poisoned");
        counters.retain(|_, entry| {
            let stale = |b: &Option<Bucket>, window_ms: i64| {
                b.map(|b| now_ms - b.window_start > 2 * window_ms + self.clock_skew_ms)
                    .unwrap_or(true)
            };
            if stale(&entry.minute, MINUTE_MS) {
                entry.minute = None;
            }
            if stale(&entry.hour, HOUR_MS) {
                entry.hour = None;
            }
            entry.minute.is_some() || entry.hour.is_some()
        });
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Relaxed);
        self.counters
            .lock()
            .expect("quota lock poisoned")
            .clear();
    }
}
