//! Layer 3 - behavior
//!
//! Sliding-window rate and burst tracking plus automation heuristics.
//! Windows are driven by the context timestamp rather than wall-clock reads,
//! so tests (and hosts replaying traffic) control time explicitly. State
//! lives behind one mutex and every check is O(1) amortized; the periodic
//! sweep runs inline under the same lock with O(keys) work at most once a
//! minute.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::pipeline::context::ValidationContext;
use crate::pipeline::result::{LayerResult, Severity, ViolationType};

use super::ValidationLayer;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
/// The burst ring keeps this much history.
const BURST_RING_MS: i64 = 30_000;
/// Burst threshold is evaluated over this trailing window.
const BURST_WINDOW_MS: i64 = 10_000;
/// Sweep cadence and retention.
const SWEEP_INTERVAL_MS: i64 = 60_000;
const COUNTER_IDLE_MS: i64 = 2 * HOUR_MS;

static PROBING_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:test|probe|check|scan|enum)|admin|secret|key|config|password")
        .expect("probing method regex")
});

/// Behavior layer tuning.
#[derive(Debug, Clone)]
pub struct BehaviorConfig {
    pub max_per_minute: u32,
    pub max_per_hour: u32,
    pub burst_threshold: usize,
    pub oversize_bytes: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 120,
            max_per_hour: 2_000,
            burst_threshold: 10,
            oversize_bytes: 20_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    window_start: i64,
}

impl Window {
    fn bump(&mut self, window_ms: i64, now_ms: i64) -> u32 {
        if now_ms - self.window_start > window_ms {
            self.count = 0;
            self.window_start = now_ms;
        }
        self.count += 1;
        self.count
    }
}

#[derive(Debug)]
struct KeyCounters {
    minute: Window,
    hour: Window,
    last_seen: i64,
}

#[derive(Debug, Default)]
struct BehaviorState {
    counters: HashMap<String, KeyCounters>,
    /// Request timestamps within the last [`BURST_RING_MS`]
    ring: VecDeque<i64>,
    /// Last six arrival timestamps for the timing heuristic
    arrivals: VecDeque<i64>,
    last_sweep: i64,
}

pub struct BehaviorLayer {
    config: BehaviorConfig,
    state: Mutex<BehaviorState>,
}

impl BehaviorLayer {
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BehaviorState::default()),
        }
    }

    /// Drop ring entries older than an hour and counters idle for two. Also
    /// called on shutdown.
    pub fn cleanup(&self, now_ms: i64) {
        let mut state = self.state.lock().expect("behavior lock poisoned");
        Self::sweep_locked(&mut state, now_ms);
    }

    fn sweep_locked(state: &mut BehaviorState, now_ms: i64) {
        state.ring.retain(|&t| now_ms - t <= HOUR_MS);
        state
            .counters
            .retain(|_, c| now_ms - c.last_seen <= COUNTER_IDLE_MS);
        state.last_sweep = now_ms;
    }

    fn check_rates(
        &self,
        state: &mut BehaviorState,
        key: &str,
        now_ms: i64,
    ) -> Option<LayerResult> {
        let counters = state
            .counters
            .entry(key.to_string())
            .or_insert_with(|| KeyCounters {
                minute: Window {
                    count: 0,
                    window_start: now_ms,
                },
                hour: Window {
                    count: 0,
                    window_start: now_ms,
                },
                last_seen: now_ms,
            });
        counters.last_seen = now_ms;

        let minute_count = counters.minute.bump(MINUTE_MS, now_ms);
        if minute_count > self.config.max_per_minute {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::RateLimitExceeded,
                format!(
                    "{} requests in the last minute (limit {})",
                    minute_count, self.config.max_per_minute
                ),
            ));
        }
        let hour_count = counters.hour.bump(HOUR_MS, now_ms);
        if hour_count > self.config.max_per_hour {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::RateLimitExceeded,
                format!(
                    "{} requests in the last hour (limit {})",
                    hour_count, self.config.max_per_hour
                ),
            ));
        }
        None
    }

    fn check_burst(&self, state: &mut BehaviorState, now_ms: i64) -> Option<LayerResult> {
        state.ring.push_back(now_ms);
        while let Some(&front) = state.ring.front() {
            if now_ms - front > BURST_RING_MS {
                state.ring.pop_front();
            } else {
                break;
            }
        }
        let recent = state
            .ring
            .iter()
            .rev()
            .take_while(|&&t| now_ms - t <= BURST_WINDOW_MS)
            .count();
        if recent > self.config.burst_threshold {
            return Some(LayerResult::block(
                Severity::High,
                ViolationType::BurstActivity,
                format!(
                    "{} requests in {} seconds (burst threshold {})",
                    recent,
                    BURST_WINDOW_MS / 1_000,
                    self.config.burst_threshold
                ),
            ));
        }
        None
    }

    fn check_timing(&self, state: &mut BehaviorState, now_ms: i64) -> Option<LayerResult> {
        state.arrivals.push_back(now_ms);
        while state.arrivals.len() > 6 {
            state.arrivals.pop_front();
        }
        if state.arrivals.len() < 6 {
            return None;
        }
        let intervals: Vec<f64> = state
            .arrivals
            .iter()
            .zip(state.arrivals.iter().skip(1))
            .map(|(a, b)| (b - a) as f64)
            .collect();
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let variance =
            intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
        let std_dev = variance.sqrt();
        if (100.0..=2_000.0).contains(&mean) && std_dev < 50.0 {
            return Some(LayerResult::block(
                Severity::Medium,
                ViolationType::AutomatedTiming,
                format!(
                    "metronomic request timing (mean {:.0} ms, stddev {:.1} ms)",
                    mean, std_dev
                ),
            ));
        }
        None
    }

    fn check_probing(&self, message: &Value) -> Option<LayerResult> {
        let method = message.get("method")?.as_str()?;
        if PROBING_METHOD.is_match(method) {
            return Some(LayerResult::block(
                Severity::Low,
                ViolationType::SuspiciousMethod,
                format!("probing method name: {}", method),
            ));
        }
        None
    }
}

impl ValidationLayer for BehaviorLayer {
    fn name(&self) -> &str {
        "Layer3-Behavior"
    }

    fn validate(&self, message: &Value, ctx: &mut ValidationContext) -> LayerResult {
        let now_ms = ctx.now_ms();
        let key = ctx.session_key().to_string();
        let mut state = self.state.lock().expect("behavior lock poisoned");

        if now_ms - state.last_sweep >= SWEEP_INTERVAL_MS {
            Self::sweep_locked(&mut state, now_ms);
        }

        if let Some(result) = self.check_rates(&mut state, &key, now_ms) {
            return result;
        }
        if let Some(result) = self.check_burst(&mut state, now_ms) {
            return result;
        }

        let size = serde_json::to_string(message).map(|s| s.len()).unwrap_or(0);
        if size > self.config.oversize_bytes {
            return LayerResult::block(
                Severity::Medium,
                ViolationType::OversizedMessage,
                format!(
                    "message is {} bytes (oversize threshold {})",
                    size, self.config.oversize_bytes
                ),
            );
        }

        if let Some(result) = self.check_timing(&mut state, now_ms) {
            return result;
        }
        drop(state);

        if let Some(result) = self.check_probing(message) {
            return result;
        }
        LayerResult::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ctx_at(ms: i64) -> ValidationContext {
        ValidationContext::new(Utc.timestamp_millis_opt(ms).unwrap())
    }

    fn ping() -> Value {
        json!({"jsonrpc": "2.0", "method": "tools/list", "id": 1})
    }

    fn config(per_minute: u32, burst: usize) -> BehaviorConfig {
        BehaviorConfig {
            max_per_minute: per_minute,
            max_per_hour: 10_000,
            burst_threshold: burst,
            oversize_bytes: 20_000,
        }
    }

    fn expect_violation(result: LayerResult, violation: ViolationType) {
        match result {
            LayerResult::Block(b) => assert_eq!(b.violation, violation, "reason: {}", b.reason),
            LayerResult::Pass => panic!("expected {:?}", violation),
        }
    }

    #[test]
    fn minute_rate_boundary() {
        let layer = BehaviorLayer::new(config(3, 1_000));
        let msg = ping();
        // Spread out so the burst check stays quiet
        for i in 0..3 {
            let result = layer.validate(&msg, &mut ctx_at(i * 15_000));
            assert!(result.is_pass(), "request {} should pass", i);
        }
        expect_violation(
            layer.validate(&msg, &mut ctx_at(55_000)),
            ViolationType::RateLimitExceeded,
        );
    }

    #[test]
    fn minute_window_resets() {
        let layer = BehaviorLayer::new(config(2, 1_000));
        let msg = ping();
        assert!(layer.validate(&msg, &mut ctx_at(0)).is_pass());
        assert!(layer.validate(&msg, &mut ctx_at(30_000)).is_pass());
        // Past the minute window the counter starts over
        assert!(layer.validate(&msg, &mut ctx_at(70_000)).is_pass());
        assert!(layer.validate(&msg, &mut ctx_at(80_000)).is_pass());
    }

    #[test]
    fn rate_counters_keyed_by_session() {
        let layer = BehaviorLayer::new(config(1, 1_000));
        let msg = ping();
        let mut a = ctx_at(0).with_session("a");
        let mut b = ctx_at(0).with_session("b");
        assert!(layer.validate(&msg, &mut a).is_pass());
        assert!(layer.validate(&msg, &mut b).is_pass());
        let mut a2 = ctx_at(1_000).with_session("a");
        expect_violation(
            layer.validate(&msg, &mut a2),
            ViolationType::RateLimitExceeded,
        );
    }

    #[test]
    fn burst_boundary() {
        let layer = BehaviorLayer::new(config(1_000, 4));
        let msg = ping();
        // Exactly burst_threshold requests inside 10s pass
        for i in 0..4 {
            assert!(layer.validate(&msg, &mut ctx_at(i * 100)).is_pass());
        }
        // One more trips the burst check
        expect_violation(
            layer.validate(&msg, &mut ctx_at(500)),
            ViolationType::BurstActivity,
        );
    }

    #[test]
    fn burst_window_slides() {
        let layer = BehaviorLayer::new(config(1_000, 2));
        let msg = ping();
        assert!(layer.validate(&msg, &mut ctx_at(0)).is_pass());
        assert!(layer.validate(&msg, &mut ctx_at(1_000)).is_pass());
        // 12s later the first two are outside the 10s window
        assert!(layer.validate(&msg, &mut ctx_at(12_000)).is_pass());
        assert!(layer.validate(&msg, &mut ctx_at(12_100)).is_pass());
    }

    #[test]
    fn oversize_message() {
        let layer = BehaviorLayer::new(config(1_000, 1_000));
        let big = json!({
            "jsonrpc": "2.0", "method": "tools/call", "id": 1,
            "params": {"name": "t", "arguments": {"blob": "z".repeat(20_001)}}
        });
        expect_violation(
            layer.validate(&big, &mut ctx_at(0)),
            ViolationType::OversizedMessage,
        );
    }

    #[test]
    fn automated_timing_detected() {
        let layer = BehaviorLayer::new(config(1_000, 1_000));
        let msg = ping();
        // Six arrivals exactly 500ms apart: mean 500, stddev 0
        let mut result = LayerResult::Pass;
        for i in 0..6 {
            result = layer.validate(&msg, &mut ctx_at(i * 500));
        }
        expect_violation(result, ViolationType::AutomatedTiming);
    }

    #[test]
    fn human_timing_passes() {
        let layer = BehaviorLayer::new(config(1_000, 1_000));
        let msg = ping();
        // Jittered arrivals: stddev well above 50ms
        let times = [0, 400, 1_300, 1_500, 2_900, 3_100];
        for t in times {
            assert!(layer.validate(&msg, &mut ctx_at(t)).is_pass());
        }
    }

    #[test]
    fn probing_method_names() {
        let layer = BehaviorLayer::new(BehaviorConfig::default());
        for method in ["test_access", "probe1", "scan/hosts", "get_admin_token", "read_config"] {
            let msg = json!({"jsonrpc": "2.0", "method": method, "id": 1});
            expect_violation(
                layer.validate(&msg, &mut ctx_at(0)),
                ViolationType::SuspiciousMethod,
            );
        }
    }

    #[test]
    fn normal_methods_not_probing() {
        let layer = BehaviorLayer::new(BehaviorConfig::default());
        for method in ["tools/call", "resources/read", "prompts/get", "initialize"] {
            let msg = json!({"jsonrpc": "2.0", "method": method, "id": 1});
            assert!(layer.validate(&msg, &mut ctx_at(0)).is_pass(), "{}", method);
        }
    }

    #[test]
    fn sweep_drops_idle_counters() {
        let layer = BehaviorLayer::new(config(1_000, 1_000));
        let msg = ping();
        let mut a = ctx_at(0).with_session("old");
        assert!(layer.validate(&msg, &mut a).is_pass());
        layer.cleanup(3 * HOUR_MS);
        let state = layer.state.lock().unwrap();
        assert!(state.counters.is_empty());
        assert!(state.ring.is_empty());
    }
}
