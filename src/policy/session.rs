//! Session memory
//!
//! LRU + TTL map from session key to the last validated method, used by the
//! chaining check. Get refreshes recency; set evicts the least recently used
//! entry at capacity; entries past their TTL are invisible and dropped
//! lazily. All operations are O(1) amortized: recency is a queue of
//! `(key, sequence)` pairs with lazy deletion, so no scan is ever needed.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Entry {
    method: String,
    stored_at_ms: i64,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<String, Entry>,
    /// Recency queue; stale pairs (seq mismatch) are skipped on pop.
    order: VecDeque<(String, u64)>,
    next_seq: u64,
}

/// Bounded map of `session key -> last method`.
pub struct SessionMemory {
    inner: Mutex<Inner>,
    max_entries: usize,
    ttl_ms: i64,
}

impl SessionMemory {
    pub fn new(max_entries: usize, ttl_ms: i64) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: max_entries.max(1),
            ttl_ms,
        }
    }

    /// Last method for a session, refreshing its recency. Expired entries
    /// are removed and reported as absent.
    pub fn get(&self, key: &str, now_ms: i64) -> Option<String> {
        let mut inner = self.inner.lock().expect("session lock poisoned");
        let expired = match inner.map.get(key) {
            None => return None,
            Some(entry) => now_ms - entry.stored_at_ms > self.ttl_ms,
        };
        if expired {
            inner.map.remove(key);
            return None;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let entry = inner.map.get_mut(key).expect("checked above");
        entry.seq = seq;
        let method = entry.method.clone();
        inner.order.push_back((key.to_string(), seq));
        Some(method)
    }

    /// Record the last method for a session, evicting the LRU entry at
    /// capacity.
    pub fn set(&self, key: &str, method: impl Into<String>, now_ms: i64) {
        let mut inner = self.inner.lock().expect("session lock poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let is_new = !inner.map.contains_key(key);
        if is_new && inner.map.len() >= self.max_entries {
            // Pop recency pairs until one still points at a live entry
            while let Some((candidate, candidate_seq)) = inner.order.pop_front() {
                let live = inner
                    .map
                    .get(&candidate)
                    .map(|e| e.seq == candidate_seq)
                    .unwrap_or(false);
                if live {
                    inner.map.remove(&candidate);
                    break;
                }
            }
        }

        inner.map.insert(
            key.to_string(),
            Entry {
                method: method.into(),
                stored_at_ms: now_ms,
                seq,
            },
        );
        inner.order.push_back((key.to_string(), seq));
    }

    /// Drop every expired entry.
    pub fn cleanup(&self, now_ms: i64) {
        let mut inner = self.inner.lock().expect("session lock poisoned");
        let ttl = self.ttl_ms;
        inner
            .map
            .retain(|_, entry| now_ms - entry.stored_at_ms <= ttl);
        // Compact the recency queue so lazy deletions cannot pile up
        let map = &inner.map;
        let retained: VecDeque<(String, u64)> = inner
            .order
            .iter()
            .filter(|(k, seq)| map.get(k).map(|e| e.seq == *seq).unwrap_or(false))
            .cloned()
            .collect();
        inner.order = retained;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session lock poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
