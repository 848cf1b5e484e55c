//! Per-message validation context

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Side-effect capabilities granted to the sender of a message.
///
/// `read` is always allowed; writes and network egress are opt-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideEffectPolicy {
    pub allow_network: bool,
    pub allow_writes: bool,
}

/// Accompanies a message through the pipeline.
///
/// The canonical string, once filled by the content layer, is identical for
/// all subsequent layers - semantic checks must read it rather than the raw
/// input so that nothing the canonicalizer would have stripped can slip by.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    pub transport_level: bool,
    pub policy: SideEffectPolicy,
    pub base_dir: Option<PathBuf>,
    /// Canonical form of the serialized message, filled by the content layer
    pub canonical: Option<String>,
}

impl ValidationContext {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            session_id: None,
            client_id: None,
            transport_level: false,
            policy: SideEffectPolicy::default(),
            base_dir: None,
            canonical: None,
        }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_policy(mut self, policy: SideEffectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Key used by session memory and contextual validators.
    pub fn session_key(&self) -> &str {
        self.session_id
            .as_deref()
            .or(self.client_id.as_deref())
            .unwrap_or("global")
    }

    /// Millisecond timestamp used by the window-based layers.
    pub fn now_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
