//! In-memory transport for tests and embedding experiments

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::Transport;

/// Scripted transport: serves queued inbound messages and records what the
/// middleware sends back.
#[derive(Default)]
pub struct MockTransport {
    inbound: VecDeque<Value>,
    sent: Arc<Mutex<Vec<Value>>>,
    session_id: Option<String>,
    started: bool,
    closed: bool,
}

impl MockTransport {
    pub fn new(inbound: Vec<Value>) -> Self {
        Self {
            inbound: inbound.into(),
            ..Default::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Shared handle to everything sent through this transport.
    pub fn sent_handle(&self) -> Arc<Mutex<Vec<Value>>> {
        Arc::clone(&self.sent)
    }

    pub fn push_inbound(&mut self, message: Value) {
        self.inbound.push_back(message);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<Value>> {
        Ok(self.inbound.pop_front())
    }

    async fn send(&mut self, message: Value) -> Result<()> {
        self.sent.lock().expect("sent lock poisoned").push(message);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }
}
