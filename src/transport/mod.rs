//! Transport layer
//!
//! The [`Transport`] trait abstracts over stdio, streamable HTTP, or any
//! other byte pipe the host wires up; the core only needs receive/send of
//! opaque JSON values. [`SecureTransport`] wraps a transport with the
//! validation pipeline.

pub mod mock;
mod secure;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use secure::{InboundDecision, SecureTransport};

/// MCP transport abstraction, server side.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin receiving. Idempotent.
    async fn start(&mut self) -> Result<()>;

    /// Next inbound message, or `None` when the peer is gone.
    async fn receive(&mut self) -> Result<Option<Value>>;

    /// Send one message to the peer.
    async fn send(&mut self, message: Value) -> Result<()>;

    /// Close the transport.
    async fn close(&mut self) -> Result<()>;

    /// Transport-assigned session identifier, when there is one.
    fn session_id(&self) -> Option<String> {
        None
    }
}
