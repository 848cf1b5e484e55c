//! mcpwarden - Security validation middleware for MCP servers
//!
//! Sits between a Model Context Protocol transport and the host protocol
//! layer, inspecting every inbound JSON-RPC 2.0 message through a five-layer
//! pipeline: structure, content, behavior, semantics, and host-supplied
//! contextual checks. Blocked requests receive sanitized error responses
//! with stable correlation tokens; blocked notifications are dropped;
//! responses pass through untouched.
//!
//! # Modules
//!
//! - `canonical` - encoding-evasion neutralizer feeding all content checks
//! - `catalog` - declarative attack-pattern catalog with anti-ReDoS load validation
//! - `layers` - the five validation layers
//! - `policy` - tool contracts, resource rules, quotas, sessions, chaining
//! - `pipeline` - ordered layer execution and result normalization
//! - `sanitize` - leakage-free error responses and credential redaction
//! - `transport` - transport trait and the secure wrapper
//! - `server` - the embedder-facing assembly
//!
//! # Example
//!
//! ```rust,ignore
//! use mcpwarden::server::{SecureMcpServer, ServerInfo, ServerOptions};
//!
//! let mut server = SecureMcpServer::new(
//!     ServerInfo::new("docs-server", "1.0.0"),
//!     ServerOptions::default(),
//! )?;
//! server.connect(transport).await?;
//! while let Some(message) = server.next_message().await? {
//!     // only validated messages arrive here
//! }
//! ```

pub mod canonical;
pub mod catalog;
pub mod errors;
pub mod layers;
pub mod logging;
pub mod pipeline;
pub mod policy;
pub mod protocol;
pub mod sanitize;
pub mod server;
pub mod transport;

// Re-export commonly used types
pub use canonical::canonicalize;
pub use errors::WardenError;
pub use pipeline::{Pipeline, Severity, ValidationContext, Verdict, ViolationType};
pub use server::{SecureMcpServer, SecurityReport, ServerInfo, ServerOptions};
pub use transport::{SecureTransport, Transport};
