//! JSON-RPC 2.0 and MCP protocol definitions
//!
//! The validation pipeline consumes raw [`serde_json::Value`] messages so that
//! malformed input can be inspected rather than rejected at the parse
//! boundary; the typed structures here are used by the transport wrapper for
//! classification and by the layers for method metadata.

pub mod jsonrpc;
pub mod mcp;

pub use jsonrpc::{classify, normalize, MessageKind, RequestId, JSONRPC_VERSION};
pub use mcp::{MethodShape, MethodTable, ParamKind};
