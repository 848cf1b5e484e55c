//! Semantic policy engine
//!
//! Tool contracts, resource access rules, method chaining, quota counters,
//! and session memory. The semantic layer wires these onto a message; each
//! piece is independently usable and injectable.

pub mod chaining;
pub mod quota;
pub mod resources;
pub mod session;
pub mod tools;

pub use chaining::{ChainingPolicy, ChainingRule};
pub use quota::{MemoryQuotaProvider, QuotaDecision, QuotaLimits, QuotaProvider};
pub use resources::{normalize_path, ResourcePolicy, ResourcePolicyBuilder};
pub use session::SessionMemory;
pub use tools::{ArgSpec, ArgViolation, SideEffectClass, ToolRegistry, ToolSpec};
