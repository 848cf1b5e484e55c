//! Validation layers
//!
//! Each layer implements [`ValidationLayer`] over a raw message value and a
//! mutable context. Layers are pure CPU - they never suspend - and return a
//! [`LayerResult`]; the pipeline owns ordering, short-circuiting, and result
//! normalization.

pub mod behavior;
pub mod content;
pub mod contextual;
pub mod semantic;
pub mod structure;

use serde_json::Value;

use crate::pipeline::context::ValidationContext;
use crate::pipeline::result::LayerResult;

/// A single validation layer.
pub trait ValidationLayer: Send + Sync {
    /// Stable name used in decision records and error correlation,
    /// e.g. `"Layer1-Structure"`.
    fn name(&self) -> &str;

    /// Disabled layers are skipped by the pipeline.
    fn enabled(&self) -> bool {
        true
    }

    /// Inspect one message. The context carries the canonical string once
    /// the content layer has produced it.
    fn validate(&self, message: &Value, ctx: &mut ValidationContext) -> LayerResult;
}

pub use behavior::{BehaviorConfig, BehaviorLayer};
pub use content::{ContentConfig, ContentLayer};
pub use contextual::{ContextualLayer, ValidatorConfig};
pub use semantic::SemanticLayer;
pub use structure::{StructureConfig, StructureLayer};
