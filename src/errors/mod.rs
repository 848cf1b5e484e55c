//! Crate error types
//!
//! Configuration and catalog errors surface at construction time; validation
//! outcomes are not errors and travel as [`crate::pipeline::Verdict`] values.

use thiserror::Error;

/// Main error type for mcpwarden
#[derive(Error, Debug)]
pub enum WardenError {
    /// An attack pattern failed to compile or failed the linear-time check
    #[error("invalid pattern '{name}' in family '{family}': {message}")]
    InvalidPattern {
        family: String,
        name: String,
        message: String,
    },

    /// A deny glob could not be translated to an anchored regex
    #[error("invalid deny glob '{glob}': {message}")]
    InvalidGlob { glob: String, message: String },

    /// Server options failed validation
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Resource policy rejected its own construction inputs
    #[error("invalid resource policy: {message}")]
    InvalidResourcePolicy { message: String },

    /// Transport failure while sending a blocked-request error response
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl WardenError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
