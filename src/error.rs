//! Error types for Loopgate
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::guarantee::result::GuaranteeResult;

/// All error types that can occur in Loopgate
#[derive(Debug, Error)]
pub enum LoopgateError {
    /// Loop definition not found by the resolver
    #[error("Loop not found: {0}")]
    LoopNotFound(String),

    /// Execution not found in the working set
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    /// Skill not found in the current phase
    #[error("Skill not found in phase {phase}: {skill_id}")]
    SkillNotFound { phase: String, skill_id: String },

    /// Gate not found on the execution
    #[error("Gate not found: {0}")]
    GateNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// One or more required guarantees failed validation
    #[error("Guarantee violation: {} blocking guarantee(s) failed", blocking.len())]
    GuaranteeViolation { blocking: Vec<GuaranteeResult> },

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Git subprocess error
    #[error("Git error: {0}")]
    Git(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoopgateError {
    /// The blocking guarantee results carried by a violation, if any.
    pub fn blocking_guarantees(&self) -> &[GuaranteeResult] {
        match self {
            LoopgateError::GuaranteeViolation { blocking } => blocking,
            _ => &[],
        }
    }
}

/// Result type alias for Loopgate operations
pub type Result<T> = std::result::Result<T, LoopgateError>;
