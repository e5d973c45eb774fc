//! Validation context.

use std::path::PathBuf;

use crate::registry::condition::ConditionScope;

/// Shared context handed to every validator in one validation request.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub execution_id: String,
    pub loop_id: String,
    /// Empty for gate-level validation (gates are not skill-scoped)
    pub skill_id: String,
    pub phase: String,
    pub mode: String,
    /// Resolved project directory; globs and git commands run here
    pub project_path: PathBuf,
}

impl ValidationContext {
    /// Condition scope derived from this context.
    pub fn condition_scope(&self) -> ConditionScope {
        ConditionScope {
            mode: self.mode.clone(),
            phase: self.phase.clone(),
            skill_id: self.skill_id.clone(),
            loop_id: self.loop_id.clone(),
        }
    }
}
