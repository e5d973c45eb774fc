//! Execution engine.
//!
//! State machine over live loop executions with full-snapshot persistence.

pub mod engine;
pub mod precontext;
pub mod snapshot;

pub use engine::{ExecutionEngine, ExecutionSummary, GateOptions, SkillResult, StartOutcome};
pub use precontext::{PreLoopContext, SkillContext};
