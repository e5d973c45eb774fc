//! Domain types for Loopgate
//!
//! This module contains the core domain types:
//! - LoopDefinition: external, read-only workflow definition (phases + gates)
//! - LoopExecution: the root aggregate owned by the execution engine
//! - LogEntry: append-only structured log entries on an execution

pub mod execution;
pub mod log;
pub mod loop_def;

pub use execution::{
    ExecutionStatus, GateState, GateStatus, LoopExecution, PhaseExecution, PhaseStatus,
    SkillExecutionRecord, SkillState, SkillStatus,
};
pub use log::{LogEntry, LogFilter, LogLevel};
pub use loop_def::{GateDefinition, LoopDefinition, PhaseDefinition};
