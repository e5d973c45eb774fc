//! Loop execution aggregate.
//!
//! `LoopExecution` is the root aggregate of the engine: phase, skill, and
//! gate state plus append-only history and logs. It is mutated exclusively
//! through the engine's public operations and persisted as a whole snapshot
//! after every mutation.

use serde::{Deserialize, Serialize};

use crate::domain::log::LogEntry;
use crate::domain::loop_def::LoopDefinition;
use crate::id::{generate_execution_id, now_ms};

/// Status of a whole loop execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Progressing through phases
    Active,
    /// User-initiated pause (resumable)
    Paused,
    /// A guarantee violation or gate rejection stopped progress (resumable)
    Blocked,
    /// Final phase advanced past, terminal
    Completed,
    /// Aborted, terminal
    Failed,
}

impl ExecutionStatus {
    /// Returns true if the execution is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Active => "active",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Blocked => "blocked",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

/// Status of a phase within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Completed,
}

/// Status of a skill within a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkillStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
    Failed,
}

impl SkillStatus {
    /// A resolved skill no longer blocks phase completion
    pub fn is_resolved(&self) -> bool {
        matches!(self, SkillStatus::Completed | SkillStatus::Skipped)
    }
}

/// Status of an approval gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Pending,
    Approved,
    Rejected,
}

/// Per-skill state within a phase execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillState {
    pub skill_id: String,
    pub status: SkillStatus,
}

/// Per-phase state within an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseExecution {
    pub name: String,
    pub status: PhaseStatus,
    pub skills: Vec<SkillState>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl PhaseExecution {
    /// Mark the phase in-progress with a start timestamp.
    pub fn begin(&mut self, now: i64) {
        self.status = PhaseStatus::InProgress;
        self.started_at = Some(now);
    }

    /// Mark the phase completed with a completion timestamp.
    pub fn complete(&mut self, now: i64) {
        self.status = PhaseStatus::Completed;
        self.completed_at = Some(now);
    }

    /// Skills not yet resolved (neither completed nor skipped).
    pub fn unresolved_skills(&self) -> Vec<&str> {
        self.skills
            .iter()
            .filter(|s| !s.status.is_resolved())
            .map(|s| s.skill_id.as_str())
            .collect()
    }

    /// Look up a skill's state by id.
    pub fn skill_mut(&mut self, skill_id: &str) -> Option<&mut SkillState> {
        self.skills.iter_mut().find(|s| s.skill_id == skill_id)
    }
}

/// Approval state of a gate on an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateState {
    pub gate_id: String,
    pub status: GateStatus,
    pub approved_by: Option<String>,
    pub timestamp: Option<i64>,
    pub feedback: Option<String>,
}

/// Append-only record of one completed/attempted skill run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillExecutionRecord {
    pub id: String,
    pub skill_id: String,
    pub skill_version: Option<String>,
    pub phase: String,
    pub status: SkillStatus,
    pub started_at: Option<i64>,
    pub completed_at: i64,
    #[serde(default)]
    pub deliverables: Vec<String>,
    pub outcome_score: Option<f64>,
}

/// The root aggregate: one running (or finished) instance of a loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopExecution {
    //=== Identity ===
    pub id: String,
    pub loop_id: String,
    pub loop_version: String,
    pub project: String,
    pub mode: String,
    pub autonomy: String,

    //=== State ===
    /// Name of the phase presently active; at most one phase is in-progress
    pub current_phase: String,
    pub status: ExecutionStatus,
    pub phases: Vec<PhaseExecution>,
    pub gates: Vec<GateState>,

    //=== History ===
    /// Append-only history of skill runs
    #[serde(default)]
    pub skill_executions: Vec<SkillExecutionRecord>,
    /// Append-only structured log; pruning is a collaborator concern
    #[serde(default)]
    pub logs: Vec<LogEntry>,

    //=== Timestamps ===
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl LoopExecution {
    /// Build a fresh execution from a loop definition. Every phase, skill,
    /// and gate starts pending; the engine begins the first phase.
    pub fn new(definition: &LoopDefinition, project: &str, mode: &str, autonomy: &str) -> Self {
        let now = now_ms();
        let phases = definition
            .phases
            .iter()
            .map(|p| PhaseExecution {
                name: p.name.clone(),
                status: PhaseStatus::Pending,
                skills: p
                    .skills
                    .iter()
                    .map(|s| SkillState {
                        skill_id: s.clone(),
                        status: SkillStatus::Pending,
                    })
                    .collect(),
                started_at: None,
                completed_at: None,
            })
            .collect();

        let gates = definition
            .gates
            .iter()
            .map(|g| GateState {
                gate_id: g.id.clone(),
                status: GateStatus::Pending,
                approved_by: None,
                timestamp: None,
                feedback: None,
            })
            .collect();

        Self {
            id: generate_execution_id(),
            loop_id: definition.id.clone(),
            loop_version: definition.version.clone(),
            project: project.to_string(),
            mode: mode.to_string(),
            autonomy: autonomy.to_string(),
            current_phase: definition.phases.first().map(|p| p.name.clone()).unwrap_or_default(),
            status: ExecutionStatus::Active,
            phases,
            gates,
            skill_executions: Vec::new(),
            logs: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Update the timestamp
    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }

    /// The phase-execution record for the current phase.
    pub fn current_phase_exec(&self) -> Option<&PhaseExecution> {
        self.phases.iter().find(|p| p.name == self.current_phase)
    }

    /// Mutable access to the current phase record.
    pub fn current_phase_exec_mut(&mut self) -> Option<&mut PhaseExecution> {
        let name = self.current_phase.clone();
        self.phases.iter_mut().find(|p| p.name == name)
    }

    /// Mutable access to a gate's state by id.
    pub fn gate_mut(&mut self, gate_id: &str) -> Option<&mut GateState> {
        self.gates.iter_mut().find(|g| g.gate_id == gate_id)
    }

    /// Gate state by id.
    pub fn gate(&self, gate_id: &str) -> Option<&GateState> {
        self.gates.iter().find(|g| g.gate_id == gate_id)
    }

    /// Append a log entry and refresh `updated_at`.
    pub fn log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
        self.touch();
    }
}
