//! The execution engine.
//!
//! Owns the in-memory working set of live executions and drives the
//! phase/skill/gate state machine. Every mutating operation appends a log
//! entry to the execution and rewrites its durable snapshot before
//! returning. Callers serialize operations per execution id; different ids
//! are fully independent.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::collab::{LoopResolver, Notifier, SkillResolver};
use crate::domain::execution::{
    ExecutionStatus, GateStatus, LoopExecution, SkillExecutionRecord, SkillStatus,
};
use crate::domain::log::{LogEntry, LogFilter};
use crate::engine::precontext::{self, PreLoopContext};
use crate::engine::snapshot;
use crate::error::{LoopgateError, Result};
use crate::guarantee::context::ValidationContext;
use crate::guarantee::result::ValidationSummary;
use crate::guarantee::GuaranteeService;
use crate::id::{generate_skill_run_id, now_ms};

/// Caller-supplied outcome of running a skill.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillResult {
    /// Canonical deliverable names produced by the skill
    #[serde(default)]
    pub deliverables: Vec<String>,
    pub outcome_score: Option<f64>,
    /// Bypass guarantee validation entirely for this completion
    #[serde(default)]
    pub skip_guarantees: bool,
}

/// Options for gate approval.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateOptions {
    pub skip_guarantees: bool,
}

/// What `start_execution` hands back: the fresh execution plus advisory
/// pre-loop context.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub execution: LoopExecution,
    pub context: PreLoopContext,
}

/// Derived listing entry; the full execution stays behind `get_execution`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub id: String,
    pub loop_id: String,
    pub project: String,
    pub status: ExecutionStatus,
    pub current_phase: String,
    pub phases_completed: usize,
    pub phases_total: usize,
    pub skills_completed: usize,
    pub skills_total: usize,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ExecutionSummary {
    fn from_execution(exec: &LoopExecution) -> Self {
        let phases_completed = exec
            .phases
            .iter()
            .filter(|p| p.status == crate::domain::execution::PhaseStatus::Completed)
            .count();
        let (skills_completed, skills_total) = exec.phases.iter().flat_map(|p| &p.skills).fold(
            (0usize, 0usize),
            |(done, total), s| {
                (done + usize::from(s.status.is_resolved()), total + 1)
            },
        );

        Self {
            id: exec.id.clone(),
            loop_id: exec.loop_id.clone(),
            project: exec.project.clone(),
            status: exec.status,
            current_phase: exec.current_phase.clone(),
            phases_completed,
            phases_total: exec.phases.len(),
            skills_completed,
            skills_total,
            created_at: exec.created_at,
            updated_at: exec.updated_at,
        }
    }
}

/// Drives loop executions through their state machine.
pub struct ExecutionEngine {
    data_root: PathBuf,
    projects_root: PathBuf,
    loops: Arc<dyn LoopResolver>,
    skills: Arc<dyn SkillResolver>,
    guarantees: Arc<GuaranteeService>,
    notifier: Arc<dyn Notifier>,
    executions: RwLock<HashMap<String, LoopExecution>>,
}

impl ExecutionEngine {
    pub fn new(
        data_root: impl Into<PathBuf>,
        projects_root: impl Into<PathBuf>,
        loops: Arc<dyn LoopResolver>,
        skills: Arc<dyn SkillResolver>,
        guarantees: Arc<GuaranteeService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            data_root: data_root.into(),
            projects_root: projects_root.into(),
            loops,
            skills,
            guarantees,
            notifier,
            executions: RwLock::new(HashMap::new()),
        }
    }

    pub fn guarantees(&self) -> &GuaranteeService {
        &self.guarantees
    }

    /// Start a new execution of a loop against a project.
    pub async fn start_execution(
        &self,
        loop_id: &str,
        project: &str,
        mode: Option<&str>,
        autonomy: Option<&str>,
    ) -> Result<StartOutcome> {
        let definition = self.loops.resolve_loop(loop_id)?;

        let mut execution = LoopExecution::new(
            &definition,
            project,
            mode.unwrap_or("standard"),
            autonomy.unwrap_or("supervised"),
        );
        if let Some(phase) = execution.current_phase_exec_mut() {
            phase.begin(now_ms());
        }
        execution.log(
            LogEntry::info("execution", format!("Execution started for loop {}", loop_id))
                .with_phase(execution.current_phase.clone())
                .with_detail(serde_json::json!({
                    "project": project,
                    "mode": execution.mode,
                    "autonomy": execution.autonomy,
                })),
        );
        snapshot::save(&self.data_root, &execution)?;

        tracing::info!(
            execution_id = %execution.id,
            loop_id = %loop_id,
            project = %project,
            "Execution started"
        );

        // Notification failures never fail the start
        if let Err(e) = self.notifier.execution_started(&execution.id, loop_id).await {
            tracing::warn!(execution_id = %execution.id, error = %e, "Start notification failed");
        }

        let context = precontext::assemble(
            &definition,
            self.skills.as_ref(),
            &self.projects_root.join(project),
        );

        let mut map = self.executions.write().await;
        map.insert(execution.id.clone(), execution.clone());

        Ok(StartOutcome { execution, context })
    }

    /// Advance past the current phase, or complete the whole execution if
    /// it was the last phase.
    pub async fn advance_phase(&self, execution_id: &str) -> Result<LoopExecution> {
        let execution = {
            let mut map = self.executions.write().await;
            let execution = Self::get_mut(&mut map, execution_id)?;

            if execution.status != ExecutionStatus::Active {
                return Err(LoopgateError::InvalidState(format!(
                    "cannot advance: execution is {}",
                    execution.status.as_str()
                )));
            }

            let current = execution.current_phase.clone();
            let phase_done = execution
                .current_phase_exec()
                .is_some_and(|p| p.status == crate::domain::execution::PhaseStatus::Completed);
            if !phase_done {
                return Err(LoopgateError::InvalidState(format!(
                    "cannot advance: phase {} is not completed",
                    current
                )));
            }

            let definition = self.loops.resolve_loop(&execution.loop_id)?;
            for gate in definition.gates_after(&current) {
                if gate.required
                    && execution.gate(&gate.id).is_none_or(|g| g.status != GateStatus::Approved)
                {
                    return Err(LoopgateError::InvalidState(format!(
                        "cannot advance: required gate {} after phase {} is not approved",
                        gate.id, current
                    )));
                }
            }

            if definition.is_last_phase(&current) {
                let now = now_ms();
                execution.status = ExecutionStatus::Completed;
                execution.completed_at = Some(now);
                execution.log(LogEntry::info("execution", "Execution completed").with_phase(current));
                snapshot::save(&self.data_root, execution)?;
                self.guarantees.acks().clear_execution(execution_id);
                tracing::info!(execution_id = %execution_id, "Execution completed");
                execution.clone()
            } else {
                let next_index = definition.phase_index(&current).unwrap_or(0) + 1;
                let next_name = definition.phases[next_index].name.clone();
                execution.current_phase = next_name.clone();
                if let Some(phase) = execution.current_phase_exec_mut() {
                    phase.begin(now_ms());
                }
                execution.log(
                    LogEntry::info("execution", format!("Advanced to phase {}", next_name))
                        .with_phase(next_name),
                );
                snapshot::save(&self.data_root, execution)?;
                return Ok(execution.clone());
            }
        };

        // Completed branch: notify outside the lock
        if let Err(e) = self
            .notifier
            .execution_completed(&execution.id, &execution.loop_id)
            .await
        {
            tracing::warn!(execution_id = %execution.id, error = %e, "Completion notification failed");
        }
        Ok(execution)
    }

    /// Mark the current phase completed once every skill in it is resolved.
    pub async fn complete_phase(&self, execution_id: &str) -> Result<LoopExecution> {
        let mut map = self.executions.write().await;
        let execution = Self::get_mut(&mut map, execution_id)?;
        Self::ensure_live(execution, "complete phase")?;

        let current = execution.current_phase.clone();
        let unresolved: Vec<String> = execution
            .current_phase_exec()
            .map(|p| p.unresolved_skills().iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();
        if !unresolved.is_empty() {
            return Err(LoopgateError::InvalidState(format!(
                "cannot complete phase {}: unresolved skills: {}",
                current,
                unresolved.join(", ")
            )));
        }

        let now = now_ms();
        if let Some(phase) = execution.current_phase_exec_mut() {
            phase.complete(now);
        }
        execution.log(
            LogEntry::info("execution", format!("Phase {} completed", current)).with_phase(current),
        );
        snapshot::save(&self.data_root, execution)?;
        Ok(execution.clone())
    }

    /// Complete a skill, validating its guarantees unless bypassed.
    pub async fn complete_skill(
        &self,
        execution_id: &str,
        skill_id: &str,
        result: SkillResult,
    ) -> Result<LoopExecution> {
        // Validation does filesystem and git work; run it against a cloned
        // context so the executions map stays available to other ids.
        let ctx = {
            let map = self.executions.read().await;
            let execution = Self::get(&map, execution_id)?;
            Self::ensure_live(execution, "complete skill")?;

            let in_phase = execution
                .current_phase_exec()
                .is_some_and(|p| p.skills.iter().any(|s| s.skill_id == skill_id));
            if !in_phase {
                return Err(LoopgateError::SkillNotFound {
                    phase: execution.current_phase.clone(),
                    skill_id: skill_id.to_string(),
                });
            }
            (!result.skip_guarantees).then(|| self.validation_context(execution, skill_id))
        };

        let summary = match ctx {
            Some(ctx) => Some(self.validate_blocking(move |g| g.validate_skill_guarantees(&ctx)).await?),
            None => None,
        };

        let mut map = self.executions.write().await;
        let execution = Self::get_mut(&mut map, execution_id)?;
        Self::ensure_live(execution, "complete skill")?;

        if let Some(summary) = summary {
            if !summary.passed {
                return self.block_on_violation(execution, summary, Some(skill_id));
            }
            self.log_warnings(execution, &summary, Some(skill_id));
        }

        if let Some(skill) = execution.current_phase_exec_mut().and_then(|p| p.skill_mut(skill_id)) {
            skill.status = SkillStatus::Completed;
        }

        let record = SkillExecutionRecord {
            id: generate_skill_run_id(skill_id),
            skill_id: skill_id.to_string(),
            skill_version: self.skills.resolve_skill(skill_id).and_then(|i| i.version),
            phase: execution.current_phase.clone(),
            status: SkillStatus::Completed,
            started_at: execution.current_phase_exec().and_then(|p| p.started_at),
            completed_at: now_ms(),
            deliverables: result.deliverables,
            outcome_score: result.outcome_score,
        };
        execution.skill_executions.push(record);
        execution.log(
            LogEntry::info("skill", format!("Skill {} completed", skill_id))
                .with_phase(execution.current_phase.clone())
                .with_skill(skill_id),
        );
        snapshot::save(&self.data_root, execution)?;
        Ok(execution.clone())
    }

    /// Skip a skill unconditionally, recording the reason.
    pub async fn skip_skill(
        &self,
        execution_id: &str,
        skill_id: &str,
        reason: &str,
    ) -> Result<LoopExecution> {
        let mut map = self.executions.write().await;
        let execution = Self::get_mut(&mut map, execution_id)?;
        Self::ensure_live(execution, "skip skill")?;

        let phase_name = execution.current_phase.clone();
        let Some(skill) = execution.current_phase_exec_mut().and_then(|p| p.skill_mut(skill_id))
        else {
            return Err(LoopgateError::SkillNotFound {
                phase: phase_name,
                skill_id: skill_id.to_string(),
            });
        };
        skill.status = SkillStatus::Skipped;

        execution.log(
            LogEntry::warn("skill", format!("Skill {} skipped: {}", skill_id, reason))
                .with_phase(phase_name)
                .with_skill(skill_id),
        );
        snapshot::save(&self.data_root, execution)?;
        Ok(execution.clone())
    }

    /// Approve a gate, validating its guarantees unless bypassed.
    /// Approving an already-approved gate is a no-op.
    pub async fn approve_gate(
        &self,
        execution_id: &str,
        gate_id: &str,
        approved_by: Option<&str>,
        options: GateOptions,
    ) -> Result<LoopExecution> {
        let ctx = {
            let map = self.executions.read().await;
            let execution = Self::get(&map, execution_id)?;

            let Some(gate) = execution.gate(gate_id) else {
                return Err(LoopgateError::GateNotFound(gate_id.to_string()));
            };
            if gate.status == GateStatus::Approved {
                return Ok(execution.clone());
            }
            Self::ensure_live(execution, "approve gate")?;

            // Gate validation is not skill-scoped
            (!options.skip_guarantees).then(|| self.validation_context(execution, ""))
        };

        let summary = match ctx {
            Some(ctx) => {
                let gate = gate_id.to_string();
                Some(self.validate_blocking(move |g| g.validate_gate_guarantees(&gate, &ctx)).await?)
            }
            None => None,
        };

        let mut map = self.executions.write().await;
        let execution = Self::get_mut(&mut map, execution_id)?;
        Self::ensure_live(execution, "approve gate")?;

        if let Some(summary) = summary {
            if !summary.passed {
                return self.block_on_violation(execution, summary, None);
            }
            self.log_warnings(execution, &summary, None);
        }

        if let Some(gate) = execution.gate_mut(gate_id) {
            gate.status = GateStatus::Approved;
            gate.approved_by = approved_by.map(str::to_string);
            gate.timestamp = Some(now_ms());
        }
        execution.log(
            LogEntry::info("gate", format!("Gate {} approved", gate_id)).with_gate(gate_id),
        );
        snapshot::save(&self.data_root, execution)?;
        Ok(execution.clone())
    }

    /// Reject a gate with feedback; the execution becomes blocked.
    pub async fn reject_gate(
        &self,
        execution_id: &str,
        gate_id: &str,
        feedback: &str,
    ) -> Result<LoopExecution> {
        let mut map = self.executions.write().await;
        let execution = Self::get_mut(&mut map, execution_id)?;
        Self::ensure_live(execution, "reject gate")?;

        let Some(gate) = execution.gate_mut(gate_id) else {
            return Err(LoopgateError::GateNotFound(gate_id.to_string()));
        };
        gate.status = GateStatus::Rejected;
        gate.feedback = Some(feedback.to_string());
        execution.status = ExecutionStatus::Blocked;

        execution.log(
            LogEntry::warn("gate", format!("Gate {} rejected: {}", gate_id, feedback))
                .with_gate(gate_id),
        );
        snapshot::save(&self.data_root, execution)?;
        Ok(execution.clone())
    }

    /// Pause an active execution.
    pub async fn pause_execution(&self, execution_id: &str) -> Result<LoopExecution> {
        let mut map = self.executions.write().await;
        let execution = Self::get_mut(&mut map, execution_id)?;

        if execution.status != ExecutionStatus::Active {
            return Err(LoopgateError::InvalidState(format!(
                "cannot pause execution in status {}",
                execution.status.as_str()
            )));
        }
        execution.status = ExecutionStatus::Paused;
        execution.log(LogEntry::info("execution", "Execution paused"));
        snapshot::save(&self.data_root, execution)?;
        Ok(execution.clone())
    }

    /// Resume a paused or blocked execution.
    pub async fn resume_execution(&self, execution_id: &str) -> Result<LoopExecution> {
        let mut map = self.executions.write().await;
        let execution = Self::get_mut(&mut map, execution_id)?;

        if !matches!(execution.status, ExecutionStatus::Paused | ExecutionStatus::Blocked) {
            return Err(LoopgateError::InvalidState(format!(
                "cannot resume execution in status {}",
                execution.status.as_str()
            )));
        }
        execution.status = ExecutionStatus::Active;
        execution.log(LogEntry::info("execution", "Execution resumed"));
        snapshot::save(&self.data_root, execution)?;
        Ok(execution.clone())
    }

    /// Abort an execution. The final snapshot stays durable; the execution
    /// leaves the in-memory working set.
    pub async fn abort_execution(&self, execution_id: &str, reason: Option<&str>) -> Result<LoopExecution> {
        let mut execution = {
            let mut map = self.executions.write().await;
            map.remove(execution_id)
                .ok_or_else(|| LoopgateError::ExecutionNotFound(execution_id.to_string()))?
        };

        execution.status = ExecutionStatus::Failed;
        execution.completed_at = Some(now_ms());
        execution.log(LogEntry::error(
            "execution",
            format!("Execution aborted: {}", reason.unwrap_or("no reason given")),
        ));
        snapshot::save(&self.data_root, &execution)?;
        self.guarantees.acks().clear_execution(execution_id);
        tracing::warn!(execution_id = %execution_id, reason = ?reason, "Execution aborted");

        Ok(execution)
    }

    /// Full state of one live execution.
    pub async fn get_execution(&self, execution_id: &str) -> Result<LoopExecution> {
        let map = self.executions.read().await;
        map.get(execution_id)
            .cloned()
            .ok_or_else(|| LoopgateError::ExecutionNotFound(execution_id.to_string()))
    }

    /// Summaries of every live execution.
    pub async fn list_executions(&self) -> Vec<ExecutionSummary> {
        let map = self.executions.read().await;
        let mut summaries: Vec<ExecutionSummary> =
            map.values().map(ExecutionSummary::from_execution).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Filtered view over an execution's log. Pure read.
    pub async fn get_logs(&self, execution_id: &str, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let map = self.executions.read().await;
        let execution = map
            .get(execution_id)
            .ok_or_else(|| LoopgateError::ExecutionNotFound(execution_id.to_string()))?;
        Ok(filter.apply(&execution.logs).into_iter().cloned().collect())
    }

    /// Load a durable snapshot back into the working set, e.g. after a
    /// process restart.
    pub async fn load_execution(&self, execution_id: &str) -> Result<LoopExecution> {
        let execution = snapshot::load(&self.data_root, execution_id)?;
        let mut map = self.executions.write().await;
        map.insert(execution.id.clone(), execution.clone());
        tracing::info!(execution_id = %execution_id, "Execution restored from snapshot");
        Ok(execution)
    }

    fn get<'a>(
        map: &'a HashMap<String, LoopExecution>,
        execution_id: &str,
    ) -> Result<&'a LoopExecution> {
        map.get(execution_id)
            .ok_or_else(|| LoopgateError::ExecutionNotFound(execution_id.to_string()))
    }

    fn get_mut<'a>(
        map: &'a mut HashMap<String, LoopExecution>,
        execution_id: &str,
    ) -> Result<&'a mut LoopExecution> {
        map.get_mut(execution_id)
            .ok_or_else(|| LoopgateError::ExecutionNotFound(execution_id.to_string()))
    }

    /// Terminal executions accept no further mutations.
    fn ensure_live(execution: &LoopExecution, op: &str) -> Result<()> {
        if execution.status.is_terminal() {
            return Err(LoopgateError::InvalidState(format!(
                "cannot {}: execution is {}",
                op,
                execution.status.as_str()
            )));
        }
        Ok(())
    }

    /// Run a synchronous guarantee validation off the async worker thread.
    async fn validate_blocking<F>(&self, validate: F) -> Result<ValidationSummary>
    where
        F: FnOnce(&GuaranteeService) -> Result<ValidationSummary> + Send + 'static,
    {
        let service = self.guarantees.clone();
        tokio::task::spawn_blocking(move || validate(&service))
            .await
            .map_err(|e| LoopgateError::Storage(format!("validation task failed: {}", e)))?
    }

    fn validation_context(&self, execution: &LoopExecution, skill_id: &str) -> ValidationContext {
        ValidationContext {
            execution_id: execution.id.clone(),
            loop_id: execution.loop_id.clone(),
            skill_id: skill_id.to_string(),
            phase: execution.current_phase.clone(),
            mode: execution.mode.clone(),
            project_path: self.projects_root.join(&execution.project),
        }
    }

    /// Record blocking guarantees, flip the execution to blocked, persist,
    /// and surface the violation.
    fn block_on_violation(
        &self,
        execution: &mut LoopExecution,
        summary: ValidationSummary,
        skill_id: Option<&str>,
    ) -> Result<LoopExecution> {
        for blocking in &summary.blocking {
            let mut entry = LogEntry::error(
                "guarantee",
                format!("Guarantee {} failed: {}", blocking.guarantee_id, blocking.errors.join("; ")),
            )
            .with_phase(execution.current_phase.clone());
            if let Some(skill) = skill_id {
                entry = entry.with_skill(skill);
            }
            execution.log(entry);
        }
        execution.status = ExecutionStatus::Blocked;
        snapshot::save(&self.data_root, execution)?;

        tracing::warn!(
            execution_id = %execution.id,
            blocking = summary.blocking.len(),
            "Execution blocked by guarantee violation"
        );
        Err(LoopgateError::GuaranteeViolation {
            blocking: summary.blocking,
        })
    }

    fn log_warnings(
        &self,
        execution: &mut LoopExecution,
        summary: &ValidationSummary,
        skill_id: Option<&str>,
    ) {
        for warned in &summary.warnings {
            let mut entry = LogEntry::warn(
                "guarantee",
                format!("Optional guarantee {} failed: {}", warned.guarantee_id, warned.errors.join("; ")),
            )
            .with_phase(execution.current_phase.clone());
            if let Some(skill) = skill_id {
                entry = entry.with_skill(skill);
            }
            execution.log(entry);
        }
        for result in &summary.results {
            for warning in &result.warnings {
                let mut entry = LogEntry::warn(
                    "guarantee",
                    format!("Guarantee {}: {}", result.guarantee_id, warning),
                )
                .with_phase(execution.current_phase.clone());
                if let Some(skill) = skill_id {
                    entry = entry.with_skill(skill);
                }
                execution.log(entry);
            }
        }
    }
}
