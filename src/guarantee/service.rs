//! Guarantee validation service.
//!
//! Entry point for skill-level and gate-level validation requests. The
//! service aggregates applicable guarantees from every source, filters by
//! condition, honors acknowledgments, dispatches to validator families in
//! order, and records blocking failures.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::collab::{DeliverableStore, GuaranteeAggregator, SkillResolver};
use crate::error::Result;
use crate::guarantee::ack::AckStore;
use crate::guarantee::context::ValidationContext;
use crate::guarantee::failures::{FailureLog, GuaranteeFailureRecord};
use crate::guarantee::result::{Evidence, GuaranteeResult, ValidationSummary};
use crate::guarantee::validators::{run_validator, ValidatorDeps};
use crate::registry::guarantee::Guarantee;
use crate::registry::RegistryHandle;

/// Validates guarantees for skills and gates within one data root.
pub struct GuaranteeService {
    data_root: PathBuf,
    registry: Arc<RegistryHandle>,
    skills: Arc<dyn SkillResolver>,
    deliverables: Arc<dyn DeliverableStore>,
    aggregator: Option<Arc<dyn GuaranteeAggregator>>,
    acks: AckStore,
    failures: FailureLog,
}

impl GuaranteeService {
    pub fn new(
        data_root: impl Into<PathBuf>,
        registry: Arc<RegistryHandle>,
        skills: Arc<dyn SkillResolver>,
        deliverables: Arc<dyn DeliverableStore>,
    ) -> Result<Self> {
        let data_root = data_root.into();
        let acks = AckStore::open(&data_root)?;
        let failures = FailureLog::open(&data_root);
        Ok(Self {
            data_root,
            registry,
            skills,
            deliverables,
            aggregator: None,
            acks,
            failures,
        })
    }

    /// Install an external aggregator whose output is consulted first.
    pub fn with_aggregator(mut self, aggregator: Arc<dyn GuaranteeAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn acks(&self) -> &AckStore {
        &self.acks
    }

    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Validate every guarantee applicable to one skill completion.
    pub fn validate_skill_guarantees(&self, ctx: &ValidationContext) -> Result<ValidationSummary> {
        let guarantees = self.aggregate_skill_guarantees(ctx)?;
        tracing::debug!(
            execution_id = %ctx.execution_id,
            skill_id = %ctx.skill_id,
            phase = %ctx.phase,
            count = guarantees.len(),
            "Validating skill guarantees"
        );
        self.run_all(&guarantees, ctx, false)
    }

    /// Validate every guarantee applicable to one gate approval.
    pub fn validate_gate_guarantees(
        &self,
        gate_id: &str,
        ctx: &ValidationContext,
    ) -> Result<ValidationSummary> {
        let guarantees = self.aggregate_gate_guarantees(gate_id, ctx)?;
        tracing::debug!(
            execution_id = %ctx.execution_id,
            gate_id = %gate_id,
            count = guarantees.len(),
            "Validating gate guarantees"
        );
        self.run_all(&guarantees, ctx, true)
    }

    /// Union of skill-applicable guarantees, first writer wins per id.
    ///
    /// Source order: external aggregator, skill resolver, registry skill
    /// entries, phase-global entries, loop-phase entries. The resulting
    /// order fixes the evaluation order.
    fn aggregate_skill_guarantees(&self, ctx: &ValidationContext) -> Result<Vec<Guarantee>> {
        let mut out: Vec<Guarantee> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        if let Some(aggregator) = &self.aggregator {
            merge(
                &mut out,
                &mut seen,
                aggregator.skill_guarantees(&ctx.loop_id, &ctx.phase, &ctx.skill_id),
            );
        }

        if let Some(info) = self.skills.resolve_skill(&ctx.skill_id) {
            merge(&mut out, &mut seen, info.guarantees);
        }

        let registry = self.registry.read()?;
        merge(&mut out, &mut seen, registry.skill_guarantees(&ctx.skill_id).to_vec());
        merge(&mut out, &mut seen, registry.phase_global_guarantees(&ctx.phase).to_vec());
        merge(
            &mut out,
            &mut seen,
            registry.loop_phase_guarantees(&ctx.loop_id, &ctx.phase).to_vec(),
        );

        Ok(out)
    }

    /// Union of gate guarantees: aggregator first, then registry.
    fn aggregate_gate_guarantees(&self, gate_id: &str, ctx: &ValidationContext) -> Result<Vec<Guarantee>> {
        let mut out: Vec<Guarantee> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        if let Some(aggregator) = &self.aggregator {
            merge(&mut out, &mut seen, aggregator.gate_guarantees(&ctx.loop_id, gate_id));
        }

        let registry = self.registry.read()?;
        merge(&mut out, &mut seen, registry.gate_guarantees(&ctx.loop_id, gate_id).to_vec());

        Ok(out)
    }

    fn run_all(
        &self,
        guarantees: &[Guarantee],
        ctx: &ValidationContext,
        gate_level: bool,
    ) -> Result<ValidationSummary> {
        let scope = ctx.condition_scope();
        let deps = ValidatorDeps {
            data_root: &self.data_root,
            deliverables: self.deliverables.as_ref(),
        };

        let mut results = Vec::with_capacity(guarantees.len());
        for guarantee in guarantees {
            if let Some(condition) = &guarantee.condition
                && !condition.evaluate(&scope)
            {
                tracing::debug!(guarantee_id = %guarantee.id, "Guarantee skipped by condition");
                continue;
            }

            if let Some(ack) = self.find_ack(guarantee, ctx, gate_level) {
                results.push(
                    GuaranteeResult::pass(guarantee)
                        .with_warning(format!(
                            "Guarantee {} acknowledged as {:?} instead of validated",
                            guarantee.id, ack.resolution_type
                        ))
                        .with_evidence(Evidence::new(
                            "acknowledgment",
                            serde_json::json!({
                                "resolutionType": ack.resolution_type,
                                "evidence": ack.evidence,
                                "acknowledgedAt": ack.acknowledged_at,
                            }),
                        )),
                );
                continue;
            }

            let result = run_validator(guarantee, ctx, &deps);
            if result.is_blocking() {
                self.record_failure(&result, ctx);
            }
            results.push(result);
        }

        Ok(ValidationSummary::from_results(results))
    }

    fn find_ack(
        &self,
        guarantee: &Guarantee,
        ctx: &ValidationContext,
        gate_level: bool,
    ) -> Option<crate::guarantee::ack::Acknowledgment> {
        if gate_level {
            self.acks.find_for_execution(&ctx.execution_id, &guarantee.id)
        } else {
            self.acks.find_for_skill(&ctx.execution_id, &ctx.skill_id, &guarantee.id)
        }
    }

    fn record_failure(&self, result: &GuaranteeResult, ctx: &ValidationContext) {
        let record = GuaranteeFailureRecord {
            timestamp: result.timestamp,
            execution_id: ctx.execution_id.clone(),
            skill_id: ctx.skill_id.clone(),
            phase: ctx.phase.clone(),
            guarantee_id: result.guarantee_id.clone(),
            guarantee_type: result.guarantee_type,
            errors: result.errors.clone(),
            resolution: None,
        };
        // Failure recording must never abort validation
        if let Err(e) = self.failures.record(record) {
            tracing::error!(
                guarantee_id = %result.guarantee_id,
                error = %e,
                "Failed to record guarantee failure"
            );
        }
    }
}

/// Append guarantees whose id has not been seen yet.
fn merge(out: &mut Vec<Guarantee>, seen: &mut HashSet<String>, incoming: Vec<Guarantee>) {
    for guarantee in incoming {
        if seen.insert(guarantee.id.clone()) {
            out.push(guarantee);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{InMemoryDeliverables, InMemorySkills, SkillInfo};
    use crate::guarantee::ack::ResolutionType;
    use crate::registry::condition::{Condition, ConditionVar};
    use crate::registry::guarantee::{DeliverableSpec, FilePattern, ValidationSpec};
    use crate::registry::{GuaranteeRegistry, LoopGuarantees, PhaseGuarantees, SkillGuarantees};
    use tempfile::TempDir;

    fn deliverable_guarantee(id: &str, pattern: &str, required: bool) -> Guarantee {
        Guarantee {
            id: id.to_string(),
            name: format!("{} check", id),
            required,
            condition: None,
            spec: ValidationSpec::Deliverable(DeliverableSpec {
                patterns: vec![FilePattern {
                    pattern: pattern.to_string(),
                    min_count: 1,
                    max_count: None,
                    condition: None,
                }],
            }),
        }
    }

    fn context(temp: &TempDir) -> ValidationContext {
        ValidationContext {
            execution_id: "exec-1".to_string(),
            loop_id: "loop-a".to_string(),
            skill_id: "skill-1".to_string(),
            phase: "build".to_string(),
            mode: "standard".to_string(),
            project_path: temp.path().join("project"),
        }
    }

    fn service_with(temp: &TempDir, registry: GuaranteeRegistry, skills: InMemorySkills) -> GuaranteeService {
        std::fs::create_dir_all(temp.path().join("project")).unwrap();
        GuaranteeService::new(
            temp.path().join("data"),
            Arc::new(RegistryHandle::new(registry)),
            Arc::new(skills),
            Arc::new(InMemoryDeliverables::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_aggregation_first_writer_wins() {
        let temp = TempDir::new().unwrap();

        // Same id registered at skill and loop-phase level; the skill-level
        // variant (earlier source) must win.
        let mut registry = GuaranteeRegistry::default();
        registry.skills.insert(
            "skill-1".to_string(),
            SkillGuarantees {
                guarantees: vec![deliverable_guarantee("g-dup", "REPORT.md", true)],
            },
        );
        let mut loop_g = LoopGuarantees::default();
        loop_g.phase_guarantees.insert(
            "build".to_string(),
            vec![
                deliverable_guarantee("g-dup", "OTHER.md", false),
                deliverable_guarantee("g-loop", "NOTES.md", false),
            ],
        );
        registry.loops.insert("loop-a".to_string(), loop_g);

        let service = service_with(&temp, registry, InMemorySkills::new());
        let ctx = context(&temp);
        let guarantees = service.aggregate_skill_guarantees(&ctx).unwrap();

        assert_eq!(guarantees.len(), 2);
        assert_eq!(guarantees[0].id, "g-dup");
        assert!(guarantees[0].required, "skill-level variant must win");
        assert_eq!(guarantees[1].id, "g-loop");
    }

    #[test]
    fn test_aggregation_source_order() {
        let temp = TempDir::new().unwrap();

        let skills = InMemorySkills::new().with_skill(
            "skill-1",
            SkillInfo {
                version: None,
                guarantees: vec![deliverable_guarantee("g-resolver", "A.md", true)],
            },
        );

        let mut registry = GuaranteeRegistry::default();
        registry.skills.insert(
            "skill-1".to_string(),
            SkillGuarantees {
                guarantees: vec![deliverable_guarantee("g-registry", "B.md", true)],
            },
        );
        registry.phases.insert(
            "build".to_string(),
            PhaseGuarantees {
                global_guarantees: vec![deliverable_guarantee("g-phase", "C.md", true)],
            },
        );
        let mut loop_g = LoopGuarantees::default();
        loop_g
            .phase_guarantees
            .insert("build".to_string(), vec![deliverable_guarantee("g-loop", "D.md", true)]);
        registry.loops.insert("loop-a".to_string(), loop_g);

        let service = service_with(&temp, registry, skills);
        let ctx = context(&temp);
        let guarantees = service.aggregate_skill_guarantees(&ctx).unwrap();

        let ids: Vec<&str> = guarantees.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["g-resolver", "g-registry", "g-phase", "g-loop"]);
    }

    #[test]
    fn test_condition_filters_guarantee() {
        let temp = TempDir::new().unwrap();

        let mut conditional = deliverable_guarantee("g-cond", "MISSING.md", true);
        conditional.condition = Some(Condition::eq(ConditionVar::Mode, "strict"));

        let mut registry = GuaranteeRegistry::default();
        registry.skills.insert(
            "skill-1".to_string(),
            SkillGuarantees {
                guarantees: vec![conditional],
            },
        );

        let service = service_with(&temp, registry, InMemorySkills::new());
        // Mode is "standard", so the strict-only guarantee never runs and
        // the missing file cannot block.
        let summary = service.validate_skill_guarantees(&context(&temp)).unwrap();
        assert!(summary.passed);
        assert!(summary.results.is_empty());
    }

    #[test]
    fn test_blocking_failure_recorded() {
        let temp = TempDir::new().unwrap();

        let mut registry = GuaranteeRegistry::default();
        registry.skills.insert(
            "skill-1".to_string(),
            SkillGuarantees {
                guarantees: vec![deliverable_guarantee("g-report", "REPORT.md", true)],
            },
        );

        let service = service_with(&temp, registry, InMemorySkills::new());
        let summary = service.validate_skill_guarantees(&context(&temp)).unwrap();

        assert!(!summary.passed);
        assert_eq!(summary.blocking.len(), 1);

        let failures = service.failures().for_execution("exec-1");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].guarantee_id, "g-report");
    }

    #[test]
    fn test_optional_failure_not_recorded() {
        let temp = TempDir::new().unwrap();

        let mut registry = GuaranteeRegistry::default();
        registry.skills.insert(
            "skill-1".to_string(),
            SkillGuarantees {
                guarantees: vec![deliverable_guarantee("g-opt", "REPORT.md", false)],
            },
        );

        let service = service_with(&temp, registry, InMemorySkills::new());
        let summary = service.validate_skill_guarantees(&context(&temp)).unwrap();

        assert!(summary.passed);
        assert_eq!(summary.warnings.len(), 1);
        assert!(service.failures().records().is_empty());
    }

    #[test]
    fn test_acknowledgment_short_circuits_validation() {
        let temp = TempDir::new().unwrap();

        let mut registry = GuaranteeRegistry::default();
        registry.skills.insert(
            "skill-1".to_string(),
            SkillGuarantees {
                guarantees: vec![deliverable_guarantee("g-report", "REPORT.md", true)],
            },
        );

        let service = service_with(&temp, registry, InMemorySkills::new());
        service
            .acks()
            .acknowledge("exec-1", "skill-1", "g-report", ResolutionType::Overridden, None);

        let summary = service.validate_skill_guarantees(&context(&temp)).unwrap();
        assert!(summary.passed);
        assert_eq!(summary.results.len(), 1);
        assert!(summary.results[0].passed);
        assert!(summary.results[0].warnings[0].contains("acknowledged"));
        assert_eq!(summary.results[0].evidence[0].kind, "acknowledgment");

        // Re-validation still honors the acknowledgment; no failure record
        assert!(service.failures().records().is_empty());
    }

    #[test]
    fn test_ack_for_other_skill_does_not_apply() {
        let temp = TempDir::new().unwrap();

        let mut registry = GuaranteeRegistry::default();
        registry.skills.insert(
            "skill-1".to_string(),
            SkillGuarantees {
                guarantees: vec![deliverable_guarantee("g-report", "REPORT.md", true)],
            },
        );

        let service = service_with(&temp, registry, InMemorySkills::new());
        service
            .acks()
            .acknowledge("exec-1", "skill-9", "g-report", ResolutionType::Overridden, None);

        let summary = service.validate_skill_guarantees(&context(&temp)).unwrap();
        assert!(!summary.passed);
    }

    #[test]
    fn test_gate_validation_uses_gate_guarantees() {
        let temp = TempDir::new().unwrap();

        let mut registry = GuaranteeRegistry::default();
        let mut loop_g = LoopGuarantees::default();
        loop_g
            .gate_guarantees
            .insert("gate-1".to_string(), vec![deliverable_guarantee("g-gate", "REPORT.md", true)]);
        registry.loops.insert("loop-a".to_string(), loop_g);

        let service = service_with(&temp, registry, InMemorySkills::new());

        let mut ctx = context(&temp);
        ctx.skill_id = String::new();

        let summary = service.validate_gate_guarantees("gate-1", &ctx).unwrap();
        assert!(!summary.passed);

        // Gate acks match on (execution, guarantee) across skills
        service
            .acks()
            .acknowledge("exec-1", "skill-1", "g-gate", ResolutionType::Fixed, None);
        let summary = service.validate_gate_guarantees("gate-1", &ctx).unwrap();
        assert!(summary.passed);
    }

    #[test]
    fn test_validation_passes_when_deliverable_exists() {
        let temp = TempDir::new().unwrap();

        let mut registry = GuaranteeRegistry::default();
        registry.skills.insert(
            "skill-1".to_string(),
            SkillGuarantees {
                guarantees: vec![deliverable_guarantee("g-report", "REPORT.md", true)],
            },
        );

        let service = service_with(&temp, registry, InMemorySkills::new());
        std::fs::write(temp.path().join("project").join("REPORT.md"), "# Report").unwrap();

        let summary = service.validate_skill_guarantees(&context(&temp)).unwrap();
        assert!(summary.passed, "blocking: {:?}", summary.blocking);
    }

    #[test]
    fn test_no_guarantees_passes_trivially() {
        let temp = TempDir::new().unwrap();
        let service = service_with(&temp, GuaranteeRegistry::default(), InMemorySkills::new());

        let summary = service.validate_skill_guarantees(&context(&temp)).unwrap();
        assert!(summary.passed);
        assert!(summary.results.is_empty());
    }
}
