//! Collaborator seams.
//!
//! The core does not parse loop/skill files, render UI, or speak any wire
//! protocol. It consumes these capabilities through traits and ships simple
//! in-memory implementations used by tests and by embedders that already
//! hold decoded definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::loop_def::LoopDefinition;
use crate::error::{LoopgateError, Result};
use crate::registry::guarantee::Guarantee;

/// Resolves a loop id to its definition. Absence is `LoopNotFound`.
pub trait LoopResolver: Send + Sync {
    fn resolve_loop(&self, loop_id: &str) -> Result<LoopDefinition>;
}

/// Resolved skill metadata for pre-loop context assembly.
#[derive(Debug, Clone, Default)]
pub struct SkillInfo {
    pub version: Option<String>,
    pub guarantees: Vec<Guarantee>,
}

/// Resolves a skill id to its guarantees and version.
pub trait SkillResolver: Send + Sync {
    fn resolve_skill(&self, skill_id: &str) -> Option<SkillInfo>;
}

/// Maps (execution id, canonical deliverable name) to a registered path.
pub trait DeliverableStore: Send + Sync {
    fn deliverable_path(&self, execution_id: &str, name: &str) -> Option<PathBuf>;
}

/// Optional external aggregator that pre-computes the guarantee union for
/// a whole loop. Its output takes precedence over raw registry lookups.
pub trait GuaranteeAggregator: Send + Sync {
    fn skill_guarantees(&self, loop_id: &str, phase: &str, skill_id: &str) -> Vec<Guarantee>;
    fn gate_guarantees(&self, loop_id: &str, gate_id: &str) -> Vec<Guarantee>;
}

/// Outbound notifications. Failures here are logged by the engine and are
/// never fatal to the execution.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn execution_started(&self, execution_id: &str, loop_id: &str) -> Result<()>;
    async fn execution_completed(&self, execution_id: &str, loop_id: &str) -> Result<()>;
}

/// Static in-memory loop catalog.
#[derive(Default)]
pub struct InMemoryLoops {
    loops: HashMap<String, LoopDefinition>,
}

impl InMemoryLoops {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loop(mut self, definition: LoopDefinition) -> Self {
        self.loops.insert(definition.id.clone(), definition);
        self
    }
}

impl LoopResolver for InMemoryLoops {
    fn resolve_loop(&self, loop_id: &str) -> Result<LoopDefinition> {
        self.loops
            .get(loop_id)
            .cloned()
            .ok_or_else(|| LoopgateError::LoopNotFound(loop_id.to_string()))
    }
}

/// Static in-memory skill catalog.
#[derive(Default)]
pub struct InMemorySkills {
    skills: HashMap<String, SkillInfo>,
}

impl InMemorySkills {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skill(mut self, skill_id: &str, info: SkillInfo) -> Self {
        self.skills.insert(skill_id.to_string(), info);
        self
    }
}

impl SkillResolver for InMemorySkills {
    fn resolve_skill(&self, skill_id: &str) -> Option<SkillInfo> {
        self.skills.get(skill_id).cloned()
    }
}

/// Mutable in-memory deliverable registry.
#[derive(Default)]
pub struct InMemoryDeliverables {
    entries: RwLock<HashMap<(String, String), PathBuf>>,
}

impl InMemoryDeliverables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, execution_id: &str, name: &str, path: impl Into<PathBuf>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert((execution_id.to_string(), name.to_string()), path.into());
        }
    }
}

impl DeliverableStore for InMemoryDeliverables {
    fn deliverable_path(&self, execution_id: &str, name: &str) -> Option<PathBuf> {
        self.entries
            .read()
            .ok()?
            .get(&(execution_id.to_string(), name.to_string()))
            .cloned()
    }
}

/// Notifier that swallows everything.
#[derive(Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn execution_started(&self, _execution_id: &str, _loop_id: &str) -> Result<()> {
        Ok(())
    }

    async fn execution_completed(&self, _execution_id: &str, _loop_id: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::loop_def::PhaseDefinition;

    fn definition(id: &str) -> LoopDefinition {
        LoopDefinition {
            id: id.to_string(),
            version: "1".to_string(),
            phases: vec![PhaseDefinition {
                name: "only".to_string(),
                skills: vec![],
            }],
            gates: vec![],
        }
    }

    #[test]
    fn test_in_memory_loops_resolve() {
        let loops = InMemoryLoops::new().with_loop(definition("loop-a"));
        assert!(loops.resolve_loop("loop-a").is_ok());
        assert!(matches!(
            loops.resolve_loop("loop-z"),
            Err(LoopgateError::LoopNotFound(_))
        ));
    }

    #[test]
    fn test_in_memory_skills_resolve() {
        let skills = InMemorySkills::new().with_skill(
            "skill-1",
            SkillInfo {
                version: Some("1.2".to_string()),
                guarantees: vec![],
            },
        );
        assert_eq!(skills.resolve_skill("skill-1").unwrap().version.as_deref(), Some("1.2"));
        assert!(skills.resolve_skill("skill-9").is_none());
    }

    #[test]
    fn test_in_memory_deliverables() {
        let store = InMemoryDeliverables::new();
        assert!(store.deliverable_path("exec-1", "REPORT.md").is_none());

        store.register("exec-1", "REPORT.md", "/tmp/REPORT.md");
        assert_eq!(
            store.deliverable_path("exec-1", "REPORT.md"),
            Some(PathBuf::from("/tmp/REPORT.md"))
        );
        // Scoped by execution id
        assert!(store.deliverable_path("exec-2", "REPORT.md").is_none());
    }

    #[tokio::test]
    async fn test_null_notifier() {
        let notifier = NullNotifier;
        assert!(notifier.execution_started("e", "l").await.is_ok());
        assert!(notifier.execution_completed("e", "l").await.is_ok());
    }
}
