//! Pre-loop context assembly.
//!
//! Before a loop starts, the engine summarizes what each skill will be held
//! to: required deliverables and guarantee counts, plus whether the common
//! planning artifacts already exist in the project. This is advisory data
//! for the caller, never execution state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collab::SkillResolver;
use crate::domain::loop_def::LoopDefinition;
use crate::registry::guarantee::ValidationSpec;

/// Planning artifacts worth reporting on when present.
const PLANNING_ARTIFACTS: &[&str] = &["PLAN.md", "DESIGN.md", "ARCHITECTURE.md"];

/// Per-skill expectations summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillContext {
    pub skill_id: String,
    pub phase: String,
    pub guarantee_count: usize,
    /// Deliverable file patterns the skill's guarantees require
    #[serde(default)]
    pub required_deliverables: Vec<String>,
}

/// Advisory summary handed back from `start_execution`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreLoopContext {
    pub skills: Vec<SkillContext>,
    /// Planning artifacts already present in the project directory
    #[serde(default)]
    pub planning_artifacts: Vec<String>,
}

/// Build the pre-loop context for one loop definition.
pub fn assemble(
    definition: &LoopDefinition,
    skills: &dyn SkillResolver,
    project_path: &Path,
) -> PreLoopContext {
    let mut skill_contexts = Vec::new();
    for phase in &definition.phases {
        for skill_id in &phase.skills {
            let info = skills.resolve_skill(skill_id).unwrap_or_default();
            let required_deliverables = info
                .guarantees
                .iter()
                .filter(|g| g.required)
                .filter_map(|g| match &g.spec {
                    ValidationSpec::Deliverable(spec) => Some(spec.patterns.iter()),
                    _ => None,
                })
                .flatten()
                .filter(|p| p.min_count > 0)
                .map(|p| p.pattern.clone())
                .collect();

            skill_contexts.push(SkillContext {
                skill_id: skill_id.clone(),
                phase: phase.name.clone(),
                guarantee_count: info.guarantees.len(),
                required_deliverables,
            });
        }
    }

    let planning_artifacts = PLANNING_ARTIFACTS
        .iter()
        .filter(|name| project_path.join(name).is_file())
        .map(|name| name.to_string())
        .collect();

    PreLoopContext {
        skills: skill_contexts,
        planning_artifacts,
    }
}
