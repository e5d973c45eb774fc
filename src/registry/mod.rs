//! Guarantee registry.
//!
//! A versioned, read-mostly catalog mapping skill ids, loop/gate ids, and
//! phase names to guarantee lists. The registry is supplied by an external
//! loader; the core only reads it. `RegistryHandle` wraps the catalog for
//! shared access and exposes a `reload()` hook for the loader.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{LoopgateError, Result};

pub mod condition;
pub mod guarantee;

pub use condition::{Condition, ConditionScope, ConditionVar};
pub use guarantee::{
    CompareOp, ContentCheck, ContentSpec, DeliverableSpec, FilePattern, GitStateCheck,
    GitStateSpec, Guarantee, GuaranteeType, MetricSource, ProofSource, QualitySpec,
    QualityThreshold, StepProofSpec, ValidationSpec,
};

/// Guarantees registered directly against a skill id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillGuarantees {
    #[serde(default)]
    pub guarantees: Vec<Guarantee>,
}

/// Loop-scoped guarantees: per-gate and per-phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopGuarantees {
    /// Keyed by gate id
    #[serde(default)]
    pub gate_guarantees: HashMap<String, Vec<Guarantee>>,
    /// Keyed by phase name, applied to every skill in that phase
    #[serde(default)]
    pub phase_guarantees: HashMap<String, Vec<Guarantee>>,
}

/// Phase-name-scoped guarantees applied across all loops.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseGuarantees {
    #[serde(default)]
    pub global_guarantees: Vec<Guarantee>,
}

/// The versioned catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuaranteeRegistry {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub skills: HashMap<String, SkillGuarantees>,
    #[serde(default)]
    pub loops: HashMap<String, LoopGuarantees>,
    #[serde(default)]
    pub phases: HashMap<String, PhaseGuarantees>,
}

impl GuaranteeRegistry {
    /// Guarantees registered directly for a skill.
    pub fn skill_guarantees(&self, skill_id: &str) -> &[Guarantee] {
        self.skills
            .get(skill_id)
            .map(|s| s.guarantees.as_slice())
            .unwrap_or(&[])
    }

    /// Guarantees for a gate within a loop.
    pub fn gate_guarantees(&self, loop_id: &str, gate_id: &str) -> &[Guarantee] {
        self.loops
            .get(loop_id)
            .and_then(|l| l.gate_guarantees.get(gate_id))
            .map(|g| g.as_slice())
            .unwrap_or(&[])
    }

    /// Loop-scoped guarantees for a phase.
    pub fn loop_phase_guarantees(&self, loop_id: &str, phase: &str) -> &[Guarantee] {
        self.loops
            .get(loop_id)
            .and_then(|l| l.phase_guarantees.get(phase))
            .map(|g| g.as_slice())
            .unwrap_or(&[])
    }

    /// Phase-level guarantees applied across all loops.
    pub fn phase_global_guarantees(&self, phase: &str) -> &[Guarantee] {
        self.phases
            .get(phase)
            .map(|p| p.global_guarantees.as_slice())
            .unwrap_or(&[])
    }
}

/// Shared, reloadable view over the registry.
///
/// Hot-reload itself is a collaborator concern; the handle only swaps in
/// whatever the loader hands it.
pub struct RegistryHandle {
    inner: RwLock<GuaranteeRegistry>,
}

impl RegistryHandle {
    pub fn new(registry: GuaranteeRegistry) -> Self {
        Self {
            inner: RwLock::new(registry),
        }
    }

    pub fn empty() -> Self {
        Self::new(GuaranteeRegistry::default())
    }

    /// Read access to the current catalog.
    pub fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, GuaranteeRegistry>> {
        self.inner.read().map_err(|e| LoopgateError::Storage(e.to_string()))
    }

    /// Replace the catalog with a freshly loaded one.
    pub fn reload(&self, registry: GuaranteeRegistry) -> Result<()> {
        let mut guard = self.inner.write().map_err(|e| LoopgateError::Storage(e.to_string()))?;
        tracing::info!(
            old_version = %guard.version,
            new_version = %registry.version,
            "Guarantee registry reloaded"
        );
        *guard = registry;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::guarantee::{DeliverableSpec, FilePattern, ValidationSpec};

    fn deliverable(id: &str) -> Guarantee {
        Guarantee {
            id: id.to_string(),
            name: format!("{} name", id),
            required: true,
            condition: None,
            spec: ValidationSpec::Deliverable(DeliverableSpec {
                patterns: vec![FilePattern {
                    pattern: "REPORT.md".to_string(),
                    min_count: 1,
                    max_count: None,
                    condition: None,
                }],
            }),
        }
    }

    fn registry() -> GuaranteeRegistry {
        let mut reg = GuaranteeRegistry {
            version: "3".to_string(),
            ..Default::default()
        };
        reg.skills.insert(
            "skill-1".to_string(),
            SkillGuarantees {
                guarantees: vec![deliverable("g-skill")],
            },
        );
        let mut loop_g = LoopGuarantees::default();
        loop_g.gate_guarantees.insert("g1".to_string(), vec![deliverable("g-gate")]);
        loop_g
            .phase_guarantees
            .insert("build".to_string(), vec![deliverable("g-loop-phase")]);
        reg.loops.insert("loop-a".to_string(), loop_g);
        reg.phases.insert(
            "build".to_string(),
            PhaseGuarantees {
                global_guarantees: vec![deliverable("g-phase")],
            },
        );
        reg
    }

    #[test]
    fn test_skill_lookup() {
        let reg = registry();
        assert_eq!(reg.skill_guarantees("skill-1").len(), 1);
        assert!(reg.skill_guarantees("missing").is_empty());
    }

    #[test]
    fn test_gate_lookup() {
        let reg = registry();
        assert_eq!(reg.gate_guarantees("loop-a", "g1")[0].id, "g-gate");
        assert!(reg.gate_guarantees("loop-a", "g9").is_empty());
        assert!(reg.gate_guarantees("loop-z", "g1").is_empty());
    }

    #[test]
    fn test_phase_lookups() {
        let reg = registry();
        assert_eq!(reg.loop_phase_guarantees("loop-a", "build")[0].id, "g-loop-phase");
        assert_eq!(reg.phase_global_guarantees("build")[0].id, "g-phase");
        assert!(reg.phase_global_guarantees("design").is_empty());
    }

    #[test]
    fn test_handle_reload() {
        let handle = RegistryHandle::empty();
        assert!(handle.read().unwrap().skills.is_empty());

        handle.reload(registry()).unwrap();
        let guard = handle.read().unwrap();
        assert_eq!(guard.version, "3");
        assert_eq!(guard.skill_guarantees("skill-1").len(), 1);
    }

    #[test]
    fn test_registry_deserializes_from_loader_shape() {
        let json = r#"{
            "version": "7",
            "skills": {
                "skill-1": { "guarantees": [] }
            },
            "loops": {
                "loop-a": { "gateGuarantees": {}, "phaseGuarantees": {} }
            },
            "phases": {
                "build": { "globalGuarantees": [] }
            }
        }"#;
        let reg: GuaranteeRegistry = serde_json::from_str(json).unwrap();
        assert_eq!(reg.version, "7");
        assert!(reg.skills.contains_key("skill-1"));
        assert!(reg.loops.contains_key("loop-a"));
        assert!(reg.phases.contains_key("build"));
    }
}
