//! Loop definition types.
//!
//! A loop is a named, versioned workflow of ordered phases and gates. These
//! types are supplied by an external loop resolver and are read-only to the
//! core: the engine never mutates a definition, only the execution built
//! from it.

use serde::{Deserialize, Serialize};

/// A workflow definition: ordered phases plus approval gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopDefinition {
    /// Stable loop identifier
    pub id: String,

    /// Definition version, stamped onto executions at start
    pub version: String,

    /// Ordered phases; execution proceeds front to back
    pub phases: Vec<PhaseDefinition>,

    /// Approval gates, each bound to the phase it follows
    #[serde(default)]
    pub gates: Vec<GateDefinition>,
}

/// A named stage of a loop containing an ordered set of skills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDefinition {
    pub name: String,

    /// Skill ids, in execution order
    pub skills: Vec<String>,
}

/// An approval checkpoint bound to the phase it follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDefinition {
    pub id: String,

    /// Name of the phase this gate blocks departure from
    pub after_phase: String,

    /// A required gate must be approved before the execution can leave
    /// `after_phase`; an optional gate never blocks advancement
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl LoopDefinition {
    /// Find a phase by name.
    pub fn phase(&self, name: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Index of a phase by name.
    pub fn phase_index(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name == name)
    }

    /// Gates bound to the given phase.
    pub fn gates_after(&self, phase: &str) -> Vec<&GateDefinition> {
        self.gates.iter().filter(|g| g.after_phase == phase).collect()
    }

    /// True if the named phase is the last phase of the loop.
    pub fn is_last_phase(&self, name: &str) -> bool {
        match self.phase_index(name) {
            Some(i) => i + 1 == self.phases.len(),
            None => false,
        }
    }
}
