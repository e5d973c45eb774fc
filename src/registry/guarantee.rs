//! Guarantee definitions.
//!
//! A guarantee is a declared, typed policy check gating a skill completion
//! or gate approval. The type-specific validation spec is a tagged union;
//! each variant is consumed by the matching validator family.

use serde::{Deserialize, Serialize};

use crate::registry::condition::Condition;

/// The five guarantee families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuaranteeType {
    Deliverable,
    StepProof,
    Content,
    Quality,
    GitState,
}

impl GuaranteeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuaranteeType::Deliverable => "deliverable",
            GuaranteeType::StepProof => "step_proof",
            GuaranteeType::Content => "content",
            GuaranteeType::Quality => "quality",
            GuaranteeType::GitState => "git_state",
        }
    }
}

/// A declared policy check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guarantee {
    pub id: String,
    pub name: String,
    /// Required guarantees block on failure; optional ones only warn
    #[serde(default = "default_required")]
    pub required: bool,
    /// If present and false for the current scope, the guarantee is
    /// skipped entirely and does not appear in results
    pub condition: Option<Condition>,
    pub spec: ValidationSpec,
}

fn default_required() -> bool {
    true
}

impl Guarantee {
    pub fn guarantee_type(&self) -> GuaranteeType {
        match &self.spec {
            ValidationSpec::Deliverable(_) => GuaranteeType::Deliverable,
            ValidationSpec::StepProof(_) => GuaranteeType::StepProof,
            ValidationSpec::Content(_) => GuaranteeType::Content,
            ValidationSpec::Quality(_) => GuaranteeType::Quality,
            ValidationSpec::GitState(_) => GuaranteeType::GitState,
        }
    }
}

/// Type-specific validation specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationSpec {
    Deliverable(DeliverableSpec),
    StepProof(StepProofSpec),
    Content(ContentSpec),
    Quality(QualitySpec),
    GitState(GitStateSpec),
}

/// Deliverable guarantee: file patterns that must resolve to matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverableSpec {
    pub patterns: Vec<FilePattern>,
}

/// One glob pattern with match-count bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePattern {
    /// Glob pattern, relative to the resolved project path
    pub pattern: String,
    #[serde(default = "default_min_count")]
    pub min_count: usize,
    pub max_count: Option<usize>,
    /// Per-pattern gate; a false condition skips just this pattern
    pub condition: Option<Condition>,
}

fn default_min_count() -> usize {
    1
}

/// Step-proof guarantee: evidence recorded during skill execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProofSpec {
    pub proof_source: ProofSource,
    /// Override for the artifact path pattern; `{executionId}` and
    /// `{skillId}` placeholders are substituted
    pub artifact_pattern: Option<String>,
}

/// Where step proof is read from. Only `Artifact` is implemented; the
/// others are declared and always validate to a non-blocking warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofSource {
    Artifact,
    Log,
    Git,
    ExecutionState,
}

/// Content guarantee: shape checks over deliverable files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSpec {
    pub checks: Vec<ContentCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCheck {
    /// File path relative to the project, or a canonical deliverable name
    pub file: String,
    pub min_lines: Option<usize>,
    pub max_lines: Option<usize>,
    /// Required section headings, tolerant of leading `#` markers
    #[serde(default)]
    pub sections: Vec<String>,
    /// Regex patterns that must match somewhere in the content
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Quality guarantee: numeric metric thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySpec {
    pub thresholds: Vec<QualityThreshold>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityThreshold {
    /// Metric name to extract, e.g. "coverage" or "critical_issues"
    pub metric: String,
    pub source: MetricSource,
    pub operator: CompareOp,
    pub value: f64,
}

/// Where a quality metric comes from. `Command` and `MetricApi` are
/// declared but unimplemented; they emit a warning and continue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricSource {
    File { path: String },
    Command { command: String },
    MetricApi { endpoint: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Gte,
    Lte,
    Gt,
    Lt,
}

impl CompareOp {
    pub fn compare(&self, actual: f64, expected: f64) -> bool {
        match self {
            CompareOp::Eq => (actual - expected).abs() < f64::EPSILON,
            CompareOp::Gte => actual >= expected,
            CompareOp::Lte => actual <= expected,
            CompareOp::Gt => actual > expected,
            CompareOp::Lt => actual < expected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Gte => "gte",
            CompareOp::Lte => "lte",
            CompareOp::Gt => "gt",
            CompareOp::Lt => "lt",
        }
    }
}

/// Git-state guarantee: live repository checks in the project directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStateSpec {
    pub check: GitStateCheck,
    /// Path prefixes excluded before judging cleanliness (no_uncommitted)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Branch to compare against; defaults to the current branch
    pub branch: Option<String>,
}

fn default_remote() -> String {
    "origin".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitStateCheck {
    /// Working tree has no uncommitted changes outside excluded prefixes
    NoUncommitted,
    /// No commits ahead of the upstream. A branch with no upstream is a
    /// warning, not a failure: the original behavior is deliberately
    /// preserved even though "no upstream" could be read either way.
    NoUnpushed,
    /// Local and remote branch heads are the same commit
    BranchPushed,
    /// Every registered worktree is clean; inaccessible worktrees are
    /// tolerated
    WorktreeClean,
}
