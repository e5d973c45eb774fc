//! Evidence collector.
//!
//! Records proof events for one (execution, skill) pair and writes the
//! artifact to `{data_root}/{execution_id}/proofs/{skill_id}-PROOF.json`
//! once at finalize time.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Result;
use crate::evidence::artifact::{ProofType, StepProof, StepProofArtifact};
use crate::id::now_ms;

/// Per-skill-execution proof recorder.
#[derive(Debug)]
pub struct EvidenceCollector {
    data_root: PathBuf,
    artifact: StepProofArtifact,
}

impl EvidenceCollector {
    pub fn new(data_root: impl Into<PathBuf>, execution_id: &str, skill_id: &str) -> Self {
        Self {
            data_root: data_root.into(),
            artifact: StepProofArtifact::new(execution_id, skill_id),
        }
    }

    /// Record one proof event. Step numbers are assigned in record order.
    pub fn record(&mut self, step_name: &str, proof_type: ProofType, evidence: Value) {
        let step_number = self.artifact.steps.len() as u32 + 1;
        self.artifact.steps.push(StepProof {
            step_number,
            step_name: step_name.to_string(),
            proof_type,
            evidence,
            recorded_at: now_ms(),
        });
    }

    pub fn record_file_created(&mut self, step_name: &str, path: &Path) {
        self.record(
            step_name,
            ProofType::FileCreated,
            serde_json::json!({ "path": path.display().to_string() }),
        );
    }

    pub fn record_file_modified(&mut self, step_name: &str, path: &Path) {
        self.record(
            step_name,
            ProofType::FileModified,
            serde_json::json!({ "path": path.display().to_string() }),
        );
    }

    pub fn record_command_run(&mut self, step_name: &str, command: &str, exit_code: i32) {
        self.record(
            step_name,
            ProofType::CommandRun,
            serde_json::json!({ "command": command, "exitCode": exit_code }),
        );
    }

    pub fn record_tests_passed(&mut self, step_name: &str, passed: u32, failed: u32) {
        self.record(
            step_name,
            ProofType::TestsPassed,
            serde_json::json!({ "passed": passed, "failed": failed }),
        );
    }

    pub fn record_human_verified(&mut self, step_name: &str, verified_by: &str) {
        self.record(
            step_name,
            ProofType::HumanVerified,
            serde_json::json!({ "verifiedBy": verified_by }),
        );
    }

    pub fn record_artifact_generated(&mut self, step_name: &str, name: &str, path: &Path) {
        self.record(
            step_name,
            ProofType::ArtifactGenerated,
            serde_json::json!({ "name": name, "path": path.display().to_string() }),
        );
    }

    /// Number of steps recorded so far.
    pub fn step_count(&self) -> usize {
        self.artifact.steps.len()
    }

    /// Where the artifact for this collector will land.
    pub fn artifact_path(&self) -> PathBuf {
        proof_path(&self.data_root, &self.artifact.execution_id, &self.artifact.skill_id)
    }

    /// Stamp completion and write the artifact to disk, consuming the
    /// collector so nothing records after finalize.
    pub fn finalize(mut self) -> Result<PathBuf> {
        self.artifact.completed_at = Some(now_ms());

        let path = self.artifact_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(&self.artifact)?)?;

        tracing::debug!(
            execution_id = %self.artifact.execution_id,
            skill_id = %self.artifact.skill_id,
            steps = self.artifact.steps.len(),
            "Proof artifact written"
        );

        Ok(path)
    }
}

/// Canonical proof artifact location for a (execution, skill) pair.
pub fn proof_path(data_root: &Path, execution_id: &str, skill_id: &str) -> PathBuf {
    data_root
        .join(execution_id)
        .join("proofs")
        .join(StepProofArtifact::file_name(skill_id))
}
