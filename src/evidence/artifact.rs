//! Step-proof artifact types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::now_ms;

/// The kinds of discrete proof events a skill run can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofType {
    FileCreated,
    FileModified,
    CommandRun,
    TestsPassed,
    HumanVerified,
    ArtifactGenerated,
}

/// One recorded step with its typed evidence payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProof {
    pub step_number: u32,
    pub step_name: String,
    pub proof_type: ProofType,
    pub evidence: Value,
    pub recorded_at: i64,
}

/// One artifact per (execution, skill) pair, written once at finalize time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProofArtifact {
    pub execution_id: String,
    pub skill_id: String,
    pub steps: Vec<StepProof>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl StepProofArtifact {
    pub fn new(execution_id: &str, skill_id: &str) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            skill_id: skill_id.to_string(),
            steps: Vec::new(),
            created_at: now_ms(),
            completed_at: None,
        }
    }

    /// Standard artifact filename for a skill.
    pub fn file_name(skill_id: &str) -> String {
        format!("{}-PROOF.json", skill_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_artifact_is_empty() {
        let artifact = StepProofArtifact::new("exec-1", "skill-1");
        assert_eq!(artifact.execution_id, "exec-1");
        assert_eq!(artifact.skill_id, "skill-1");
        assert!(artifact.steps.is_empty());
        assert!(artifact.completed_at.is_none());
        assert!(artifact.created_at > 0);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(StepProofArtifact::file_name("skill-1"), "skill-1-PROOF.json");
    }

    #[test]
    fn test_proof_type_serialization() {
        assert_eq!(
            serde_json::to_string(&ProofType::TestsPassed).unwrap(),
            "\"tests_passed\""
        );
        assert_eq!(
            serde_json::to_string(&ProofType::HumanVerified).unwrap(),
            "\"human_verified\""
        );
    }

    #[test]
    fn test_artifact_serialization_roundtrip() {
        let mut artifact = StepProofArtifact::new("exec-1", "skill-1");
        artifact.steps.push(StepProof {
            step_number: 1,
            step_name: "write tests".to_string(),
            proof_type: ProofType::FileCreated,
            evidence: serde_json::json!({ "path": "tests/api.rs" }),
            recorded_at: now_ms(),
        });

        let json = serde_json::to_string(&artifact).unwrap();
        let parsed: StepProofArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.steps.len(), 1);
        assert_eq!(parsed.steps[0].proof_type, ProofType::FileCreated);
    }
}
