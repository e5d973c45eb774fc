//! Evidence collection for step proofs.
//!
//! A per-skill-execution recorder that timestamps discrete proof events and
//! serializes them to a durable artifact consumed by the step-proof
//! validator.

pub mod artifact;
pub mod collector;

pub use artifact::{ProofType, StepProof, StepProofArtifact};
pub use collector::EvidenceCollector;
