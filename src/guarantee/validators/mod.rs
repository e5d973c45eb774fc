//! Type-specific guarantee validators.
//!
//! Each family receives the guarantee's validation spec plus the shared
//! context and produces a `GuaranteeResult`. Validator-internal errors are
//! downgraded to guarantee-level errors or warnings; nothing here panics
//! or propagates past the validator boundary.

use std::path::Path;

use crate::collab::DeliverableStore;
use crate::guarantee::context::ValidationContext;
use crate::guarantee::result::GuaranteeResult;
use crate::registry::guarantee::{Guarantee, ValidationSpec};

pub mod content;
pub mod deliverable;
pub mod git_state;
pub mod quality;
pub mod step_proof;

/// External resources validators draw on.
pub struct ValidatorDeps<'a> {
    /// Root of the durable data directory (proof artifacts live here)
    pub data_root: &'a Path,
    pub deliverables: &'a dyn DeliverableStore,
}

/// Dispatch to the matching validator family.
pub fn run_validator(
    guarantee: &Guarantee,
    ctx: &ValidationContext,
    deps: &ValidatorDeps<'_>,
) -> GuaranteeResult {
    match &guarantee.spec {
        ValidationSpec::Deliverable(spec) => {
            deliverable::validate(guarantee, spec, ctx, deps.deliverables)
        }
        ValidationSpec::StepProof(spec) => step_proof::validate(guarantee, spec, ctx, deps.data_root),
        ValidationSpec::Content(spec) => content::validate(guarantee, spec, ctx, deps.deliverables),
        ValidationSpec::Quality(spec) => quality::validate(guarantee, spec, ctx),
        ValidationSpec::GitState(spec) => git_state::validate(guarantee, spec, ctx),
    }
}

/// True when a file name looks like a canonical deliverable: upper-snake
/// `.md`, optionally versioned (`REPORT.md`, `DESIGN_V2.md`).
pub(crate) fn is_canonical_deliverable_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".md") else {
        return false;
    };
    if stem.is_empty() {
        return false;
    }
    let mut chars = stem.chars();
    let first = chars.next().unwrap();
    first.is_ascii_uppercase()
        && stem
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
