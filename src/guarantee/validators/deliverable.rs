//! Deliverable validator.
//!
//! Glob-matches each file pattern against the resolved project path. When a
//! pattern's basename is a canonical deliverable name, matches registered in
//! the external deliverable store are unioned in, de-duplicated. Fails when
//! the unique match count falls outside the pattern's `[min_count,
//! max_count]` bounds.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::collab::DeliverableStore;
use crate::guarantee::context::ValidationContext;
use crate::guarantee::result::{Evidence, GuaranteeResult};
use crate::guarantee::validators::is_canonical_deliverable_name;
use crate::registry::guarantee::{DeliverableSpec, FilePattern, Guarantee};

/// Cap on matched paths recorded as evidence.
const EVIDENCE_PATH_CAP: usize = 10;

pub fn validate(
    guarantee: &Guarantee,
    spec: &DeliverableSpec,
    ctx: &ValidationContext,
    deliverables: &dyn DeliverableStore,
) -> GuaranteeResult {
    let mut result = GuaranteeResult::pass(guarantee);
    let scope = ctx.condition_scope();

    for pattern in &spec.patterns {
        // A per-pattern condition that evaluates false skips the pattern
        if let Some(cond) = &pattern.condition
            && !cond.evaluate(&scope)
        {
            continue;
        }

        let (matches, glob_count, store_count, glob_error) =
            collect_matches(pattern, ctx, deliverables);

        if let Some(err) = glob_error {
            result.passed = false;
            result.errors.push(err);
            continue;
        }

        let found = matches.len();
        let capped: Vec<String> = matches
            .iter()
            .take(EVIDENCE_PATH_CAP)
            .map(|p| p.display().to_string())
            .collect();

        result.evidence.push(Evidence::new(
            "glob_match",
            serde_json::json!({
                "pattern": pattern.pattern,
                "globCount": glob_count,
                "storeCount": store_count,
                "matches": capped,
            }),
        ));

        if found < pattern.min_count {
            result.passed = false;
            result.errors.push(format!(
                "Pattern {}: expected at least {} match(es), found {}",
                pattern.pattern, pattern.min_count, found
            ));
        } else if let Some(max) = pattern.max_count
            && found > max
        {
            result.passed = false;
            result.errors.push(format!(
                "Pattern {}: expected at most {} match(es), found {}",
                pattern.pattern, max, found
            ));
        }
    }

    result
}

/// Unique matches from glob plus, for canonical deliverable names, the
/// external store. Returns (matches, glob_count, store_count, glob_error).
fn collect_matches(
    pattern: &FilePattern,
    ctx: &ValidationContext,
    deliverables: &dyn DeliverableStore,
) -> (BTreeSet<PathBuf>, usize, usize, Option<String>) {
    let mut matches = BTreeSet::new();

    let full_pattern = ctx.project_path.join(&pattern.pattern);
    let glob_result = glob::glob(&full_pattern.to_string_lossy());
    let mut glob_count = 0;
    match glob_result {
        Ok(paths) => {
            for path in paths.flatten() {
                glob_count += 1;
                matches.insert(path);
            }
        }
        Err(e) => {
            return (
                matches,
                0,
                0,
                Some(format!("Invalid glob pattern {}: {}", pattern.pattern, e)),
            );
        }
    }

    let mut store_count = 0;
    let basename = Path::new(&pattern.pattern)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if is_canonical_deliverable_name(&basename)
        && let Some(path) = deliverables.deliverable_path(&ctx.execution_id, &basename)
    {
        store_count = 1;
        matches.insert(path);
    }

    (matches, glob_count, store_count, None)
}
