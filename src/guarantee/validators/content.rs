//! Content validator.
//!
//! Shape checks over deliverable files: line-count bounds, required section
//! headings (tolerant of leading `#` markers), and regex patterns. Target
//! files resolve from the project path first, then from the deliverable
//! store for canonical deliverable names. Invalid regexes downgrade to a
//! warning rather than a hard failure.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::collab::DeliverableStore;
use crate::guarantee::context::ValidationContext;
use crate::guarantee::result::{Evidence, GuaranteeResult};
use crate::guarantee::validators::is_canonical_deliverable_name;
use crate::registry::guarantee::{ContentCheck, ContentSpec, Guarantee};

pub fn validate(
    guarantee: &Guarantee,
    spec: &ContentSpec,
    ctx: &ValidationContext,
    deliverables: &dyn DeliverableStore,
) -> GuaranteeResult {
    let mut result = GuaranteeResult::pass(guarantee);

    for check in &spec.checks {
        let Some(path) = resolve_file(check, ctx, deliverables) else {
            result.passed = false;
            result.errors.push(format!(
                "File not found in project or deliverable store: {}",
                check.file
            ));
            continue;
        };

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                result.passed = false;
                result.errors.push(format!("Failed to read {}: {}", path.display(), e));
                continue;
            }
        };

        result.evidence.push(Evidence::new(
            "content_file",
            serde_json::json!({
                "file": check.file,
                "path": path.display().to_string(),
                "lines": content.lines().count(),
            }),
        ));

        check_lines(check, &content, &mut result);
        check_sections(check, &content, &mut result);
        check_patterns(check, &content, &mut result);
    }

    result
}

fn resolve_file(
    check: &ContentCheck,
    ctx: &ValidationContext,
    deliverables: &dyn DeliverableStore,
) -> Option<PathBuf> {
    let direct = ctx.project_path.join(&check.file);
    if direct.is_file() {
        return Some(direct);
    }

    let basename = Path::new(&check.file)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if is_canonical_deliverable_name(&basename)
        && let Some(path) = deliverables.deliverable_path(&ctx.execution_id, &basename)
        && path.is_file()
    {
        return Some(path);
    }

    None
}

fn check_lines(check: &ContentCheck, content: &str, result: &mut GuaranteeResult) {
    let lines = content.lines().count();

    if let Some(min) = check.min_lines
        && lines < min
    {
        result.passed = false;
        result.errors.push(format!(
            "{}: expected at least {} lines, found {}",
            check.file, min, lines
        ));
    }
    if let Some(max) = check.max_lines
        && lines > max
    {
        result.passed = false;
        result.errors.push(format!(
            "{}: expected at most {} lines, found {}",
            check.file, max, lines
        ));
    }
}

fn check_sections(check: &ContentCheck, content: &str, result: &mut GuaranteeResult) {
    for section in &check.sections {
        if !has_heading(content, section) {
            result.passed = false;
            result
                .errors
                .push(format!("{}: missing required section: {}", check.file, section));
        }
    }
}

/// Heading match tolerant of leading `#` markers: "## Usage" in the spec
/// matches "## Usage", "### Usage", or a declared bare "Usage".
fn has_heading(content: &str, section: &str) -> bool {
    let wanted = section.trim_start_matches('#').trim();
    content.lines().any(|line| {
        let line = line.trim();
        line.starts_with('#') && line.trim_start_matches('#').trim() == wanted
    })
}

fn check_patterns(check: &ContentCheck, content: &str, result: &mut GuaranteeResult) {
    for pattern in &check.patterns {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(content) {
                    result.passed = false;
                    result
                        .errors
                        .push(format!("{}: pattern not matched: {}", check.file, pattern));
                }
            }
            Err(e) => {
                // Malformed guarantee, not a malformed deliverable
                result
                    .warnings
                    .push(format!("{}: invalid regex pattern {}: {}", check.file, pattern, e));
            }
        }
    }
}
