//! Quality validator.
//!
//! Extracts named numeric metrics from a source and compares them against
//! declared thresholds. File sources understand a fenced JSON block keyed
//! by metric name, plus well-known textual markers for pass/fail,
//! critical-issue counts, and build success. Command and metric-API
//! sources are declared but unimplemented; they warn and continue.
//! Failure to extract a value is itself a failure, not a skip.

use std::fs;
use std::sync::OnceLock;

use regex::Regex;

use crate::guarantee::context::ValidationContext;
use crate::guarantee::result::{Evidence, GuaranteeResult};
use crate::registry::guarantee::{Guarantee, MetricSource, QualitySpec, QualityThreshold};

pub fn validate(guarantee: &Guarantee, spec: &QualitySpec, ctx: &ValidationContext) -> GuaranteeResult {
    let mut result = GuaranteeResult::pass(guarantee);

    for threshold in &spec.thresholds {
        match &threshold.source {
            MetricSource::File { path } => check_file_metric(threshold, path, ctx, &mut result),
            MetricSource::Command { command } => {
                result.warnings.push(format!(
                    "Quality metric {} from command {:?} is not yet implemented; threshold was not checked",
                    threshold.metric, command
                ));
            }
            MetricSource::MetricApi { endpoint } => {
                result.warnings.push(format!(
                    "Quality metric {} from metric API {} is not yet implemented; threshold was not checked",
                    threshold.metric, endpoint
                ));
            }
        }
    }

    result
}

fn check_file_metric(
    threshold: &QualityThreshold,
    path: &str,
    ctx: &ValidationContext,
    result: &mut GuaranteeResult,
) {
    let full_path = ctx.project_path.join(path);
    let content = match fs::read_to_string(&full_path) {
        Ok(c) => c,
        Err(e) => {
            result.passed = false;
            result
                .errors
                .push(format!("Failed to read metric source {}: {}", full_path.display(), e));
            return;
        }
    };

    let Some(actual) = extract_metric(&content, &threshold.metric) else {
        result.passed = false;
        result.errors.push(format!(
            "Could not extract metric {} from {}",
            threshold.metric, path
        ));
        return;
    };

    result.evidence.push(Evidence::new(
        "metric",
        serde_json::json!({
            "metric": threshold.metric,
            "source": path,
            "value": actual,
        }),
    ));

    if !threshold.operator.compare(actual, threshold.value) {
        result.passed = false;
        result.errors.push(format!(
            "Metric {}: expected {} {}, found {}",
            threshold.metric,
            threshold.operator.as_str(),
            threshold.value,
            actual
        ));
    }
}

/// Metric extraction: a fenced JSON block exposing the metric by key wins;
/// otherwise fall back to well-known textual markers.
fn extract_metric(content: &str, metric: &str) -> Option<f64> {
    if let Some(value) = extract_from_json_block(content, metric) {
        return Some(value);
    }
    extract_from_markers(content, metric)
}

fn extract_from_json_block(content: &str, metric: &str) -> Option<f64> {
    let start = content.find("```json")?;
    let body = &content[start + "```json".len()..];
    let end = body.find("```")?;
    let block: serde_json::Value = serde_json::from_str(body[..end].trim()).ok()?;
    block.get(metric)?.as_f64()
}

fn extract_from_markers(content: &str, metric: &str) -> Option<f64> {
    match metric {
        "passed" => {
            static PASS: OnceLock<Regex> = OnceLock::new();
            static FAIL: OnceLock<Regex> = OnceLock::new();
            let pass = PASS.get_or_init(|| Regex::new(r"(?im)^\s*(status:\s*)?pass(ed)?\b").unwrap());
            let fail = FAIL.get_or_init(|| Regex::new(r"(?im)^\s*(status:\s*)?fail(ed)?\b").unwrap());
            if fail.is_match(content) {
                Some(0.0)
            } else if pass.is_match(content) {
                Some(1.0)
            } else {
                None
            }
        }
        "critical_issues" => {
            static CRIT: OnceLock<Regex> = OnceLock::new();
            let crit = CRIT.get_or_init(|| Regex::new(r"(?i)critical issues?:\s*(\d+)").unwrap());
            crit.captures(content)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
        }
        "build_success" => {
            let lower = content.to_lowercase();
            if lower.contains("build failed") || lower.contains("build failure") {
                Some(0.0)
            } else if lower.contains("build success") || lower.contains("build succeeded") {
                Some(1.0)
            } else {
                None
            }
        }
        _ => None,
    }
}
