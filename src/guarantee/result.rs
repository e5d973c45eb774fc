//! Guarantee validation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::guarantee::{Guarantee, GuaranteeType};

/// One piece of evidence explaining a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Short label, e.g. "glob_match" or "acknowledgment"
    pub kind: String,
    pub detail: Value,
}

impl Evidence {
    pub fn new(kind: &str, detail: Value) -> Self {
        Self {
            kind: kind.to_string(),
            detail,
        }
    }
}

/// Outcome of validating one guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuaranteeResult {
    pub guarantee_id: String,
    pub name: String,
    pub guarantee_type: GuaranteeType,
    pub passed: bool,
    pub required: bool,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl GuaranteeResult {
    /// A fresh passing result for the given guarantee.
    pub fn pass(guarantee: &Guarantee) -> Self {
        Self::base(guarantee, true)
    }

    /// A fresh failing result for the given guarantee.
    pub fn fail(guarantee: &Guarantee) -> Self {
        Self::base(guarantee, false)
    }

    fn base(guarantee: &Guarantee, passed: bool) -> Self {
        Self {
            guarantee_id: guarantee.id.clone(),
            name: guarantee.name.clone(),
            guarantee_type: guarantee.guarantee_type(),
            passed,
            required: guarantee.required,
            evidence: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }

    /// Required and failed: blocks the requesting transition.
    pub fn is_blocking(&self) -> bool {
        self.required && !self.passed
    }
}

/// Aggregate result of one validation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// True when no blocking failures occurred
    pub passed: bool,
    /// All results in evaluation order
    pub results: Vec<GuaranteeResult>,
    /// Required + failed
    pub blocking: Vec<GuaranteeResult>,
    /// Optional + failed
    pub warnings: Vec<GuaranteeResult>,
}

impl ValidationSummary {
    /// Partition results into blocking and warning sets.
    pub fn from_results(results: Vec<GuaranteeResult>) -> Self {
        let blocking: Vec<GuaranteeResult> =
            results.iter().filter(|r| r.is_blocking()).cloned().collect();
        let warnings: Vec<GuaranteeResult> = results
            .iter()
            .filter(|r| !r.passed && !r.required)
            .cloned()
            .collect();

        Self {
            passed: blocking.is_empty(),
            results,
            blocking,
            warnings,
        }
    }

    /// An empty summary trivially passes.
    pub fn empty() -> Self {
        Self::from_results(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::guarantee::{DeliverableSpec, ValidationSpec};

    fn guarantee(id: &str, required: bool) -> Guarantee {
        Guarantee {
            id: id.to_string(),
            name: format!("{} name", id),
            required,
            condition: None,
            spec: ValidationSpec::Deliverable(DeliverableSpec { patterns: vec![] }),
        }
    }

    #[test]
    fn test_pass_and_fail_constructors() {
        let g = guarantee("g1", true);

        let pass = GuaranteeResult::pass(&g);
        assert!(pass.passed);
        assert!(!pass.is_blocking());
        assert_eq!(pass.guarantee_type, GuaranteeType::Deliverable);

        let fail = GuaranteeResult::fail(&g).with_error("missing file");
        assert!(!fail.passed);
        assert!(fail.is_blocking());
        assert_eq!(fail.errors, vec!["missing file"]);
    }

    #[test]
    fn test_optional_failure_is_not_blocking() {
        let g = guarantee("g1", false);
        let fail = GuaranteeResult::fail(&g);
        assert!(!fail.is_blocking());
    }

    #[test]
    fn test_summary_partitioning() {
        let results = vec![
            GuaranteeResult::pass(&guarantee("ok", true)),
            GuaranteeResult::fail(&guarantee("block", true)),
            GuaranteeResult::fail(&guarantee("warn", false)),
        ];

        let summary = ValidationSummary::from_results(results);
        assert!(!summary.passed);
        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.blocking.len(), 1);
        assert_eq!(summary.blocking[0].guarantee_id, "block");
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.warnings[0].guarantee_id, "warn");
    }

    #[test]
    fn test_summary_passes_with_only_warnings() {
        let results = vec![
            GuaranteeResult::pass(&guarantee("ok", true)),
            GuaranteeResult::fail(&guarantee("warn", false)),
        ];

        let summary = ValidationSummary::from_results(results);
        assert!(summary.passed);
        assert!(summary.blocking.is_empty());
        assert_eq!(summary.warnings.len(), 1);
    }

    #[test]
    fn test_empty_summary_passes() {
        let summary = ValidationSummary::empty();
        assert!(summary.passed);
        assert!(summary.results.is_empty());
    }

    #[test]
    fn test_result_serialization_roundtrip() {
        let g = guarantee("g1", true);
        let result = GuaranteeResult::fail(&g)
            .with_error("bad")
            .with_evidence(Evidence::new("glob_match", serde_json::json!({ "count": 0 })));

        let json = serde_json::to_string(&result).unwrap();
        let parsed: GuaranteeResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.guarantee_id, "g1");
        assert_eq!(parsed.evidence.len(), 1);
        assert_eq!(parsed.evidence[0].kind, "glob_match");
    }
}
