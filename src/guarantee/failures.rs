//! Guarantee failure records for downstream learning.
//!
//! Every blocking validation failure is recorded here, independent of the
//! acknowledgment/override path: an override later does not erase the
//! historical signal that the guarantee originally failed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoopgateError, Result};
use crate::registry::guarantee::GuaranteeType;

/// One blocking failure, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuaranteeFailureRecord {
    pub timestamp: DateTime<Utc>,
    pub execution_id: String,
    pub skill_id: String,
    pub phase: String,
    pub guarantee_id: String,
    pub guarantee_type: GuaranteeType,
    pub errors: Vec<String>,
    /// Filled in later by a learning collaborator, if at all
    pub resolution: Option<String>,
}

/// Append-only failure log: in-memory list plus a JSONL file at
/// `{data_root}/guarantee_failures.jsonl`.
pub struct FailureLog {
    path: PathBuf,
    records: RwLock<Vec<GuaranteeFailureRecord>>,
}

impl FailureLog {
    pub fn open(data_root: impl AsRef<Path>) -> Self {
        Self {
            path: data_root.as_ref().join("guarantee_failures.jsonl"),
            records: RwLock::new(Vec::new()),
        }
    }

    /// Append one record in memory and to the JSONL file.
    pub fn record(&self, record: GuaranteeFailureRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&record)?)?;

        let mut records = self.records.write().map_err(|e| LoopgateError::Storage(e.to_string()))?;
        records.push(record);
        Ok(())
    }

    /// Snapshot of the in-memory records for this process.
    pub fn records(&self) -> Vec<GuaranteeFailureRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records for one execution.
    pub fn for_execution(&self, execution_id: &str) -> Vec<GuaranteeFailureRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.execution_id == execution_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(execution_id: &str, guarantee_id: &str) -> GuaranteeFailureRecord {
        GuaranteeFailureRecord {
            timestamp: Utc::now(),
            execution_id: execution_id.to_string(),
            skill_id: "skill-1".to_string(),
            phase: "build".to_string(),
            guarantee_id: guarantee_id.to_string(),
            guarantee_type: GuaranteeType::Deliverable,
            errors: vec!["REPORT.md not found".to_string()],
            resolution: None,
        }
    }

    #[test]
    fn test_record_appends_in_memory_and_to_file() {
        let temp = TempDir::new().unwrap();
        let log = FailureLog::open(temp.path());

        log.record(record("exec-1", "g1")).unwrap();
        log.record(record("exec-1", "g2")).unwrap();

        assert_eq!(log.records().len(), 2);

        let content = std::fs::read_to_string(temp.path().join("guarantee_failures.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: GuaranteeFailureRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.guarantee_id, "g1");
    }

    #[test]
    fn test_for_execution_filters() {
        let temp = TempDir::new().unwrap();
        let log = FailureLog::open(temp.path());

        log.record(record("exec-1", "g1")).unwrap();
        log.record(record("exec-2", "g1")).unwrap();

        assert_eq!(log.for_execution("exec-1").len(), 1);
        assert!(log.for_execution("exec-9").is_empty());
    }

    #[test]
    fn test_file_survives_process_restart() {
        let temp = TempDir::new().unwrap();
        {
            let log = FailureLog::open(temp.path());
            log.record(record("exec-1", "g1")).unwrap();
        }
        // New instance starts with an empty in-memory list but the file
        // keeps accumulating
        {
            let log = FailureLog::open(temp.path());
            assert!(log.records().is_empty());
            log.record(record("exec-1", "g2")).unwrap();
        }

        let content = std::fs::read_to_string(temp.path().join("guarantee_failures.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
