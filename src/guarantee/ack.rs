//! Guarantee acknowledgments.
//!
//! An acknowledgment is a human-authored override recording that a
//! guarantee was resolved by means other than automated validation. The
//! store uses a dirty-flag pattern: mutations mark the table dirty and
//! attempt an opportunistic save whose errors are logged, never returned;
//! `flush()` forces the pending save before shutdown.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoopgateError, Result};

/// How the human resolved the guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionType {
    /// Underlying condition was fixed outside automated validation
    Fixed,
    /// Guarantee intentionally not satisfied for this run
    Skipped,
    /// Failure overridden by operator judgment
    Overridden,
}

/// One acknowledgment record, unique per (execution, skill, guarantee).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgment {
    pub execution_id: String,
    /// Empty for gate-level acknowledgments
    pub skill_id: String,
    pub guarantee_id: String,
    pub resolution_type: ResolutionType,
    pub evidence: Option<String>,
    pub acknowledged_at: DateTime<Utc>,
}

#[derive(Default)]
struct AckTable {
    records: Vec<Acknowledgment>,
    dirty: bool,
}

/// Durable acknowledgment table at `{data_root}/acknowledgments.json`.
pub struct AckStore {
    path: PathBuf,
    table: RwLock<AckTable>,
}

impl AckStore {
    /// Open the store, loading any existing table from disk.
    pub fn open(data_root: impl AsRef<Path>) -> Result<Self> {
        let path = data_root.as_ref().join("acknowledgments.json");
        let records = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            table: RwLock::new(AckTable { records, dirty: false }),
        })
    }

    /// Create or update a single acknowledgment, then attempt a save.
    /// Save failures are logged, never surfaced to the acknowledging caller.
    pub fn acknowledge(
        &self,
        execution_id: &str,
        skill_id: &str,
        guarantee_id: &str,
        resolution_type: ResolutionType,
        evidence: Option<String>,
    ) {
        let record = Acknowledgment {
            execution_id: execution_id.to_string(),
            skill_id: skill_id.to_string(),
            guarantee_id: guarantee_id.to_string(),
            resolution_type,
            evidence,
            acknowledged_at: Utc::now(),
        };

        if let Ok(mut table) = self.table.write() {
            if let Some(existing) = table.records.iter_mut().find(|a| {
                a.execution_id == execution_id && a.skill_id == skill_id && a.guarantee_id == guarantee_id
            }) {
                *existing = record;
            } else {
                table.records.push(record);
            }
            table.dirty = true;
        }

        if let Err(e) = self.save_if_dirty() {
            tracing::error!(error = %e, "Failed to save acknowledgments");
        }
    }

    /// Skill-scoped lookup: exact (execution, skill, guarantee) match.
    pub fn find_for_skill(
        &self,
        execution_id: &str,
        skill_id: &str,
        guarantee_id: &str,
    ) -> Option<Acknowledgment> {
        let table = self.table.read().ok()?;
        table
            .records
            .iter()
            .find(|a| {
                a.execution_id == execution_id && a.skill_id == skill_id && a.guarantee_id == guarantee_id
            })
            .cloned()
    }

    /// Gate-scoped lookup: any acknowledgment for this (execution,
    /// guarantee) regardless of skill, since gate guarantees aggregate
    /// across skills.
    pub fn find_for_execution(&self, execution_id: &str, guarantee_id: &str) -> Option<Acknowledgment> {
        let table = self.table.read().ok()?;
        table
            .records
            .iter()
            .find(|a| a.execution_id == execution_id && a.guarantee_id == guarantee_id)
            .cloned()
    }

    /// Remove all acknowledgments for an execution.
    pub fn clear_execution(&self, execution_id: &str) {
        if let Ok(mut table) = self.table.write() {
            let before = table.records.len();
            table.records.retain(|a| a.execution_id != execution_id);
            if table.records.len() != before {
                table.dirty = true;
            }
        }
        if let Err(e) = self.save_if_dirty() {
            tracing::error!(error = %e, "Failed to save acknowledgments");
        }
    }

    /// Remove all acknowledgments for one skill within an execution.
    pub fn clear_skill(&self, execution_id: &str, skill_id: &str) {
        if let Ok(mut table) = self.table.write() {
            let before = table.records.len();
            table
                .records
                .retain(|a| !(a.execution_id == execution_id && a.skill_id == skill_id));
            if table.records.len() != before {
                table.dirty = true;
            }
        }
        if let Err(e) = self.save_if_dirty() {
            tracing::error!(error = %e, "Failed to save acknowledgments");
        }
    }

    /// Force any pending save to complete. Required before shutdown to
    /// avoid losing acknowledgments made just before exit.
    pub fn flush(&self) -> Result<()> {
        self.save_if_dirty()
    }

    fn save_if_dirty(&self) -> Result<()> {
        let records = {
            let table = self.table.read().map_err(|e| LoopgateError::Storage(e.to_string()))?;
            if !table.dirty {
                return Ok(());
            }
            table.records.clone()
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write-temp-then-rename so readers never see a partial table
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&records)?)?;
        fs::rename(&tmp, &self.path)?;

        let mut table = self.table.write().map_err(|e| LoopgateError::Storage(e.to_string()))?;
        table.dirty = false;
        Ok(())
    }
}
