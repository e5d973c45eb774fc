//! Durable execution snapshots.
//!
//! Each execution is persisted as one whole JSON document at
//! `{data_root}/{execution_id}/state.json`, rewritten in full after every
//! mutation. Writes go through a temp file plus rename so a crash mid-write
//! never leaves a truncated snapshot behind.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::execution::LoopExecution;
use crate::error::{LoopgateError, Result};

/// Path of the snapshot file for one execution.
pub fn snapshot_path(data_root: &Path, execution_id: &str) -> PathBuf {
    data_root.join(execution_id).join("state.json")
}

/// Persist the full execution state, replacing any previous snapshot.
pub fn save(data_root: &Path, execution: &LoopExecution) -> Result<()> {
    let path = snapshot_path(data_root, &execution.id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(execution)?)?;
    fs::rename(&tmp, &path)?;

    tracing::debug!(execution_id = %execution.id, path = %path.display(), "Execution snapshot saved");
    Ok(())
}

/// Load a previously saved execution snapshot.
pub fn load(data_root: &Path, execution_id: &str) -> Result<LoopExecution> {
    let path = snapshot_path(data_root, execution_id);
    if !path.exists() {
        return Err(LoopgateError::ExecutionNotFound(execution_id.to_string()));
    }
    let content = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}
