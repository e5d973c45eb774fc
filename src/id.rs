//! ID generation utilities for Loopgate
//!
//! Provides functions for generating unique identifiers for executions,
//! skill runs, and acknowledgment records.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Generate a unique execution ID
///
/// Format: `exec-{timestamp_ms}-{random_hex}`
/// Example: `exec-1738300800123-a1b2`
pub fn generate_execution_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("exec-{}-{:04x}", timestamp, random)
}

/// Generate a skill-execution record ID
///
/// Format: `run-{skill_id}-{timestamp_ms}-{random_hex}`
pub fn generate_skill_run_id(skill_id: &str) -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("run-{}-{}-{:04x}", skill_id, timestamp, random)
}
