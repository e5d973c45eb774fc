//! Structured log entries on an execution.
//!
//! Logs are an append-only sequence owned by the execution aggregate.
//! Filtering is a pure read-side query; the core never prunes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One structured log entry attached to an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    /// Coarse grouping, e.g. "lifecycle", "skill", "gate", "guarantee"
    pub category: String,
    pub message: String,
    pub phase: Option<String>,
    pub skill_id: Option<String>,
    pub gate_id: Option<String>,
    /// Arbitrary detail payload
    #[serde(default)]
    pub detail: Value,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, category: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            category: category.to_string(),
            message: message.into(),
            phase: None,
            skill_id: None,
            gate_id: None,
            detail: Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn info(category: &str, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, category, message)
    }

    pub fn warn(category: &str, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, category, message)
    }

    pub fn error(category: &str, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, category, message)
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    pub fn with_skill(mut self, skill_id: impl Into<String>) -> Self {
        self.skill_id = Some(skill_id.into());
        self
    }

    pub fn with_gate(mut self, gate_id: impl Into<String>) -> Self {
        self.gate_id = Some(gate_id.into());
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Read-side filter over an execution's log sequence.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Minimum level (inclusive)
    pub level: Option<LogLevel>,
    pub category: Option<String>,
    /// Only entries at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent N matches
    pub limit: Option<usize>,
}

impl LogFilter {
    /// Apply the filter to a log sequence without mutating it.
    pub fn apply<'a>(&self, logs: &'a [LogEntry]) -> Vec<&'a LogEntry> {
        let mut matched: Vec<&LogEntry> = logs
            .iter()
            .filter(|e| self.level.is_none_or(|min| e.level >= min))
            .filter(|e| self.category.as_deref().is_none_or(|c| e.category == c))
            .filter(|e| self.since.is_none_or(|s| e.timestamp >= s))
            .collect();

        if let Some(limit) = self.limit
            && matched.len() > limit
        {
            matched = matched.split_off(matched.len() - limit);
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_logs() -> Vec<LogEntry> {
        vec![
            LogEntry::new(LogLevel::Debug, "lifecycle", "started"),
            LogEntry::info("skill", "skill-1 completed").with_skill("skill-1"),
            LogEntry::warn("guarantee", "optional guarantee failed"),
            LogEntry::error("gate", "gate g1 blocked").with_gate("g1"),
        ]
    }

    #[test]
    fn test_log_entry_builders() {
        let entry = LogEntry::info("skill", "done")
            .with_phase("design")
            .with_skill("skill-1")
            .with_detail(serde_json::json!({ "score": 0.9 }));

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.phase.as_deref(), Some("design"));
        assert_eq!(entry.skill_id.as_deref(), Some("skill-1"));
        assert_eq!(entry.detail["score"], 0.9);
    }

    #[test]
    fn test_filter_by_level() {
        let logs = sample_logs();
        let filter = LogFilter {
            level: Some(LogLevel::Warn),
            ..Default::default()
        };

        let matched = filter.apply(&logs);
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|e| e.level >= LogLevel::Warn));
    }

    #[test]
    fn test_filter_by_category() {
        let logs = sample_logs();
        let filter = LogFilter {
            category: Some("skill".to_string()),
            ..Default::default()
        };

        let matched = filter.apply(&logs);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].skill_id.as_deref(), Some("skill-1"));
    }

    #[test]
    fn test_filter_limit_keeps_most_recent() {
        let logs = sample_logs();
        let filter = LogFilter {
            limit: Some(2),
            ..Default::default()
        };

        let matched = filter.apply(&logs);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[1].category, "gate");
    }

    #[test]
    fn test_filter_since() {
        let mut logs = sample_logs();
        let cutoff = Utc::now();
        logs.push(LogEntry::info("lifecycle", "late entry"));

        let filter = LogFilter {
            since: Some(cutoff),
            ..Default::default()
        };

        let matched = filter.apply(&logs);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].message, "late entry");
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let logs = sample_logs();
        assert_eq!(LogFilter::default().apply(&logs).len(), logs.len());
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Debug);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let entry = LogEntry::error("gate", "blocked").with_gate("g1");
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.level, LogLevel::Error);
        assert_eq!(parsed.gate_id.as_deref(), Some("g1"));
    }
}
