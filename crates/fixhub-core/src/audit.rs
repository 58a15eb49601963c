//! Audit trail for automated repository actions

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One automated action performed on behalf of an actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: String,
    pub target: String,
    pub metadata: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            target: target.into(),
            metadata: BTreeMap::new(),
            recorded_at,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Destination for audit entries
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Emits audit entries as structured log events
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            actor = %entry.actor,
            action = %entry.action,
            target = %entry.target,
            metadata = ?entry.metadata,
            "audit"
        );
    }
}

/// Keeps audit entries in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        let now = Utc::now();
        sink.record(
            AuditEntry::new("alice", "create_fix_pr", "acme/widgets", now)
                .with_metadata("branch", "fixhub/fix-1")
                .with_metadata("title", "Fix"),
        );
        sink.record(AuditEntry::new("bob", "create_fix_pr", "acme/gears", now));

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].actor, "alice");
        assert_eq!(entries[0].metadata["branch"], "fixhub/fix-1");
        assert_eq!(entries[1].target, "acme/gears");
    }
}
