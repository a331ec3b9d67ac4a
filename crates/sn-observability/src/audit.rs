//! Audit trail for CMDB changes.
//!
//! Every mutating configuration-item operation appends an [`AuditEntry`]. The
//! log emits each entry as a structured `tracing` event (target
//! `sn_cmdb::audit`) and keeps the most recent entries in a bounded in-memory
//! buffer. Writing never fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Field names whose values are masked before an entry is stored.
const SENSITIVE_KEYS: &[&str] = &["password", "secret", "token", "api_key", "credential"];

/// Auditable CMDB actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    AddRelationship,
    Enrich,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::AddRelationship => "add_relationship",
            AuditAction::Enrich => "enrich",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    /// Snapshot of the affected record as returned by the remote.
    pub record: serde_json::Value,
}

impl AuditEntry {
    pub fn new(action: AuditAction, record: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            record: mask_sensitive_fields(record),
        }
    }
}

/// Replaces values of credential-like keys with `"***"`, recursively.
pub fn mask_sensitive_fields(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(key, v)| {
                    let lowered = key.to_lowercase();
                    if SENSITIVE_KEYS.iter().any(|s| lowered.contains(s)) {
                        (key, serde_json::Value::String("***".to_string()))
                    } else {
                        (key, mask_sensitive_fields(v))
                    }
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(mask_sensitive_fields).collect())
        }
        other => other,
    }
}

/// Append-only audit log.
#[derive(Clone)]
pub struct AuditLog {
    entries: Arc<RwLock<VecDeque<AuditEntry>>>,
    max_entries: usize,
    log_to_tracing: bool,
}

impl AuditLog {
    /// Creates an audit log keeping at most `max_entries` in memory.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_entries.min(1024)))),
            max_entries,
            log_to_tracing: true,
        }
    }

    /// Creates an audit log without tracing output.
    pub fn without_tracing(max_entries: usize) -> Self {
        Self {
            log_to_tracing: false,
            ..Self::new(max_entries)
        }
    }

    /// Appends an entry.
    pub async fn log(&self, entry: AuditEntry) {
        if self.log_to_tracing {
            let snapshot = entry.record.to_string();
            info!(
                target: "sn_cmdb::audit",
                audit_id = %entry.id,
                action = %entry.action,
                record = %snapshot,
                "CMDB {} audit",
                entry.action
            );
        }

        if self.max_entries == 0 {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Builds and appends an entry for `action`.
    pub async fn record(&self, action: AuditAction, record: serde_json::Value) {
        self.log(AuditEntry::new(action, record)).await;
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn entries_for(&self, action: AuditAction) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}
