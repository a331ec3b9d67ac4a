//! In-memory record client for testing.
//!
//! Behaves like a small Table API: records get generated sys_ids, reads of
//! missing records fail with HTTP 404, and list queries understand
//! `field=value` conditions joined by `^`. Every call is recorded.

use crate::traits::{ConnectorError, ConnectorResult, Query, Record, RecordClient};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A call observed by [`MockRecordClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCall {
    pub operation: &'static str,
    pub table: String,
}

/// Mock record client for testing.
#[derive(Default)]
pub struct MockRecordClient {
    tables: Arc<RwLock<HashMap<String, Vec<Record>>>>,
    next_id: Arc<RwLock<u32>>,
    calls: Arc<RwLock<Vec<RecordCall>>>,
}

impl MockRecordClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `table` with records in the given order. Records lacking a
    /// `sys_id` get one assigned.
    pub async fn seed(&self, table: &str, records: Vec<Value>) {
        for value in records {
            if let Value::Object(mut record) = value {
                if !record.contains_key("sys_id") {
                    let id = self.allocate_id().await;
                    record.insert("sys_id".to_string(), Value::String(id));
                }
                self.tables
                    .write()
                    .await
                    .entry(table.to_string())
                    .or_default()
                    .push(record);
            }
        }
    }

    /// Returns all calls made so far.
    pub async fn calls(&self) -> Vec<RecordCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Returns the stored records of a table, in insertion order.
    pub async fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    async fn record_call(&self, operation: &'static str, table: &str) {
        self.calls.write().await.push(RecordCall {
            operation,
            table: table.to_string(),
        });
    }

    async fn allocate_id(&self) -> String {
        let mut next_id = self.next_id.write().await;
        *next_id += 1;
        format!("mock{:06}", *next_id)
    }

    fn not_found(sys_id: &str) -> ConnectorError {
        ConnectorError::Http {
            status: 404,
            body: format!(
                r#"{{"error":{{"message":"No Record found","detail":"Record {} does not exist"}},"status":"failure"}}"#,
                sys_id
            ),
        }
    }

    fn has_id(record: &Record, sys_id: &str) -> bool {
        record.get("sys_id").and_then(Value::as_str) == Some(sys_id)
    }

    /// Matches the `field=value^field=value` subset of encoded queries.
    fn matches(record: &Record, filter: &str) -> bool {
        filter
            .split('^')
            .filter(|c| !c.trim().is_empty())
            .all(|condition| match condition.split_once('=') {
                Some((field, expected)) => {
                    field_text(record.get(field.trim())).as_deref() == Some(expected)
                }
                None => false,
            })
    }
}

/// Plain text of a field, unwrapping `{"value": ..}` reference objects.
fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("value").and_then(Value::as_str).map(String::from),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl RecordClient for MockRecordClient {
    async fn create(&self, table: &str, data: &Record) -> ConnectorResult<Value> {
        self.record_call("create", table).await;
        let mut record = data.clone();
        let id = self.allocate_id().await;
        record.insert("sys_id".to_string(), Value::String(id));
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(serde_json::json!({ "result": record }))
    }

    async fn read(&self, table: &str, sys_id: &str) -> ConnectorResult<Value> {
        self.record_call("read", table).await;
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.iter().find(|r| Self::has_id(r, sys_id)))
            .map(|r| serde_json::json!({ "result": r }))
            .ok_or_else(|| Self::not_found(sys_id))
    }

    async fn update(&self, table: &str, sys_id: &str, data: &Record) -> ConnectorResult<Value> {
        self.record_call("update", table).await;
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| Self::has_id(r, sys_id)))
            .ok_or_else(|| Self::not_found(sys_id))?;

        for (key, value) in data {
            if key != "sys_id" {
                record.insert(key.clone(), value.clone());
            }
        }
        Ok(serde_json::json!({ "result": record }))
    }

    async fn delete(&self, table: &str, sys_id: &str) -> ConnectorResult<Value> {
        self.record_call("delete", table).await;
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| Self::not_found(sys_id))?;
        let index = rows
            .iter()
            .position(|r| Self::has_id(r, sys_id))
            .ok_or_else(|| Self::not_found(sys_id))?;
        rows.remove(index);
        Ok(Value::Null)
    }

    async fn query(&self, table: &str, query: &Query) -> ConnectorResult<Value> {
        self.record_call("query", table).await;
        let tables = self.tables.read().await;
        let result: Vec<&Record> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| Self::matches(r, &query.filter))
                    .skip(query.offset as usize)
                    .take(query.limit as usize)
                    .collect()
            })
            .unwrap_or_default();
        Ok(serde_json::json!({ "result": result }))
    }
}
