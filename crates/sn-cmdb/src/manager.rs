//! Configuration-item manager.
//!
//! Each operation validates its input, delegates to the record client,
//! optionally post-processes the response, and appends an audit entry for
//! mutations. Remote errors are never recovered locally.

use crate::dedup::find_duplicates;
use crate::enrichment::merge_enrichment;
use crate::error::{CmdbError, CmdbResult};
use crate::models::{
    first_record, result_records, ConfigurationItem, Relationship, CI_TABLE, RELATIONSHIP_TABLE,
};
use crate::validation::validate_ci;
use serde_json::Value;
use sn_connectors::{Query, Record, RecordClient, DEFAULT_QUERY_LIMIT};
use sn_observability::{AuditAction, AuditLog};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default number of records scanned by [`CiManager::deduplicate`].
pub const DEFAULT_DEDUP_SCAN_LIMIT: u32 = 1000;

/// Configuration-item operations on top of a [`RecordClient`].
#[derive(Clone)]
pub struct CiManager {
    client: Arc<dyn RecordClient>,
    audit: AuditLog,
    dedup_scan_limit: u32,
    relationship_page_size: u32,
}

impl CiManager {
    pub fn new(client: Arc<dyn RecordClient>, audit: AuditLog) -> Self {
        Self {
            client,
            audit,
            dedup_scan_limit: DEFAULT_DEDUP_SCAN_LIMIT,
            relationship_page_size: DEFAULT_QUERY_LIMIT,
        }
    }

    /// Sets how many records a deduplication scan reads. Records beyond the
    /// limit are not examined.
    pub fn with_dedup_scan_limit(mut self, limit: u32) -> Self {
        self.dedup_scan_limit = limit;
        self
    }

    pub fn dedup_scan_limit(&self) -> u32 {
        self.dedup_scan_limit
    }

    /// Sets how many edges [`get_relationships`](Self::get_relationships)
    /// requests per page. Zero is treated as one.
    pub fn with_relationship_page_size(mut self, page_size: u32) -> Self {
        self.relationship_page_size = page_size.max(1);
        self
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// True iff `data` carries non-empty string `name` and `ci_type`.
    pub fn validate(data: &Record) -> bool {
        validate_ci(data)
    }

    fn checked(data: &Record) -> CmdbResult<ConfigurationItem> {
        ConfigurationItem::from_record(data.clone()).map_err(|e| {
            warn!(error = %e, "Rejected CI payload");
            e
        })
    }

    /// Creates a CI after validation.
    #[instrument(skip(self, data))]
    pub async fn create(&self, data: &Record) -> CmdbResult<Value> {
        let ci = Self::checked(data)?;
        let result = self.client.create(CI_TABLE, &ci.to_record()).await?;
        self.log_audit(AuditAction::Create, &result).await;
        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn read(&self, sys_id: &str) -> CmdbResult<Value> {
        Ok(self.client.read(CI_TABLE, sys_id).await?)
    }

    /// Updates a CI after validation.
    #[instrument(skip(self, data))]
    pub async fn update(&self, sys_id: &str, data: &Record) -> CmdbResult<Value> {
        let ci = Self::checked(data)?;
        let result = self.client.update(CI_TABLE, sys_id, &ci.to_record()).await?;
        self.log_audit(AuditAction::Update, &result).await;
        Ok(result)
    }

    /// Deletes a CI. The audit entry carries only the sys_id.
    #[instrument(skip(self))]
    pub async fn delete(&self, sys_id: &str) -> CmdbResult<Value> {
        let result = self.client.delete(CI_TABLE, sys_id).await?;
        self.log_audit(AuditAction::Delete, &serde_json::json!({ "sys_id": sys_id }))
            .await;
        Ok(result)
    }

    /// Runs an encoded query against the CI table.
    #[instrument(skip(self))]
    pub async fn query(&self, filter: &str, limit: u32, offset: u32) -> CmdbResult<Value> {
        let query = Query::new(filter).with_limit(limit).with_offset(offset);
        Ok(self.client.query(CI_TABLE, &query).await?)
    }

    /// Lists CIs sharing `(name, ci_type)` with an earlier CI.
    ///
    /// Scans at most [`dedup_scan_limit`](Self::dedup_scan_limit) records in
    /// the order the remote returns them. Nothing is modified.
    #[instrument(skip(self), fields(scan_limit = self.dedup_scan_limit))]
    pub async fn deduplicate(&self) -> CmdbResult<Vec<Record>> {
        let body = self
            .client
            .query(CI_TABLE, &Query::all(self.dedup_scan_limit))
            .await?;
        let records = result_records(&body)?;
        let scanned = records.len();

        if scanned as u64 >= u64::from(self.dedup_scan_limit) {
            warn!(
                scanned,
                "Deduplication scan hit its limit; later records were not examined"
            );
        }

        let duplicates = find_duplicates(records);
        info!(scanned, duplicates = duplicates.len(), "Deduplication scan complete");
        Ok(duplicates)
    }

    /// Records a directed edge from `parent` to `child`.
    #[instrument(skip(self))]
    pub async fn add_relationship(
        &self,
        parent: &str,
        child: &str,
        relationship_type: &str,
    ) -> CmdbResult<Value> {
        let relationship = Relationship::new(parent, child, relationship_type);
        let result = self
            .client
            .create(RELATIONSHIP_TABLE, &relationship.to_record())
            .await?;
        self.log_audit(AuditAction::AddRelationship, &result).await;
        Ok(result)
    }

    /// Returns every edge whose parent is `parent`. No match is an empty list.
    ///
    /// Pages through the relationship table until the remote returns a short
    /// page. `parent` is placed into an encoded query, so ids containing the
    /// `^` condition separator are rejected.
    #[instrument(skip(self))]
    pub async fn get_relationships(&self, parent: &str) -> CmdbResult<Vec<Relationship>> {
        if parent.contains('^') {
            return Err(CmdbError::Validation(format!(
                "parent id must not contain '^': {}",
                parent
            )));
        }

        let page_size = self.relationship_page_size;
        let mut relationships = Vec::new();
        let mut offset = 0;
        loop {
            let query = Query::new(format!("parent={}", parent))
                .with_limit(page_size)
                .with_offset(offset);
            let body = self.client.query(RELATIONSHIP_TABLE, &query).await?;
            let records = result_records(&body)?;
            let fetched = records.len();

            for record in records {
                let relationship = serde_json::from_value(Value::Object(record))
                    .map_err(|e| CmdbError::InvalidRecord(format!("relationship: {}", e)))?;
                relationships.push(relationship);
            }

            if (fetched as u64) < u64::from(page_size) {
                break;
            }
            match offset.checked_add(page_size) {
                Some(next) => offset = next,
                None => break,
            }
        }

        debug!(count = relationships.len(), "Loaded relationships");
        Ok(relationships)
    }

    /// Merges `enrichment` into the current CI and writes the result back.
    ///
    /// Read and write are separate calls; a concurrent change made between
    /// them is overwritten.
    #[instrument(skip(self, enrichment))]
    pub async fn enrich(&self, sys_id: &str, enrichment: &Record) -> CmdbResult<Value> {
        let current = first_record(&self.read(sys_id).await?)?;
        debug!(fields = current.len(), "Loaded CI for enrichment");

        let merged = merge_enrichment(current, enrichment);
        let result = self.update(sys_id, &merged).await?;
        self.log_audit(AuditAction::Enrich, &result).await;
        Ok(result)
    }

    /// Appends an audit entry. Never fails.
    pub async fn log_audit(&self, action: AuditAction, data: &Value) {
        self.audit.record(action, data.clone()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_RELATIONSHIP_TYPE;
    use sn_connectors::{MockRecordClient, RecordCall};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn manager() -> (CiManager, Arc<MockRecordClient>) {
        let client = Arc::new(MockRecordClient::new());
        let manager = CiManager::new(client.clone(), AuditLog::without_tracing(100));
        (manager, client)
    }

    fn sys_id(body: &Value) -> String {
        body["result"]["sys_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_valid_ci() {
        let (manager, client) = manager();
        let result = manager
            .create(&record(serde_json::json!({"name": "web01", "ci_type": "server"})))
            .await
            .unwrap();
        assert_eq!(result["result"]["name"], "web01");
        assert_eq!(
            client.calls().await,
            vec![RecordCall {
                operation: "create",
                table: "cmdb_ci".to_string()
            }]
        );

        let audit = manager.audit_log().entries().await;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AuditAction::Create);
        assert_eq!(audit[0].record, result);
    }

    #[tokio::test]
    async fn test_invalid_payloads_make_no_calls() {
        let (manager, client) = manager();
        let payloads = [
            serde_json::json!({}),
            serde_json::json!({"name": "web01"}),
            serde_json::json!({"ci_type": "server"}),
            serde_json::json!({"name": "", "ci_type": "server"}),
            serde_json::json!({"name": "web01", "ci_type": ["server"]}),
        ];

        for payload in payloads {
            let data = record(payload);
            assert!(!CiManager::validate(&data));
            assert!(manager.create(&data).await.unwrap_err().is_validation());
            assert!(manager.update("abc", &data).await.unwrap_err().is_validation());
        }

        assert_eq!(client.call_count().await, 0);
        assert!(manager.audit_log().is_empty().await);
    }

    #[tokio::test]
    async fn test_read_update_delete() {
        let (manager, client) = manager();
        let created = manager
            .create(&record(serde_json::json!({"name": "web01", "ci_type": "server"})))
            .await
            .unwrap();
        let id = sys_id(&created);

        let read = manager.read(&id).await.unwrap();
        assert_eq!(read, created);

        let updated = manager
            .update(
                &id,
                &record(serde_json::json!({"name": "web01", "ci_type": "server", "env": "prod"})),
            )
            .await
            .unwrap();
        assert_eq!(updated["result"]["env"], "prod");

        manager.delete(&id).await.unwrap();
        assert!(client.records("cmdb_ci").await.is_empty());

        let err = manager.read(&id).await.unwrap_err();
        assert_eq!(err.status(), Some(404));

        let deletes = manager.audit_log().entries_for(AuditAction::Delete).await;
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].record, serde_json::json!({ "sys_id": id }));
    }

    #[tokio::test]
    async fn test_failed_delete_writes_no_audit() {
        let (manager, _client) = manager();
        assert!(manager.delete("missing").await.is_err());
        assert!(manager.audit_log().is_empty().await);
    }

    #[tokio::test]
    async fn test_query_passthrough() {
        let (manager, client) = manager();
        client
            .seed(
                "cmdb_ci",
                vec![
                    serde_json::json!({"name": "a", "ci_type": "server"}),
                    serde_json::json!({"name": "b", "ci_type": "server"}),
                    serde_json::json!({"name": "c", "ci_type": "database"}),
                ],
            )
            .await;

        let result = manager.query("ci_type=server", 100, 0).await.unwrap();
        assert_eq!(result["result"].as_array().unwrap().len(), 2);

        let page = manager.query("", 1, 1).await.unwrap();
        assert_eq!(page["result"][0]["name"], "b");
    }

    #[tokio::test]
    async fn test_deduplicate_reports_later_records() {
        let (manager, client) = manager();
        client
            .seed(
                "cmdb_ci",
                vec![
                    serde_json::json!({"sys_id": "1", "name": "web01", "ci_type": "server"}),
                    serde_json::json!({"sys_id": "2", "name": "web01", "ci_type": "server"}),
                    serde_json::json!({"sys_id": "3", "name": "db01", "ci_type": "database"}),
                    serde_json::json!({"sys_id": "4", "name": "web01", "ci_type": "server"}),
                ],
            )
            .await;

        let duplicates = manager.deduplicate().await.unwrap();
        let ids: Vec<_> = duplicates.iter().map(|r| r["sys_id"].clone()).collect();
        assert_eq!(ids, vec![serde_json::json!("2"), serde_json::json!("4")]);

        // Advisory only.
        assert_eq!(client.records("cmdb_ci").await.len(), 4);
        assert!(manager.audit_log().is_empty().await);
    }

    #[tokio::test]
    async fn test_deduplicate_respects_scan_limit() {
        let (manager, client) = manager();
        let manager = manager.with_dedup_scan_limit(2);
        client
            .seed(
                "cmdb_ci",
                vec![
                    serde_json::json!({"sys_id": "1", "name": "x", "ci_type": "t"}),
                    serde_json::json!({"sys_id": "2", "name": "y", "ci_type": "t"}),
                    serde_json::json!({"sys_id": "3", "name": "x", "ci_type": "t"}),
                ],
            )
            .await;

        assert!(manager.deduplicate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relationships_are_directed() {
        let (manager, _client) = manager();
        let created = manager
            .add_relationship("A", "B", DEFAULT_RELATIONSHIP_TYPE)
            .await
            .unwrap();
        assert_eq!(created["result"]["parent"], "A");

        let from_a = manager.get_relationships("A").await.unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].parent, "A");
        assert_eq!(from_a[0].child, "B");
        assert_eq!(from_a[0].relationship_type, "Depends on");
        assert!(from_a[0].sys_id.is_some());

        assert!(manager.get_relationships("B").await.unwrap().is_empty());

        let audit = manager
            .audit_log()
            .entries_for(AuditAction::AddRelationship)
            .await;
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn test_relationships_page_past_first_result_set() {
        let (manager, client) = manager();
        let edges: Vec<_> = (0..150)
            .map(|i| serde_json::json!({"parent": "A", "child": format!("C{}", i)}))
            .collect();
        client.seed("cmdb_rel_ci", edges).await;

        let found = manager.get_relationships("A").await.unwrap();
        assert_eq!(found.len(), 150);
        assert_eq!(found[0].child, "C0");
        assert_eq!(found[149].child, "C149");
        assert_eq!(client.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_relationships_stop_on_empty_page() {
        let (manager, client) = manager();
        let manager = manager.with_relationship_page_size(2);
        let edges: Vec<_> = (0..4)
            .map(|i| serde_json::json!({"parent": "A", "child": format!("C{}", i)}))
            .collect();
        client.seed("cmdb_rel_ci", edges).await;

        assert_eq!(manager.get_relationships("A").await.unwrap().len(), 4);
        // Two full pages, then an empty one.
        assert_eq!(client.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_relationship_rows_with_type_reference() {
        let (manager, client) = manager();
        client
            .seed(
                "cmdb_rel_ci",
                vec![serde_json::json!({
                    "parent": "A",
                    "child": "B",
                    "relationship_type": "Depends on",
                    "type": {"link": "https://acme/api/now/table/cmdb_rel_type/1", "value": "1"}
                })],
            )
            .await;

        let found = manager.get_relationships("A").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relationship_type, "Depends on");
    }

    #[tokio::test]
    async fn test_relationship_parent_with_separator_rejected() {
        let (manager, client) = manager();
        let err = manager.get_relationships("A^ORparent=B").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(client.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_enrich_merges_and_preserves() {
        let (manager, _client) = manager();
        let created = manager
            .create(&record(serde_json::json!({
                "name": "web01",
                "ci_type": "server",
                "vendor": "Dell"
            })))
            .await
            .unwrap();
        let id = sys_id(&created);

        let enrichment = record(serde_json::json!({"vendor": "HPE", "warranty": "2027"}));
        manager.enrich(&id, &enrichment).await.unwrap();
        let after_once = manager.read(&id).await.unwrap();
        assert_eq!(after_once["result"]["vendor"], "HPE");
        assert_eq!(after_once["result"]["warranty"], "2027");
        assert_eq!(after_once["result"]["name"], "web01");
        assert_eq!(after_once["result"]["ci_type"], "server");

        manager.enrich(&id, &enrichment).await.unwrap();
        assert_eq!(manager.read(&id).await.unwrap(), after_once);

        // Each enrich audits the inner update and the enrichment itself.
        let log = manager.audit_log();
        assert_eq!(log.entries_for(AuditAction::Enrich).await.len(), 2);
        assert_eq!(log.entries_for(AuditAction::Update).await.len(), 2);
    }

    #[tokio::test]
    async fn test_enrich_missing_ci_propagates_error() {
        let (manager, client) = manager();
        let err = manager
            .enrich("nope", &record(serde_json::json!({"k": "v"})))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(client.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_enrich_cannot_strip_required_fields() {
        let (manager, _client) = manager();
        let created = manager
            .create(&record(serde_json::json!({"name": "web01", "ci_type": "server"})))
            .await
            .unwrap();
        let err = manager
            .enrich(&sys_id(&created), &record(serde_json::json!({"name": null})))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
