//! ServiceNow Table API record client.
//!
//! Implements [`RecordClient`] against `/api/now/table/{table}` for any table,
//! and [`Connector`] health probing against `sys_user`.

use crate::http::HttpClient;
use crate::traits::{
    Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult, Query, Record,
    RecordClient,
};
use async_trait::async_trait;
use tracing::{info, instrument};

const TABLE_API_PREFIX: &str = "/api/now/table";

/// Table API client.
pub struct TableApiClient {
    client: HttpClient,
}

impl TableApiClient {
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        let mode = config.auth.mode();
        let client = HttpClient::new(config)?;
        info!(
            instance = %client.base_url(),
            auth_mode = mode,
            "ServiceNow table client initialized"
        );
        Ok(Self { client })
    }

    /// Returns the underlying HTTP client.
    pub fn http(&self) -> &HttpClient {
        &self.client
    }

    fn table_path(table: &str) -> ConnectorResult<String> {
        if table.trim().is_empty() {
            return Err(ConnectorError::RequestFailed(
                "table name must not be empty".to_string(),
            ));
        }
        Ok(format!("{}/{}", TABLE_API_PREFIX, urlencoding::encode(table)))
    }

    fn record_path(table: &str, sys_id: &str) -> ConnectorResult<String> {
        if sys_id.trim().is_empty() {
            return Err(ConnectorError::RequestFailed(
                "sys_id must not be empty".to_string(),
            ));
        }
        Ok(format!(
            "{}/{}",
            Self::table_path(table)?,
            urlencoding::encode(sys_id)
        ))
    }

    /// Query-string parameters for a list query.
    fn query_params(query: &Query) -> [(&'static str, String); 3] {
        [
            ("sysparm_query", query.filter.clone()),
            ("sysparm_limit", query.limit.to_string()),
            ("sysparm_offset", query.offset.to_string()),
        ]
    }
}

#[async_trait]
impl RecordClient for TableApiClient {
    #[instrument(skip(self, data))]
    async fn create(&self, table: &str, data: &Record) -> ConnectorResult<serde_json::Value> {
        let path = Self::table_path(table)?;
        self.client.post_json(&path, data).await
    }

    #[instrument(skip(self))]
    async fn read(&self, table: &str, sys_id: &str) -> ConnectorResult<serde_json::Value> {
        let path = Self::record_path(table, sys_id)?;
        let no_params: [(&str, &str); 0] = [];
        self.client.get_json(&path, &no_params).await
    }

    #[instrument(skip(self, data))]
    async fn update(
        &self,
        table: &str,
        sys_id: &str,
        data: &Record,
    ) -> ConnectorResult<serde_json::Value> {
        let path = Self::record_path(table, sys_id)?;
        self.client.put_json(&path, data).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, table: &str, sys_id: &str) -> ConnectorResult<serde_json::Value> {
        let path = Self::record_path(table, sys_id)?;
        self.client.delete_json(&path).await
    }

    #[instrument(skip(self))]
    async fn query(&self, table: &str, query: &Query) -> ConnectorResult<serde_json::Value> {
        let path = Self::table_path(table)?;
        self.client.get_json(&path, &Self::query_params(query)).await
    }
}

#[async_trait]
impl Connector for TableApiClient {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match self.query("sys_user", &Query::all(1)).await {
            Ok(_) => Ok(ConnectorHealth::Healthy),
            Err(ConnectorError::Http { status: 401, .. }) => {
                Ok(ConnectorHealth::Unhealthy("Auth failed".into()))
            }
            Err(ConnectorError::AuthenticationFailed(e)) => Ok(ConnectorHealth::Unhealthy(
                format!("Token exchange failed: {}", e),
            )),
            Err(ConnectorError::Http { status, .. }) => Ok(ConnectorHealth::Degraded(format!(
                "Unexpected response: HTTP {}",
                status
            ))),
            Err(ConnectorError::ConnectionFailed(e)) => Ok(ConnectorHealth::Unhealthy(format!(
                "Connection failed: {}",
                e
            ))),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        self.query("sys_user", &Query::all(1)).await.map(|_| true)
    }
}
