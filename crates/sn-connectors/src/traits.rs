//! Core traits and types for the ServiceNow connectors.

use crate::secure_string::SecureString;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Default page size for list queries.
pub const DEFAULT_QUERY_LIMIT: u32 = 100;

/// Errors that can occur during connector operations.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Any non-success response from the record API.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl ConnectorError {
    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConnectorError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the remote reported the record as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    /// Connector is healthy and operational.
    Healthy,
    /// Connector is degraded but still functional.
    Degraded(String),
    /// Connector is unhealthy and not operational.
    Unhealthy(String),
}

/// Configuration for a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name/identifier.
    pub name: String,
    /// Instance URL, e.g. `https://acme.service-now.com`.
    pub base_url: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Authentication configuration.
///
/// Exactly one mode is active for the lifetime of a client. Credential fields
/// use `SecureString` so they are zeroized when dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// HTTP basic authentication with static credentials.
    Basic {
        username: String,
        password: SecureString,
    },
    /// Bearer token obtained through an OAuth2 client-credentials exchange.
    #[serde(rename = "oauth")]
    OAuth2 {
        client_id: String,
        client_secret: SecureString,
        token_url: String,
        #[serde(default)]
        scopes: Vec<String>,
    },
}

impl AuthConfig {
    /// Short name of the authentication mode, for logs.
    pub fn mode(&self) -> &'static str {
        match self {
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::OAuth2 { .. } => "oauth",
        }
    }
}

/// A list query against a table.
///
/// The filter is an encoded query in the remote grammar and is passed through
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filter: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    DEFAULT_QUERY_LIMIT
}

impl Query {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }

    /// An unfiltered query returning at most `limit` records.
    pub fn all(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for Query {
    fn default() -> Self {
        Self {
            filter: String::new(),
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
        }
    }
}

/// A record's attribute mapping as sent to and received from the remote.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Performs a health check.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;

    /// Tests the connection.
    async fn test_connection(&self) -> ConnectorResult<bool>;
}

/// Generic, table-agnostic record operations.
///
/// Every method returns the parsed response body unchanged, normally of the
/// shape `{"result": <record-or-list>}`.
#[async_trait]
pub trait RecordClient: Send + Sync {
    /// Creates a record in `table`.
    async fn create(&self, table: &str, data: &Record) -> ConnectorResult<serde_json::Value>;

    /// Reads one record by sys_id.
    async fn read(&self, table: &str, sys_id: &str) -> ConnectorResult<serde_json::Value>;

    /// Replaces fields of one record.
    async fn update(
        &self,
        table: &str,
        sys_id: &str,
        data: &Record,
    ) -> ConnectorResult<serde_json::Value>;

    /// Deletes one record.
    async fn delete(&self, table: &str, sys_id: &str) -> ConnectorResult<serde_json::Value>;

    /// Lists records matching a query.
    async fn query(&self, table: &str, query: &Query) -> ConnectorResult<serde_json::Value>;
}
