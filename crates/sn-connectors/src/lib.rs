//! # sn-connectors
//!
//! Authenticated access to the ServiceNow Table API.
//!
//! [`TableApiClient`] performs table-agnostic create/read/update/delete/query
//! calls. Depending on configuration it authenticates with static basic
//! credentials or with a bearer token from [`OAuthTokenProvider`], which
//! caches the token and refreshes it before expiry.

pub mod credential;
pub mod http;
pub mod secure_string;
pub mod servicenow;
pub mod testing;
pub mod traits;

pub use credential::{Credential, OAuthTokenProvider, TOKEN_EXPIRY_BUFFER};
pub use http::HttpClient;
pub use secure_string::SecureString;
pub use servicenow::{MockRecordClient, RecordCall, TableApiClient};
pub use traits::{
    AuthConfig, Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    Query, Record, RecordClient, DEFAULT_QUERY_LIMIT,
};
