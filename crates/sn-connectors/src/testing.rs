//! Helpers for tests that exercise connectors.

use crate::secure_string::SecureString;
use crate::traits::{AuthConfig, ConnectorConfig, ConnectorHealth, ConnectorResult};
use std::collections::HashMap;

/// Creates a basic-auth config (`admin` / `password`) for `base_url`.
pub fn test_basic_config(base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: "snow-test".to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::Basic {
            username: "admin".to_string(),
            password: SecureString::from("password"),
        },
        timeout_secs: 5,
        verify_tls: true,
        headers: HashMap::new(),
    }
}

/// Creates an OAuth2 client-credentials config for `base_url`.
pub fn test_oauth_config(base_url: &str, token_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: "snow-test".to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::OAuth2 {
            client_id: "test-client".to_string(),
            client_secret: SecureString::from("test-secret"),
            token_url: token_url.to_string(),
            scopes: Vec::new(),
        },
        timeout_secs: 5,
        verify_tls: true,
        headers: HashMap::new(),
    }
}

/// Asserts that a connector health check returns healthy.
pub fn assert_healthy(result: &ConnectorResult<ConnectorHealth>) {
    match result {
        Ok(ConnectorHealth::Healthy) => {}
        other => panic!("Expected Healthy, got {:?}", other),
    }
}

/// Asserts that a connector health check returns unhealthy.
pub fn assert_unhealthy(result: &ConnectorResult<ConnectorHealth>) {
    match result {
        Ok(ConnectorHealth::Unhealthy(_)) => {}
        other => panic!("Expected Unhealthy, got {:?}", other),
    }
}
