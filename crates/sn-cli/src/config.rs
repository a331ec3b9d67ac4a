//! Configuration loading for the snow-cmdb CLI.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sn_cmdb::DEFAULT_DEDUP_SCAN_LIMIT;
use sn_connectors::{AuthConfig, ConnectorConfig, SecureString};
use std::collections::HashMap;
use std::path::Path;

const REDACTED: &str = "***REDACTED***";

/// Path of the OAuth token endpoint relative to the instance URL.
const DEFAULT_OAUTH_PATH: &str = "/oauth_token.do";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// ServiceNow instance URL, e.g. `https://acme.service-now.com`.
    #[serde(default)]
    pub instance_url: String,

    /// Authentication method (basic, oauth).
    #[serde(default = "default_auth_method")]
    pub auth_method: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Token endpoint; defaults to `<instance_url>/oauth_token.do`.
    #[serde(default)]
    pub oauth_url: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// OAuth scopes requested with the token.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Whether to verify TLS certificates.
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Records scanned by `dedupe`.
    #[serde(default = "default_dedup_scan_limit")]
    pub dedup_scan_limit: u32,

    /// Audit entries kept in memory for the lifetime of a command.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_auth_method() -> String {
    "basic".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_dedup_scan_limit() -> u32 {
    DEFAULT_DEDUP_SCAN_LIMIT
}

fn default_audit_capacity() -> usize {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instance_url: String::new(),
            auth_method: default_auth_method(),
            username: String::new(),
            password: String::new(),
            oauth_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scopes: Vec::new(),
            timeout_secs: default_timeout(),
            verify_tls: true,
            headers: HashMap::new(),
            dedup_scan_limit: default_dedup_scan_limit(),
            audit_capacity: default_audit_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Applies `SN_*` environment variables on top of the loaded values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Empty values are ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("SN_INSTANCE_URL") {
            self.instance_url = v;
        }
        if let Some(v) = get("SN_AUTH_METHOD") {
            self.auth_method = v.to_lowercase();
        }
        if let Some(v) = get("SN_USERNAME") {
            self.username = v;
        }
        if let Some(v) = get("SN_PASSWORD") {
            self.password = v;
        }
        if let Some(v) = get("SN_OAUTH_URL") {
            self.oauth_url = v;
        }
        if let Some(v) = get("SN_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = get("SN_CLIENT_SECRET") {
            self.client_secret = v;
        }
        self
    }

    /// Checks that the instance and the selected credentials are present.
    pub fn validate(&self) -> Result<()> {
        if self.instance_url.trim().is_empty() {
            bail!("instance_url is not set (config file or SN_INSTANCE_URL)");
        }
        if !self.instance_url.starts_with("http://") && !self.instance_url.starts_with("https://")
        {
            bail!("instance_url must start with http:// or https://");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }

        match self.auth_method.as_str() {
            "basic" => {
                if self.username.is_empty() || self.password.is_empty() {
                    bail!("basic authentication requires username and password");
                }
            }
            "oauth" => {
                if self.client_id.is_empty() || self.client_secret.is_empty() {
                    bail!("oauth authentication requires client_id and client_secret");
                }
            }
            other => bail!("unknown auth_method '{}' (expected basic or oauth)", other),
        }
        Ok(())
    }

    /// Token endpoint for OAuth mode.
    pub fn token_url(&self) -> String {
        if self.oauth_url.is_empty() {
            format!(
                "{}{}",
                self.instance_url.trim_end_matches('/'),
                DEFAULT_OAUTH_PATH
            )
        } else {
            self.oauth_url.clone()
        }
    }

    /// Validates and converts into a connector configuration.
    pub fn to_connector_config(&self) -> Result<ConnectorConfig> {
        self.validate()?;

        let auth = match self.auth_method.as_str() {
            "oauth" => AuthConfig::OAuth2 {
                client_id: self.client_id.clone(),
                client_secret: SecureString::new(self.client_secret.clone()),
                token_url: self.token_url(),
                scopes: self.scopes.clone(),
            },
            _ => AuthConfig::Basic {
                username: self.username.clone(),
                password: SecureString::new(self.password.clone()),
            },
        };

        Ok(ConnectorConfig {
            name: "servicenow".to_string(),
            base_url: self.instance_url.trim_end_matches('/').to_string(),
            auth,
            timeout_secs: self.timeout_secs,
            verify_tls: self.verify_tls,
            headers: self.headers.clone(),
        })
    }

    /// Creates a copy with secrets redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        if !config.password.is_empty() {
            config.password = REDACTED.to_string();
        }
        if !config.client_secret.is_empty() {
            config.client_secret = REDACTED.to_string();
        }
        config
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format.
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}
