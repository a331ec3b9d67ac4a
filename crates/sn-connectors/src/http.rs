//! HTTP client shared by the ServiceNow connectors.
//!
//! Wraps `reqwest` with instance-relative URL building, per-request
//! authentication and uniform status handling. Requests are sent exactly once;
//! there is no retry layer.

use crate::credential::OAuthTokenProvider;
use crate::secure_string::SecureString;
use crate::traits::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// How outgoing requests are authenticated. Fixed at construction.
enum Authenticator {
    Basic {
        username: String,
        password: SecureString,
    },
    Bearer(OAuthTokenProvider),
}

/// HTTP client bound to one instance URL and one authentication mode.
pub struct HttpClient {
    client: Client,
    config: ConnectorConfig,
    auth: Authenticator,
}

impl HttpClient {
    /// Creates a new HTTP client from connector configuration.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(ConnectorError::ConfigError(
                "instance URL must not be empty".to_string(),
            ));
        }

        // TLS verification can only be turned off in debug builds.
        let verify_tls = if !config.verify_tls {
            #[cfg(debug_assertions)]
            {
                warn!(
                    base_url = %config.base_url,
                    connector_name = %config.name,
                    "TLS certificate verification DISABLED in development mode"
                );
                false
            }
            #[cfg(not(debug_assertions))]
            {
                warn!(
                    base_url = %config.base_url,
                    connector_name = %config.name,
                    "Ignoring request to disable TLS verification in a release build"
                );
                true
            }
        } else {
            true
        };

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::try_from(key.as_str()),
                reqwest::header::HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, val);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!verify_tls)
            .default_headers(headers)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        let auth = match &config.auth {
            AuthConfig::Basic { username, password } => Authenticator::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                token_url,
                scopes,
            } => Authenticator::Bearer(OAuthTokenProvider::new(
                client.clone(),
                token_url.clone(),
                client_id.clone(),
                client_secret.clone(),
                scopes.clone(),
            )),
        };

        Ok(Self {
            client,
            config,
            auth,
        })
    }

    /// Builds a URL from an instance-relative path.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// GET with query parameters, returning the parsed body.
    pub async fn get_json<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        params: &Q,
    ) -> ConnectorResult<serde_json::Value> {
        let request = self.client.get(self.build_url(path)).query(params);
        let response = self.execute(request).await?;
        Self::parse_json(response).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ConnectorResult<serde_json::Value> {
        let request = self.client.post(self.build_url(path)).json(body);
        let response = self.execute(request).await?;
        Self::parse_json(response).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ConnectorResult<serde_json::Value> {
        let request = self.client.put(self.build_url(path)).json(body);
        let response = self.execute(request).await?;
        Self::parse_json(response).await
    }

    pub async fn delete_json(&self, path: &str) -> ConnectorResult<serde_json::Value> {
        let request = self.client.delete(self.build_url(path));
        let response = self.execute(request).await?;
        Self::parse_json(response).await
    }

    /// Reads the body of a successful response as JSON.
    ///
    /// An empty body (e.g. `204 No Content`) is returned as `null`.
    async fn parse_json(response: Response) -> ConnectorResult<serde_json::Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            ConnectorError::InvalidResponse(format!(
                "Failed to parse response (status {}): {} - Body: {}",
                status,
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Sends a request once with authentication; any non-2xx status becomes
    /// [`ConnectorError::Http`].
    ///
    /// A 401 in bearer mode drops the cached token so the next request
    /// performs a fresh exchange. The failed request itself is not repeated.
    async fn execute(&self, request: RequestBuilder) -> ConnectorResult<Response> {
        let request = self.add_auth(request).await?;

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Timeout(e.to_string())
            } else if e.is_connect() {
                ConnectorError::ConnectionFailed(e.to_string())
            } else {
                ConnectorError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                if let Authenticator::Bearer(provider) = &self.auth {
                    warn!("Bearer token rejected; discarding cached token");
                    provider.invalidate().await;
                }
            }
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Record API returned an error status");
            return Err(ConnectorError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn add_auth(&self, request: RequestBuilder) -> ConnectorResult<RequestBuilder> {
        match &self.auth {
            Authenticator::Basic { username, password } => {
                Ok(request.basic_auth(username, Some(password.expose_secret())))
            }
            Authenticator::Bearer(provider) => {
                let token = provider.get_credential().await?;
                Ok(request.bearer_auth(token.expose_secret()))
            }
        }
    }
}

/// Whether TLS verification may be disabled in this build.
#[inline]
pub fn can_disable_tls_verification() -> bool {
    cfg!(debug_assertions)
}
