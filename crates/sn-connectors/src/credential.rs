//! OAuth2 client-credentials provider with a single-flight token cache.
//!
//! The provider owns the only piece of mutable state in the client stack: the
//! current access token and the instant it stops being usable. The cache is
//! guarded by an async mutex that is held across the validity check *and* the
//! exchange, so concurrent callers hitting an expired token wait for one
//! refresh instead of each issuing their own.

use crate::secure_string::SecureString;
use crate::traits::{ConnectorError, ConnectorResult};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Safety margin subtracted from the advertised token lifetime.
pub const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// A bearer credential and the instant it stops being handed out.
#[derive(Clone)]
pub struct Credential {
    token: SecureString,
    expires_at: Instant,
}

impl Credential {
    /// Builds a credential from an exchange response received at `now`.
    ///
    /// The usable window is the advertised lifetime minus
    /// [`TOKEN_EXPIRY_BUFFER`], never negative.
    pub fn issued_at(token: SecureString, lifetime: Duration, now: Instant) -> Self {
        Self {
            token,
            expires_at: now + lifetime.saturating_sub(TOKEN_EXPIRY_BUFFER),
        }
    }

    pub fn token(&self) -> &SecureString {
        &self.token
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Produces a currently valid bearer token, refreshing it when needed.
pub struct OAuthTokenProvider {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecureString,
    scopes: Vec<String>,
    cache: Mutex<Option<Credential>>,
}

impl OAuthTokenProvider {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecureString,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            scopes,
            cache: Mutex::new(None),
        }
    }

    /// Returns the cached token, exchanging client credentials for a new one
    /// when the cache is empty or expired.
    #[instrument(skip(self), fields(token_url = %self.token_url))]
    pub async fn get_credential(&self) -> ConnectorResult<SecureString> {
        let mut cache = self.cache.lock().await;

        if let Some(credential) = cache.as_ref() {
            if credential.is_valid_at(Instant::now()) {
                return Ok(credential.token.clone());
            }
            debug!("Cached access token expired");
        }

        let credential = self.exchange().await?;
        let token = credential.token.clone();
        *cache = Some(credential);
        Ok(token)
    }

    /// Drops the cached token so the next call performs an exchange.
    pub async fn invalidate(&self) {
        self.cache.lock().await.take();
    }

    async fn exchange(&self) -> ConnectorResult<Credential> {
        info!("Requesting new OAuth2 access token");

        let scope = self.scopes.join(" ");
        let mut params = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ConnectorError::AuthenticationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "OAuth2 token request rejected");
            return Err(ConnectorError::AuthenticationFailed(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            ConnectorError::AuthenticationFailed(format!("unusable token response: {}", e))
        })?;

        if parsed.access_token.is_empty() {
            return Err(ConnectorError::AuthenticationFailed(
                "token endpoint returned an empty access_token".to_string(),
            ));
        }

        let lifetime = Duration::from_secs(parsed.expires_in);
        if lifetime <= TOKEN_EXPIRY_BUFFER {
            warn!(
                expires_in = parsed.expires_in,
                "OAuth2 token lifetime does not exceed the expiry buffer"
            );
            return Err(ConnectorError::AuthenticationFailed(format!(
                "token lifetime of {}s is not longer than the {}s expiry buffer",
                parsed.expires_in,
                TOKEN_EXPIRY_BUFFER.as_secs()
            )));
        }

        Ok(Credential::issued_at(
            SecureString::new(parsed.access_token),
            lifetime,
            Instant::now(),
        ))
    }
}

impl std::fmt::Debug for OAuthTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenProvider")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
