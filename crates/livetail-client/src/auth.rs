//! Bearer token for the log service
//!
//! The token is fetched once and reused for the life of the process. If the
//! token endpoint reports an expiry, the cached token is refetched on first
//! use after it lapses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::{ClientConfig, ClientError};

/// Refetch this long before the reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Cached token entry
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: Option<Instant>,
}

impl CachedToken {
    /// Check if the token is still usable (tokens without expiry never lapse)
    pub fn is_valid(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() + EXPIRY_MARGIN < at,
            None => true,
        }
    }
}

/// Fetches and caches the log-channel bearer token
#[derive(Clone)]
pub struct TokenProvider {
    http: Client,
    url: Url,
    api_key: Option<String>,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl TokenProvider {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: config.http_client()?,
            url: config.token_url()?,
            api_key: config.api_key.clone(),
            cached: Arc::new(Mutex::new(None)),
        })
    }

    /// Get the token, fetching it on first use
    ///
    /// Concurrent callers wait on the same fetch rather than racing.
    pub async fn token(&self) -> Result<String, ClientError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref().filter(|t| t.is_valid()) {
            return Ok(entry.token.clone());
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    /// Forget the cached token (e.g. after the service rejected it)
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    async fn fetch(&self) -> Result<CachedToken, ClientError> {
        debug!(url = %self.url, "fetching log token");

        let mut request = self.http.get(self.url.clone());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Auth(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Auth(format!("invalid token response: {}", e)))?;

        if body.token.is_empty() {
            return Err(ClientError::Auth("token endpoint returned an empty token".to_string()));
        }

        Ok(CachedToken {
            token: body.token,
            expires_at: body
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_without_expiry_stays_valid() {
        let token = CachedToken {
            token: "t".to_string(),
            expires_at: None,
        };
        assert!(token.is_valid());
    }

    #[test]
    fn test_token_inside_margin_is_invalid() {
        let soon = CachedToken {
            token: "t".to_string(),
            expires_at: Some(Instant::now() + Duration::from_secs(10)),
        };
        assert!(!soon.is_valid());

        let later = CachedToken {
            token: "t".to_string(),
            expires_at: Some(Instant::now() + Duration::from_secs(3600)),
        };
        assert!(later.is_valid());
    }
}
