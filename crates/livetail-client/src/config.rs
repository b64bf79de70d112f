use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use url::Url;

use crate::ClientError;

/// Connection settings for the log service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root, e.g. `https://admin.example.com`
    pub base_url: String,

    /// Credential presented to the token endpoint
    pub api_key: Option<String>,

    /// Token endpoint path
    pub token_path: String,

    /// Historical query endpoint path
    pub snapshot_path: String,

    /// Live channel path (served over ws/wss)
    pub stream_path: String,

    /// Per-request timeout for HTTP calls
    pub timeout: Duration,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            token_path: "/api/logs/token".to_string(),
            snapshot_path: "/api/logs".to_string(),
            stream_path: "/ws/logs".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: concat!("livetail/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Build the shared HTTP client
    pub fn http_client(&self) -> Result<Client, ClientError> {
        ClientBuilder::new()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))
    }

    /// Resolve a path below the base URL, keeping any base path prefix
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let mut url: Url = self.base_url.parse().map_err(|e| {
            ClientError::Config(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;

        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        Ok(url)
    }

    pub fn token_url(&self) -> Result<Url, ClientError> {
        self.endpoint(&self.token_path)
    }

    pub fn snapshot_url(&self) -> Result<Url, ClientError> {
        self.endpoint(&self.snapshot_path)
    }

    /// Live channel URL for `channel`, with the scheme switched to ws/wss
    pub fn stream_url(&self, channel: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint(&self.stream_path)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ClientError::Config(format!(
                    "Unsupported URL scheme '{}'",
                    other
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Config(format!("Cannot use scheme '{}'", scheme)))?;
        url.query_pairs_mut().append_pair("channel", channel);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_prefix() {
        let config = ClientConfig {
            base_url: "https://example.com/admin/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.snapshot_url().unwrap().as_str(),
            "https://example.com/admin/api/logs"
        );
    }

    #[test]
    fn test_stream_url_switches_scheme() {
        let config = ClientConfig {
            base_url: "https://example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.stream_url("auth").unwrap().as_str(),
            "wss://example.com/ws/logs?channel=auth"
        );

        let plain = ClientConfig::default();
        assert_eq!(plain.stream_url("api").unwrap().scheme(), "ws");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.token_url(), Err(ClientError::Config(_))));

        let ftp = ClientConfig {
            base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(ftp.stream_url("api"), Err(ClientError::Config(_))));
    }
}
