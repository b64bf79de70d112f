use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use livetail_types::{LogLevel, LogRecord};

use crate::{ClientConfig, ClientError, TokenProvider};

/// Parameters of a historical log query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotQuery {
    /// Channel/source to query
    pub source: String,

    /// Only this level, if set
    pub level: Option<LogLevel>,

    /// Server-side text search, if set
    pub query: Option<String>,

    /// Maximum number of records to return
    pub limit: usize,
}

impl SnapshotQuery {
    pub fn new(source: impl Into<String>, limit: usize) -> Self {
        Self {
            source: source.into(),
            level: None,
            query: None,
            limit,
        }
    }

    pub fn with_level(mut self, level: Option<LogLevel>) -> Self {
        self.level = level;
        self
    }

    /// Set the search text; empty text means no search
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = (!query.is_empty()).then(|| query.to_string());
        self
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("source", self.source.clone())];
        if let Some(level) = self.level {
            params.push(("level", level.wire_name().to_string()));
        }
        if let Some(query) = &self.query {
            params.push(("query", query.clone()));
        }
        params.push(("limit", self.limit.to_string()));
        params
    }
}

/// Client for the historical log query endpoint
#[derive(Clone)]
pub struct SnapshotClient {
    http: Client,
    url: Url,
    tokens: TokenProvider,
}

impl SnapshotClient {
    pub fn new(config: &ClientConfig, tokens: TokenProvider) -> Result<Self, ClientError> {
        Ok(Self {
            http: config.http_client()?,
            url: config.snapshot_url()?,
            tokens,
        })
    }

    /// Fetch one page of historical records, oldest first
    ///
    /// Items that fail to decode are skipped rather than failing the page.
    pub async fn fetch(&self, query: &SnapshotQuery) -> Result<Vec<LogRecord>, ClientError> {
        let token = self.tokens.token().await?;

        debug!(source = %query.source, limit = query.limit, "fetching snapshot");
        let response = self
            .http
            .get(self.url.clone())
            .query(&query.params())
            .bearer_auth(&token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // Next attempt should fetch a fresh token
                self.tokens.invalidate().await;
            }
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        let body: Value = serde_json::from_slice(&response.bytes().await?)?;
        decode_page(body)
    }
}

/// Accept either a bare array or `{"logs": [...]}`
fn decode_page(body: Value) -> Result<Vec<LogRecord>, ClientError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("logs") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ClientError::Snapshot(
                    "response object has no 'logs' array".to_string(),
                ));
            }
        },
        _ => {
            return Err(ClientError::Snapshot(
                "response is neither an array nor an object".to_string(),
            ));
        }
    };

    let total = items.len();
    let records: Vec<LogRecord> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "skipping malformed snapshot record");
                None
            }
        })
        .collect();

    if records.len() < total {
        debug!(kept = records.len(), total, "snapshot had malformed records");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_skip_unset_fields() {
        let query = SnapshotQuery::new("auth", 100).with_query("");
        assert_eq!(
            query.params(),
            vec![("source", "auth".to_string()), ("limit", "100".to_string())]
        );

        let full = SnapshotQuery::new("api", 5)
            .with_level(Some(LogLevel::Warning))
            .with_query("slow");
        assert_eq!(
            full.params(),
            vec![
                ("source", "api".to_string()),
                ("level", "warning".to_string()),
                ("query", "slow".to_string()),
                ("limit", "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_page_shapes() {
        let record = json!({"id":"1","timestamp":0,"level":"info","source":"api","message":"m"});
        assert_eq!(decode_page(json!([record.clone()])).unwrap().len(), 1);
        assert_eq!(decode_page(json!({"logs": [record]})).unwrap().len(), 1);
        assert!(matches!(
            decode_page(json!({"items": []})),
            Err(ClientError::Snapshot(_))
        ));
        assert!(matches!(decode_page(json!(42)), Err(ClientError::Snapshot(_))));
    }

    #[test]
    fn test_decode_page_skips_malformed() {
        let page = json!([
            {"id":"1","timestamp":0,"level":"info","source":"api","message":"ok"},
            {"id":"2","timestamp":0,"level":"loud","source":"api","message":"bad level"},
            {"id":"3","timestamp":0,"level":"error","source":"api"}
        ]);
        let records = decode_page(page).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1");
    }
}
