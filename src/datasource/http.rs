//! Shared JSON-over-HTTP client with retry/backoff for platform adapters.

use super::DataSourceError;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Read-only JSON client bound to one platform base URL.
#[derive(Debug, Clone)]
pub struct JsonClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    retry_budget: Duration,
}

impl JsonClient {
    /// Create a client whose every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            retry_budget: Duration::from_secs(30),
        }
    }

    /// Cap the total time spent retrying transient failures.
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and decode the body as JSON.
    ///
    /// Connection failures and 5xx are retried with exponential backoff.
    /// 429 is returned immediately as [`DataSourceError::RateLimited`] so the
    /// caller can lengthen its own cadence.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, DataSourceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_budget),
            ..Default::default()
        };
        let timeout_ms = self.timeout.as_millis() as u64;

        retry(backoff, || async {
            self.attempt(&url, query, timeout_ms).await.map_err(|e| {
                if e.is_transient() {
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }

    async fn attempt(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout_ms: u64,
    ) -> Result<serde_json::Value, DataSourceError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DataSourceError::Timeout(timeout_ms)
                } else {
                    DataSourceError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DataSourceError::RateLimited);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(DataSourceError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let message = if status.is_server_error() {
                "Server error"
            } else {
                "Client error"
            };
            return Err(DataSourceError::Http {
                status: status.as_u16(),
                message: message.to_string(),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| DataSourceError::Decoding(e.to_string()))
    }
}

// Field helpers shared by both adapters. Missing or mistyped fields fall back
// to documented defaults instead of failing the fetch.

pub(crate) fn str_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn f64_field(value: &serde_json::Value, key: &str) -> f64 {
    value.get(key).and_then(as_f64_lenient).unwrap_or(0.0)
}

pub(crate) fn opt_f64_field(value: &serde_json::Value, key: &str) -> Option<f64> {
    value.get(key).and_then(as_f64_lenient)
}

pub(crate) fn bool_field(value: &serde_json::Value, key: &str) -> bool {
    value.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Ids arrive as either JSON numbers or strings depending on the platform.
pub(crate) fn id_field(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn as_f64_lenient(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
