use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::ServiceError;

/// Per-target call settings. Built once per downstream service and immutable
/// for the client's lifetime.
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub headers: HashMap<String, String>,
}

impl CallConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: 5000,
            max_retries: 3,
            retry_delay_ms: 1000,
            headers: HashMap::new(),
        }
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Outbound-call wrapper used by every service-to-service interaction.
///
/// Connection-level failures (including timeout) and 5xx responses are
/// retried up to `max_retries` additional attempts with a fixed delay
/// between attempts; any other failure is returned immediately. Exhausted
/// retries propagate the last failure unchanged so callers can inspect the
/// original status code.
pub struct ResilientClient {
    http_client: Client,
    config: CallConfig,
}

impl ResilientClient {
    pub fn new(config: CallConfig) -> Result<Self, ServiceError> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ServiceError::Transient {
                status: None,
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&JsonValue>,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<JsonValue, ServiceError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            debug!(
                method = %method,
                path,
                target = %self.config.base_url,
                attempt,
                "Dispatching request"
            );

            match self.attempt(&method, &url, body, headers).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(method = %method, path, attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        method = %method,
                        path,
                        target = %self.config.base_url,
                        attempt,
                        error = %e,
                        "Request attempt failed"
                    );

                    if !e.is_retryable() || attempt > self.config.max_retries {
                        return Err(e);
                    }

                    sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        body: Option<&JsonValue>,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<JsonValue, ServiceError> {
        let mut request = self.http_client.request(method.clone(), url);

        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }

        if let Some(extra) = headers {
            for (name, value) in extra {
                request = request.header(name, value);
            }
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out after {}ms", self.config.timeout_ms)
            } else {
                format!("connection failed: {}", e)
            };
            ServiceError::Transient {
                status: None,
                message,
            }
        })?;

        let status = response.status();

        if status.is_success() {
            let text = response.text().await.map_err(|e| ServiceError::Transient {
                status: None,
                message: format!("failed to read response body: {}", e),
            })?;

            if text.is_empty() {
                return Ok(JsonValue::Null);
            }

            serde_json::from_str(&text).map_err(|e| ServiceError::Upstream {
                status: status.as_u16(),
                message: format!("invalid JSON response: {}", e),
            })
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ServiceError::from_status(status.as_u16(), message))
        }
    }
}
