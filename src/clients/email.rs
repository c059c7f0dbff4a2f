use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use crate::clients::http::{CallConfig, ResilientClient};
use crate::config::Config;
use crate::error::ServiceError;
use crate::pipeline::NotificationChannel;

/// Email delivery over the provider's HTTP API. Uses a single-attempt call
/// configuration: the consumer pipeline records failed deliveries and leaves
/// retries to broker redelivery.
pub struct EmailClient {
    client: ResilientClient,
    sender: String,
}

impl EmailClient {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let client = ResilientClient::new(config.email_call_config())?;

        info!(base_url = %config.email_service_url, "Email client initialized");

        Ok(Self {
            client,
            sender: config.email_sender.clone(),
        })
    }

    pub fn with_call_config(call_config: CallConfig, sender: String) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ResilientClient::new(call_config)?,
            sender,
        })
    }
}

#[async_trait]
impl NotificationChannel for EmailClient {
    async fn deliver(&self, to: &str, title: &str, body: &str) -> Result<(), ServiceError> {
        debug!(recipient = to, "Sending email notification");

        let payload = json!({
            "from": self.sender,
            "to": to,
            "subject": title,
            "text": body,
        });

        self.client
            .call(Method::POST, "/messages", Some(&payload), None)
            .await
            .map_err(|e| ServiceError::SideEffect(format!("email delivery failed: {}", e)))?;

        Ok(())
    }
}
