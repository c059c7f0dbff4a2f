use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::clients::http::CallConfig;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub amqp_url: String,

    #[serde(default = "default_event_exchange")]
    pub event_exchange: String,

    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: u16,

    pub database_url: String,

    pub email_service_url: String,

    #[serde(default = "default_email_sender")]
    pub email_sender: String,

    pub user_service_url: String,
    pub lead_service_url: String,

    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,
}

fn default_event_exchange() -> String {
    "minicrm.events".to_string()
}

fn default_consumer_group() -> String {
    "notification-service".to_string()
}

fn default_prefetch_count() -> u16 {
    8
}

fn default_email_sender() -> String {
    "noreply@minicrm.io".to_string()
}

fn default_call_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_health_timeout_ms() -> u64 {
    2000
}

fn default_gateway_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|_| anyhow!("Invalid or missing environmental variable"))?;
        Ok(config)
    }

    /// Call settings for a downstream service target.
    pub fn call_config(&self, base_url: &str) -> CallConfig {
        CallConfig::new(base_url)
            .timeout_ms(self.call_timeout_ms)
            .max_retries(self.max_retries)
            .retry_delay_ms(self.retry_delay_ms)
    }

    /// Call settings for the email provider: same timeout, no internal
    /// retries — failed deliveries are recorded and left to broker redelivery.
    pub fn email_call_config(&self) -> CallConfig {
        CallConfig::new(&self.email_service_url)
            .timeout_ms(self.call_timeout_ms)
            .max_retries(0)
            .retry_delay_ms(self.retry_delay_ms)
    }
}
