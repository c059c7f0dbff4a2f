use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::health::{HealthCheckResponse, HealthStatus, ServiceHealth};

/// Composite liveness over every downstream service. A downstream timeout
/// or non-2xx marks that entry unhealthy without failing the aggregate.
pub struct HealthAggregator {
    http_client: Client,
    targets: Vec<(String, String)>,
}

impl HealthAggregator {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        Self::with_targets(
            vec![
                ("user_service".to_string(), config.user_service_url.clone()),
                ("lead_service".to_string(), config.lead_service_url.clone()),
            ],
            config.health_timeout_ms,
        )
    }

    pub fn with_targets(
        targets: Vec<(String, String)>,
        timeout_ms: u64,
    ) -> Result<Self, ServiceError> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ServiceError::Transient {
                status: None,
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            targets,
        })
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        for (name, base_url) in &self.targets {
            let health = self.check_target(name, base_url).await;
            checks.insert(name.clone(), health);
        }

        let status = determine_overall_status(&checks);

        HealthCheckResponse {
            status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            checks,
        }
    }

    async fn check_target(&self, name: &str, base_url: &str) -> ServiceHealth {
        let url = format!("{}/health", base_url);
        let start = Instant::now();

        match self.http_client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(service = name, response_time_ms = elapsed, "Health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Ok(response) => {
                warn!(service = name, status = %response.status(), "Health check failed");
                ServiceHealth::unhealthy(format!("returned status {}", response.status()))
            }
            Err(e) => {
                warn!(service = name, error = %e, "Health check unreachable");
                ServiceHealth::unhealthy(format!("unreachable: {}", e))
            }
        }
    }
}

fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
    let unhealthy = checks
        .values()
        .filter(|health| health.status == HealthStatus::Unhealthy)
        .count();

    if unhealthy == 0 {
        HealthStatus::Healthy
    } else if unhealthy < checks.len() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_status_reflects_entry_mix() {
        let mut checks = HashMap::new();
        checks.insert("a".to_string(), ServiceHealth::healthy(3));
        checks.insert("b".to_string(), ServiceHealth::healthy(5));
        assert_eq!(determine_overall_status(&checks), HealthStatus::Healthy);

        checks.insert("c".to_string(), ServiceHealth::unhealthy("down".into()));
        assert_eq!(determine_overall_status(&checks), HealthStatus::Degraded);

        let mut all_down = HashMap::new();
        all_down.insert("a".to_string(), ServiceHealth::unhealthy("down".into()));
        assert_eq!(determine_overall_status(&all_down), HealthStatus::Unhealthy);
    }
}
