use anyhow::Result;
use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use minicrm::config::Config;
use minicrm::error::ServiceError;
use minicrm::gateway::GatewayRouter;
use minicrm::gateway::health::HealthAggregator;
use minicrm::models::health::HealthStatus;

fn test_config(user_url: &str, lead_url: &str) -> Config {
    Config {
        amqp_url: "amqp://localhost:5672".to_string(),
        event_exchange: "minicrm.events".to_string(),
        consumer_group: "notification-service".to_string(),
        prefetch_count: 8,
        database_url: "postgres://localhost/minicrm".to_string(),
        email_service_url: "http://localhost:9999".to_string(),
        email_sender: "noreply@minicrm.io".to_string(),
        user_service_url: user_url.to_string(),
        lead_service_url: lead_url.to_string(),
        call_timeout_ms: 1000,
        max_retries: 0,
        retry_delay_ms: 10,
        health_timeout_ms: 500,
        gateway_port: 0,
    }
}

/// Test: The route tables validate and build at startup
#[tokio::test]
async fn test_router_builds_from_config() -> Result<()> {
    let config = test_config("http://localhost:9001", "http://localhost:9002");
    assert!(GatewayRouter::new(&config).is_ok());
    Ok(())
}

/// Test: Get-by-id resolves through the table and forwards the bearer credential
#[tokio::test]
async fn test_get_user_forwards_bearer() -> Result<()> {
    let users = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users/42"))
        .and(header("authorization", "Bearer caller-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "42"})))
        .expect(1)
        .mount(&users)
        .await;

    let config = test_config(&users.uri(), "http://localhost:9002");
    let router = GatewayRouter::new(&config)?;

    let response = router
        .route_users(Method::GET, "/42", None, Some("Bearer caller-token"))
        .await?;

    assert_eq!(response["id"], "42");

    Ok(())
}

/// Test: The secondary-key route maps to the downstream email lookup
#[tokio::test]
async fn test_get_user_by_email_route() -> Result<()> {
    let users = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users/email/a@b.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "a@b.com"})))
        .expect(1)
        .mount(&users)
        .await;

    let config = test_config(&users.uri(), "http://localhost:9002");
    let router = GatewayRouter::new(&config)?;

    let response = router
        .route_users(Method::GET, "/email/a@b.com", None, None)
        .await?;

    assert_eq!(response["email"], "a@b.com");

    Ok(())
}

/// Test: Sub-resource actions route to their own downstream operations
#[tokio::test]
async fn test_lead_assign_and_status_routes() -> Result<()> {
    let leads = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/leads/7/assign"))
        .and(body_json(json!({"assigneeId": "u9"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"assigned": true})))
        .expect(1)
        .mount(&leads)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/api/leads/7/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "won"})))
        .expect(1)
        .mount(&leads)
        .await;

    let config = test_config("http://localhost:9001", &leads.uri());
    let router = GatewayRouter::new(&config)?;

    let assigned = router
        .route_leads(
            Method::POST,
            "/7/assign",
            Some(&json!({"assigneeId": "u9"})),
            None,
        )
        .await?;
    assert_eq!(assigned["assigned"], true);

    let status = router
        .route_leads(
            Method::PATCH,
            "/7/status",
            Some(&json!({"status": "won"})),
            None,
        )
        .await?;
    assert_eq!(status["status"], "won");

    Ok(())
}

/// Test: Downstream failures pass through with their original status
#[tokio::test]
async fn test_downstream_status_passthrough() -> Result<()> {
    let users = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("user not found"))
        .mount(&users)
        .await;

    let config = test_config(&users.uri(), "http://localhost:9002");
    let router = GatewayRouter::new(&config)?;

    let err = router
        .route_users(Method::GET, "/missing", None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(err.status_code(), 404);
    assert!(err.to_string().contains("user not found"));

    Ok(())
}

/// Test: A suffix outside the table is rejected without a downstream call
#[tokio::test]
async fn test_unknown_route_is_not_forwarded() -> Result<()> {
    let users = MockServer::start().await;

    let config = test_config(&users.uri(), "http://localhost:9002");
    let router = GatewayRouter::new(&config)?;

    let err = router
        .route_users(Method::GET, "/42/export/csv", None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(users.received_requests().await.unwrap().is_empty());

    Ok(())
}

/// Test: Health aggregation marks failing downstreams without failing itself
#[tokio::test]
async fn test_health_aggregation_tolerates_failures() -> Result<()> {
    let healthy = MockServer::start().await;
    let broken = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&healthy)
        .await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let aggregator = HealthAggregator::with_targets(
        vec![
            ("user_service".to_string(), healthy.uri()),
            ("lead_service".to_string(), broken.uri()),
        ],
        500,
    )?;

    let response = aggregator.check_all().await;

    assert_eq!(response.status, HealthStatus::Degraded);
    assert_eq!(
        response.checks["user_service"].status,
        HealthStatus::Healthy
    );
    assert_eq!(
        response.checks["lead_service"].status,
        HealthStatus::Unhealthy
    );
    assert!(response.checks["lead_service"].error.is_some());

    Ok(())
}

/// Test: An unreachable downstream reads as unhealthy, not as an error
#[tokio::test]
async fn test_health_aggregation_handles_unreachable_target() -> Result<()> {
    let healthy = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&healthy)
        .await;

    let aggregator = HealthAggregator::with_targets(
        vec![
            ("user_service".to_string(), healthy.uri()),
            // Nothing listens here; the check must time out or refuse.
            ("lead_service".to_string(), "http://127.0.0.1:59999".to_string()),
        ],
        300,
    )?;

    let response = aggregator.check_all().await;

    assert_eq!(response.status, HealthStatus::Degraded);
    assert_eq!(
        response.checks["lead_service"].status,
        HealthStatus::Unhealthy
    );

    Ok(())
}
