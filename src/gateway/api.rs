use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
};
use serde_json::{Value as JsonValue, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::ServiceError;
use crate::gateway::{GatewayRouter, health::HealthAggregator};

pub struct AppState {
    router: GatewayRouter,
    health: HealthAggregator,
}

pub async fn run_gateway(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState {
        router: GatewayRouter::new(&config)?,
        health: HealthAggregator::new(&config)?,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/users", any(users_root))
        .route("/api/users/{*rest}", any(users_passthrough))
        .route("/api/leads", any(leads_root))
        .route("/api/leads/{*rest}", any(leads_passthrough))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.gateway_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Gateway started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // The aggregate endpoint itself always answers; per-entry status carries
    // the downstream failures.
    (StatusCode::OK, Json(state.health.check_all().await))
}

async fn users_root(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward_users(state, method, String::new(), headers, body).await
}

async fn users_passthrough(
    State(state): State<Arc<AppState>>,
    method: Method,
    Path(rest): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward_users(state, method, format!("/{}", rest), headers, body).await
}

async fn leads_root(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward_leads(state, method, String::new(), headers, body).await
}

async fn leads_passthrough(
    State(state): State<Arc<AppState>>,
    method: Method,
    Path(rest): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward_leads(state, method, format!("/{}", rest), headers, body).await
}

async fn forward_users(
    state: Arc<AppState>,
    method: Method,
    suffix: String,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let bearer = bearer_credential(&headers);
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return error_response(e),
    };

    match state
        .router
        .route_users(method, &suffix, body.as_ref(), bearer.as_deref())
        .await
    {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn forward_leads(
    state: Arc<AppState>,
    method: Method,
    suffix: String,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let bearer = bearer_credential(&headers);
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return error_response(e),
    };

    match state
        .router
        .route_leads(method, &suffix, body.as_ref(), bearer.as_deref())
        .await
    {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => error_response(e),
    }
}

/// The caller's Authorization header value, forwarded downstream unchanged.
fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn parse_body(body: &Bytes) -> Result<Option<JsonValue>, ServiceError> {
    if body.is_empty() {
        return Ok(None);
    }

    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ServiceError::Validation(format!("invalid JSON body: {}", e)))
}

fn error_response(error: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
