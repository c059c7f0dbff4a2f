pub mod api;
pub mod health;

use std::collections::HashMap;

use reqwest::Method;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::clients::http::ResilientClient;
use crate::config::Config;
use crate::error::ServiceError;

/// Downstream operations reachable through the gateway, one variant per
/// route-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownstreamOp {
    ListUsers,
    GetUser,
    GetUserByEmail,
    CreateUser,
    UpdateUser,
    DeleteUser,
    ListLeads,
    GetLead,
    CreateLead,
    UpdateLead,
    DeleteLead,
    AssignLead,
    UpdateLeadStatus,
}

impl DownstreamOp {
    fn path_template(&self) -> &'static str {
        match self {
            DownstreamOp::ListUsers | DownstreamOp::CreateUser => "/api/users",
            DownstreamOp::GetUser | DownstreamOp::UpdateUser | DownstreamOp::DeleteUser => {
                "/api/users/:id"
            }
            DownstreamOp::GetUserByEmail => "/api/users/email/:email",
            DownstreamOp::ListLeads | DownstreamOp::CreateLead => "/api/leads",
            DownstreamOp::GetLead | DownstreamOp::UpdateLead | DownstreamOp::DeleteLead => {
                "/api/leads/:id"
            }
            DownstreamOp::AssignLead => "/api/leads/:id/assign",
            DownstreamOp::UpdateLeadStatus => "/api/leads/:id/status",
        }
    }

    fn downstream_path(&self, params: &HashMap<String, String>) -> String {
        self.path_template()
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => params.get(name).map(String::as_str).unwrap_or_default(),
                None => segment,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Inbound path suffix pattern, parsed and checked at startup rather than
/// inferred from the request path at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, ServiceError> {
        let mut segments = Vec::new();
        let mut seen_params = Vec::new();

        for raw in pattern.split('/').filter(|s| !s.is_empty()) {
            match raw.strip_prefix(':') {
                Some(name) => {
                    if name.is_empty() {
                        return Err(ServiceError::Validation(format!(
                            "route pattern '{}' has an unnamed parameter",
                            pattern
                        )));
                    }
                    if seen_params.contains(&name) {
                        return Err(ServiceError::Validation(format!(
                            "route pattern '{}' repeats parameter ':{}'",
                            pattern, name
                        )));
                    }
                    seen_params.push(name);
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(raw.to_string())),
            }
        }

        Ok(Self { segments })
    }

    /// Matches a path suffix segment-for-segment, capturing parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();

        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }

        Some(params)
    }
}

struct RouteEntry {
    method: Method,
    pattern: RoutePattern,
    op: DownstreamOp,
}

struct ServiceRoutes {
    name: &'static str,
    client: ResilientClient,
    entries: Vec<RouteEntry>,
}

/// Public entry point router: explicit (method, pattern) tables per
/// downstream service family, each validated when the gateway starts.
/// Forwards the caller's bearer credential unchanged and re-signals
/// downstream failures with their original status.
pub struct GatewayRouter {
    users: ServiceRoutes,
    leads: ServiceRoutes,
}

impl GatewayRouter {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let users = build_table(
            "user-service",
            ResilientClient::new(config.call_config(&config.user_service_url))?,
            &[
                (Method::GET, "", DownstreamOp::ListUsers),
                (Method::GET, "/email/:email", DownstreamOp::GetUserByEmail),
                (Method::GET, "/:id", DownstreamOp::GetUser),
                (Method::POST, "", DownstreamOp::CreateUser),
                (Method::PUT, "/:id", DownstreamOp::UpdateUser),
                (Method::DELETE, "/:id", DownstreamOp::DeleteUser),
            ],
        )?;

        let leads = build_table(
            "lead-service",
            ResilientClient::new(config.call_config(&config.lead_service_url))?,
            &[
                (Method::GET, "", DownstreamOp::ListLeads),
                (Method::GET, "/:id", DownstreamOp::GetLead),
                (Method::POST, "", DownstreamOp::CreateLead),
                (Method::PUT, "/:id", DownstreamOp::UpdateLead),
                (Method::DELETE, "/:id", DownstreamOp::DeleteLead),
                (Method::POST, "/:id/assign", DownstreamOp::AssignLead),
                (Method::PATCH, "/:id/status", DownstreamOp::UpdateLeadStatus),
            ],
        )?;

        Ok(Self { users, leads })
    }

    pub async fn route_users(
        &self,
        method: Method,
        suffix: &str,
        body: Option<&JsonValue>,
        bearer: Option<&str>,
    ) -> Result<JsonValue, ServiceError> {
        dispatch(&self.users, method, suffix, body, bearer).await
    }

    pub async fn route_leads(
        &self,
        method: Method,
        suffix: &str,
        body: Option<&JsonValue>,
        bearer: Option<&str>,
    ) -> Result<JsonValue, ServiceError> {
        dispatch(&self.leads, method, suffix, body, bearer).await
    }
}

fn build_table(
    name: &'static str,
    client: ResilientClient,
    table: &[(Method, &str, DownstreamOp)],
) -> Result<ServiceRoutes, ServiceError> {
    let mut entries: Vec<RouteEntry> = Vec::with_capacity(table.len());

    for (method, pattern, op) in table {
        let pattern = RoutePattern::parse(pattern)?;

        if entries
            .iter()
            .any(|e| e.method == *method && e.pattern == pattern)
        {
            return Err(ServiceError::Validation(format!(
                "duplicate route entry for {} in {} table",
                method, name
            )));
        }

        entries.push(RouteEntry {
            method: method.clone(),
            pattern,
            op: *op,
        });
    }

    Ok(ServiceRoutes {
        name,
        client,
        entries,
    })
}

async fn dispatch(
    routes: &ServiceRoutes,
    method: Method,
    suffix: &str,
    body: Option<&JsonValue>,
    bearer: Option<&str>,
) -> Result<JsonValue, ServiceError> {
    let matched = routes.entries.iter().find_map(|entry| {
        if entry.method != method {
            return None;
        }
        entry.pattern.matches(suffix).map(|params| (entry, params))
    });

    let (entry, params) = matched.ok_or_else(|| {
        ServiceError::NotFound(format!("no route for {} {} in {}", method, suffix, routes.name))
    })?;

    let path = entry.op.downstream_path(&params);

    debug!(
        service = routes.name,
        method = %method,
        suffix,
        downstream_path = %path,
        "Routing request downstream"
    );

    let headers = bearer.map(|credential| {
        HashMap::from([("Authorization".to_string(), credential.to_string())])
    });

    routes.client.call(method, &path, body, headers.as_ref()).await
}
