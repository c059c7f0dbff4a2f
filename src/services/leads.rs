use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tracing::info;
use uuid::Uuid;

use crate::emitter::EventEmitter;
use crate::error::ServiceError;
use crate::models::entities::{Lead, LeadStatus, LeadUpdate, NewLead, User};
use crate::models::event::Topic;
use crate::models::validation::validate_email;

/// External datastore collaborator for leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert(&self, lead: &NewLead) -> Result<Lead, ServiceError>;
    async fn get(&self, id: Uuid) -> Result<Lead, ServiceError>;
    async fn list(&self) -> Result<Vec<Lead>, ServiceError>;
    async fn update(&self, id: Uuid, changes: &LeadUpdate) -> Result<Lead, ServiceError>;
    async fn set_assignee(&self, id: Uuid, assignee: Uuid) -> Result<Lead, ServiceError>;
    async fn set_status(&self, id: Uuid, status: LeadStatus) -> Result<Lead, ServiceError>;
    async fn delete(&self, id: Uuid) -> Result<(), ServiceError>;
}

pub struct LeadService<S> {
    store: S,
    emitter: Arc<EventEmitter>,
}

impl<S: LeadStore> LeadService<S> {
    pub fn new(store: S, emitter: Arc<EventEmitter>) -> Self {
        Self { store, emitter }
    }

    pub async fn create(&self, input: NewLead) -> Result<Lead, ServiceError> {
        validate_email(&input.email)?;

        let lead = self.store.insert(&input).await?;

        info!(lead_id = %lead.id, "Lead created");
        self.emitter.emit(Topic::LeadCreated, lead_payload(&lead)).await;

        Ok(lead)
    }

    pub async fn update(&self, id: Uuid, changes: LeadUpdate) -> Result<Lead, ServiceError> {
        if let Some(email) = &changes.email {
            validate_email(email)?;
        }

        let lead = self.store.update(id, &changes).await?;

        info!(lead_id = %lead.id, "Lead updated");
        self.emitter.emit(Topic::LeadUpdated, lead_payload(&lead)).await;

        Ok(lead)
    }

    /// Assigns the lead to a user. `lead.assigned` is a derived event: it is
    /// only emitted when the assignee actually changed.
    pub async fn assign(&self, id: Uuid, assignee: &User) -> Result<Lead, ServiceError> {
        let before = self.store.get(id).await?;
        let lead = self.store.set_assignee(id, assignee.id).await?;

        info!(lead_id = %lead.id, assignee_id = %assignee.id, "Lead assignee set");
        self.emitter.emit(Topic::LeadUpdated, lead_payload(&lead)).await;

        if before.assignee_id != Some(assignee.id) {
            let mut payload = lead_payload(&lead);
            payload.insert("assigneeId".to_string(), json!(assignee.id.to_string()));
            payload.insert("assigneeEmail".to_string(), json!(assignee.email));
            self.emitter.emit(Topic::LeadAssigned, payload).await;
        }

        Ok(lead)
    }

    /// Moves the lead to a new status. `lead.status_changed` is only emitted
    /// when the status actually changed.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<Lead, ServiceError> {
        let before = self.store.get(id).await?;
        let lead = self.store.set_status(id, status).await?;

        info!(lead_id = %lead.id, status = %status, "Lead status set");
        self.emitter.emit(Topic::LeadUpdated, lead_payload(&lead)).await;

        if before.status != status {
            let mut payload = lead_payload(&lead);
            payload.insert("oldStatus".to_string(), json!(before.status.to_string()));
            payload.insert("newStatus".to_string(), json!(status.to_string()));
            self.emitter.emit(Topic::LeadStatusChanged, payload).await;
        }

        Ok(lead)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store.delete(id).await?;

        info!(lead_id = %id, "Lead deleted");
        self.emitter
            .emit(
                Topic::LeadDeleted,
                HashMap::from([("leadId".to_string(), json!(id.to_string()))]),
            )
            .await;

        Ok(())
    }
}

fn lead_payload(lead: &Lead) -> HashMap<String, JsonValue> {
    HashMap::from([
        ("leadId".to_string(), json!(lead.id.to_string())),
        ("leadName".to_string(), json!(lead.name)),
        ("email".to_string(), json!(lead.email)),
        ("status".to_string(), json!(lead.status.to_string())),
    ])
}
