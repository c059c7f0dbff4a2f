use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tracing::info;
use uuid::Uuid;

use crate::emitter::EventEmitter;
use crate::error::ServiceError;
use crate::models::entities::{NewUser, User, UserUpdate};
use crate::models::event::Topic;
use crate::models::validation::validate_email;

/// External datastore collaborator for users. Implementations must return
/// Conflict on a duplicate email and NotFound for a missing id.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &NewUser) -> Result<User, ServiceError>;
    async fn get(&self, id: Uuid) -> Result<User, ServiceError>;
    async fn get_by_email(&self, email: &str) -> Result<User, ServiceError>;
    async fn list(&self) -> Result<Vec<User>, ServiceError>;
    async fn update(&self, id: Uuid, changes: &UserUpdate) -> Result<User, ServiceError>;
    async fn delete(&self, id: Uuid) -> Result<(), ServiceError>;
}

/// Write use cases: local persistence commits first, the matching event is
/// emitted afterwards (best-effort, never failing the write).
pub struct UserService<S> {
    store: S,
    emitter: Arc<EventEmitter>,
}

impl<S: UserStore> UserService<S> {
    pub fn new(store: S, emitter: Arc<EventEmitter>) -> Self {
        Self { store, emitter }
    }

    pub async fn create(&self, input: NewUser) -> Result<User, ServiceError> {
        validate_email(&input.email)?;

        let user = self.store.insert(&input).await?;

        info!(user_id = %user.id, "User created");
        self.emitter.emit(Topic::UserCreated, user_payload(&user)).await;

        Ok(user)
    }

    pub async fn update(&self, id: Uuid, changes: UserUpdate) -> Result<User, ServiceError> {
        let user = self.store.update(id, &changes).await?;

        info!(user_id = %user.id, "User updated");
        self.emitter.emit(Topic::UserUpdated, user_payload(&user)).await;

        Ok(user)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store.delete(id).await?;

        info!(user_id = %id, "User deleted");
        self.emitter
            .emit(
                Topic::UserDeleted,
                HashMap::from([("userId".to_string(), json!(id.to_string()))]),
            )
            .await;

        Ok(())
    }
}

fn user_payload(user: &User) -> HashMap<String, JsonValue> {
    HashMap::from([
        ("userId".to_string(), json!(user.id.to_string())),
        ("email".to_string(), json!(user.email)),
        ("firstName".to_string(), json!(user.first_name)),
        ("lastName".to_string(), json!(user.last_name)),
        ("role".to_string(), json!(user.role)),
    ])
}
