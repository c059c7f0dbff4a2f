use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::models::event::DomainEvent;
use crate::models::notification::{NotificationRecord, NotificationType};
use crate::models::template::{MessageTemplate, template_for};
use crate::models::validation::validate_email;

/// External message channel performing the side effect. Implementations
/// must not retry internally; a failed delivery is recorded and left to
/// broker redelivery.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, to: &str, title: &str, body: &str) -> Result<(), ServiceError>;
}

/// Durable audit trail for processed events.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record(&self, record: &NotificationRecord) -> Result<(), ServiceError>;
}

/// Per-event state machine: Received -> Validated -> SideEffectAttempted ->
/// Recorded. Stateless across events; the NotificationRecord is the only
/// durable outcome.
///
/// Every accepted event yields exactly one record, Sent or Failed. A Failed
/// outcome is recorded first and the original error re-raised so the broker
/// harness can trigger redelivery; a redelivered duplicate produces a second
/// independent record.
pub struct NotificationPipeline {
    channel: Arc<dyn NotificationChannel>,
    store: Arc<dyn AuditStore>,
}

impl NotificationPipeline {
    pub fn new(channel: Arc<dyn NotificationChannel>, store: Arc<dyn AuditStore>) -> Self {
        Self { channel, store }
    }

    /// Entry point for raw broker payloads. A payload that does not parse
    /// was never accepted for processing and leaves no record.
    pub async fn process(&self, payload: &str) -> Result<(), ServiceError> {
        let event = serde_json::from_str::<DomainEvent>(payload)
            .map_err(|e| ServiceError::Validation(format!("malformed event payload: {}", e)))?;

        self.handle(&event).await
    }

    pub async fn handle(&self, event: &DomainEvent) -> Result<(), ServiceError> {
        info!(topic = %event.topic, "Processing event");

        let template = template_for(event.topic);
        let outcome = self.attempt(event, template).await;

        let record = self.build_record(event, template, &outcome);

        if let Err(store_err) = self.store.record(&record).await {
            warn!(
                record_id = %record.id,
                error = %store_err,
                "Failed to persist notification record"
            );
        } else {
            debug!(
                record_id = %record.id,
                status = %record.status,
                "Notification record persisted"
            );
        }

        outcome.map(|_| ())
    }

    async fn attempt(
        &self,
        event: &DomainEvent,
        template: Option<&'static MessageTemplate>,
    ) -> Result<Delivery, ServiceError> {
        let template = template.ok_or_else(|| {
            ServiceError::Validation(format!(
                "no notification template for topic {}",
                event.topic
            ))
        })?;

        for field in template.required_fields {
            if event.field(field).is_none_or(str::is_empty) {
                return Err(ServiceError::Validation(format!(
                    "missing required field '{}'",
                    field
                )));
            }
        }

        let recipient = match event.field(template.recipient_field) {
            Some(recipient) if !recipient.is_empty() => recipient.to_string(),
            _ => {
                return Err(ServiceError::Validation(format!(
                    "missing required field '{}'",
                    template.recipient_field
                )));
            }
        };

        validate_email(&recipient)?;

        let rendered = template.render(&event.payload)?;

        self.channel
            .deliver(&recipient, &rendered.title, &rendered.body)
            .await
            .map_err(|e| match e {
                ServiceError::SideEffect(_) => e,
                other => ServiceError::SideEffect(other.to_string()),
            })?;

        info!(topic = %event.topic, recipient = %recipient, "Notification delivered");

        Ok(Delivery {
            recipient,
            title: rendered.title,
            body: rendered.body,
        })
    }

    fn build_record(
        &self,
        event: &DomainEvent,
        template: Option<&'static MessageTemplate>,
        outcome: &Result<Delivery, ServiceError>,
    ) -> NotificationRecord {
        let metadata = serde_json::to_value(&event.payload).unwrap_or_default();

        match outcome {
            Ok(delivery) => NotificationRecord::sent(
                template.map_or(NotificationType::Email, |t| t.notification_type),
                delivery.title.clone(),
                delivery.body.clone(),
                delivery.recipient.clone(),
            )
            .with_metadata(metadata),
            Err(e) => {
                // Failure may predate rendering; fall back to the raw
                // template text and whatever recipient the event carried.
                let recipient = template
                    .and_then(|t| event.field(t.recipient_field))
                    .unwrap_or_default()
                    .to_string();

                NotificationRecord::failed(
                    template.map_or(NotificationType::Email, |t| t.notification_type),
                    template.map_or_else(|| event.topic.to_string(), |t| t.title.to_string()),
                    template.map_or_else(String::new, |t| t.body.to_string()),
                    recipient,
                )
                .with_metadata(metadata)
                .with_error(e.to_string())
            }
        }
    }
}

struct Delivery {
    recipient: String,
    title: String,
    body: String,
}
