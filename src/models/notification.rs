use std::fmt::{Display, Formatter, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Email,
    Sms,
    Push,
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            NotificationType::Email => write!(f, "email"),
            NotificationType::Sms => write!(f, "sms"),
            NotificationType::Push => write!(f, "push"),
        }
    }
}

/// Sent and Failed are terminal; records are written with their final
/// status and never transition afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl Display for NotificationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            NotificationStatus::Pending => write!(f, "pending"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Audit trail row: one per processing attempt, append-only. A record exists
/// for every event the pipeline accepts, whether the side effect succeeded
/// or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub recipient: String,
    pub status: NotificationStatus,
    pub metadata: Option<JsonValue>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn sent(
        notification_type: NotificationType,
        title: String,
        body: String,
        recipient: String,
    ) -> Self {
        Self::new(notification_type, title, body, recipient, NotificationStatus::Sent)
    }

    pub fn failed(
        notification_type: NotificationType,
        title: String,
        body: String,
        recipient: String,
    ) -> Self {
        Self::new(
            notification_type,
            title,
            body,
            recipient,
            NotificationStatus::Failed,
        )
    }

    fn new(
        notification_type: NotificationType,
        title: String,
        body: String,
        recipient: String,
        status: NotificationStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            notification_type,
            title,
            body,
            recipient,
            status,
            metadata: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error_detail = Some(error);
        self
    }
}
