use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Topic contract shared by publishers and the notification consumer.
///
/// The string mapping below is the only coupling between independently
/// deployed services: no delivery ordering is guaranteed across topics, and
/// consumers must tolerate redelivered duplicates on any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "user.updated")]
    UserUpdated,
    #[serde(rename = "user.deleted")]
    UserDeleted,
    #[serde(rename = "lead.created")]
    LeadCreated,
    #[serde(rename = "lead.updated")]
    LeadUpdated,
    #[serde(rename = "lead.deleted")]
    LeadDeleted,
    #[serde(rename = "lead.assigned")]
    LeadAssigned,
    #[serde(rename = "lead.status_changed")]
    LeadStatusChanged,
}

impl Topic {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Topic::UserCreated => "user.created",
            Topic::UserUpdated => "user.updated",
            Topic::UserDeleted => "user.deleted",
            Topic::LeadCreated => "lead.created",
            Topic::LeadUpdated => "lead.updated",
            Topic::LeadDeleted => "lead.deleted",
            Topic::LeadAssigned => "lead.assigned",
            Topic::LeadStatusChanged => "lead.status_changed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user.created" => Some(Topic::UserCreated),
            "user.updated" => Some(Topic::UserUpdated),
            "user.deleted" => Some(Topic::UserDeleted),
            "lead.created" => Some(Topic::LeadCreated),
            "lead.updated" => Some(Topic::LeadUpdated),
            "lead.deleted" => Some(Topic::LeadDeleted),
            "lead.assigned" => Some(Topic::LeadAssigned),
            "lead.status_changed" => Some(Topic::LeadStatusChanged),
            _ => None,
        }
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

/// One published domain event: topic, flat field map, emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub topic: Topic,
    pub payload: HashMap<String, JsonValue>,
    pub emitted_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(topic: Topic, payload: HashMap<String, JsonValue>) -> Self {
        Self {
            topic,
            payload,
            emitted_at: Utc::now(),
        }
    }

    /// String payload field, None when absent or not a string.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topic_strings_round_trip() {
        for topic in [
            Topic::UserCreated,
            Topic::LeadAssigned,
            Topic::LeadStatusChanged,
        ] {
            assert_eq!(Topic::parse(topic.as_str()), Some(topic));
        }
        assert_eq!(Topic::parse("user.renamed"), None);
    }

    #[test]
    fn event_serializes_topic_as_wire_name() {
        let mut payload = HashMap::new();
        payload.insert("userId".to_string(), json!("u1"));

        let event = DomainEvent::new(Topic::UserCreated, payload);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["topic"], "user.created");
        assert_eq!(value["payload"]["userId"], "u1");
    }

    #[test]
    fn field_accessor_ignores_non_strings() {
        let mut payload = HashMap::new();
        payload.insert("email".to_string(), json!("a@b.com"));
        payload.insert("age".to_string(), json!(3));

        let event = DomainEvent::new(Topic::UserCreated, payload);
        assert_eq!(event.field("email"), Some("a@b.com"));
        assert_eq!(event.field("age"), None);
        assert_eq!(event.field("missing"), None);
    }
}
