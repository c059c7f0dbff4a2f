use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::ServiceError;
use crate::models::event::Topic;
use crate::models::notification::NotificationType;

/// Message shape for one subscribed topic. The payload keys referenced here
/// are part of the topic contract and must match what publishers emit.
pub struct MessageTemplate {
    pub topic: Topic,
    pub notification_type: NotificationType,
    pub recipient_field: &'static str,
    pub required_fields: &'static [&'static str],
    pub title: &'static str,
    pub body: &'static str,
}

static TEMPLATES: [MessageTemplate; 3] = [
    MessageTemplate {
        topic: Topic::UserCreated,
        notification_type: NotificationType::Email,
        recipient_field: "email",
        required_fields: &["email", "firstName", "role"],
        title: "Welcome to MiniCRM!",
        body: "Hi {{firstName}}, welcome aboard! Your {{role}} account is ready to use.",
    },
    MessageTemplate {
        topic: Topic::LeadAssigned,
        notification_type: NotificationType::Email,
        recipient_field: "assigneeEmail",
        required_fields: &["assigneeEmail", "leadName"],
        title: "A lead was assigned to you",
        body: "Lead {{leadName}} is now assigned to you. Time to reach out!",
    },
    MessageTemplate {
        topic: Topic::LeadStatusChanged,
        notification_type: NotificationType::Email,
        recipient_field: "email",
        required_fields: &["email", "leadName", "newStatus"],
        title: "Your request status changed",
        body: "Hi, the status of {{leadName}} moved to {{newStatus}}.",
    },
];

/// Template for a topic the consumer handles, None otherwise.
pub fn template_for(topic: Topic) -> Option<&'static MessageTemplate> {
    TEMPLATES.iter().find(|t| t.topic == topic)
}

/// Topics the notification consumer binds its queue to.
pub fn subscribed_topics() -> Vec<Topic> {
    TEMPLATES.iter().map(|t| t.topic).collect()
}

#[derive(Debug)]
pub struct RenderedMessage {
    pub title: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn render(
        &self,
        variables: &HashMap<String, JsonValue>,
    ) -> Result<RenderedMessage, ServiceError> {
        Ok(RenderedMessage {
            title: replace_variables(self.title, variables)?,
            body: replace_variables(self.body, variables)?,
        })
    }
}

fn replace_variables(
    template: &str,
    variables: &HashMap<String, JsonValue>,
) -> Result<String, ServiceError> {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);

        let replacement = match value {
            JsonValue::String(s) => s.clone(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            JsonValue::Null => String::new(),
            _ => {
                return Err(ServiceError::Validation(format!(
                    "unsupported variable type for field '{}'",
                    key
                )));
            }
        };

        result = result.replace(&placeholder, &replacement);
    }

    if let Some(start) = result.find("{{")
        && let Some(len) = result[start..].find("}}")
    {
        let end = start + len + 2;
        let missing_var = &result[start..end];

        warn!(
            missing_variable = %missing_var,
            "Template contains unreplaced variable"
        );

        return Err(ServiceError::Validation(format!(
            "missing variable in template: {}",
            missing_var
        )));
    }

    Ok(result)
}
