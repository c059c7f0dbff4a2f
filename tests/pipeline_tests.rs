use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use minicrm::error::ServiceError;
use minicrm::models::event::{DomainEvent, Topic};
use minicrm::models::notification::{NotificationRecord, NotificationStatus};
use minicrm::pipeline::{AuditStore, NotificationChannel, NotificationPipeline};

#[derive(Default)]
struct RecordingChannel {
    deliveries: Mutex<Vec<(String, String, String)>>,
    fail_with: Option<fn() -> ServiceError>,
}

impl RecordingChannel {
    fn failing() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            fail_with: Some(|| {
                ServiceError::SideEffect("mail relay rejected message".to_string())
            }),
        }
    }

    fn failing_with_timeout() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            fail_with: Some(|| ServiceError::Transient {
                status: None,
                message: "request timed out after 1000ms".to_string(),
            }),
        }
    }

    fn delivery_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn deliver(&self, to: &str, title: &str, body: &str) -> Result<(), ServiceError> {
        if let Some(fail_with) = self.fail_with {
            return Err(fail_with());
        }

        self.deliveries
            .lock()
            .unwrap()
            .push((to.to_string(), title.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct MemoryAuditStore {
    records: Mutex<Vec<NotificationRecord>>,
}

impl MemoryAuditStore {
    fn records(&self) -> Vec<NotificationRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn record(&self, record: &NotificationRecord) -> Result<(), ServiceError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn pipeline_with(
    channel: RecordingChannel,
    store: Arc<MemoryAuditStore>,
) -> (NotificationPipeline, Arc<RecordingChannel>) {
    let channel = Arc::new(channel);
    let pipeline = NotificationPipeline::new(channel.clone(), store);
    (pipeline, channel)
}

fn welcome_event() -> DomainEvent {
    event(
        Topic::UserCreated,
        &[
            ("userId", json!("u1")),
            ("email", json!("a@b.com")),
            ("firstName", json!("Jo")),
            ("lastName", json!("Doe")),
            ("role", json!("sales_rep")),
        ],
    )
}

fn event(topic: Topic, fields: &[(&str, JsonValue)]) -> DomainEvent {
    let payload: HashMap<String, JsonValue> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    DomainEvent::new(topic, payload)
}

/// Test: A valid user.created event sends the welcome email and records Sent
#[tokio::test]
async fn test_welcome_email_sent_and_recorded() -> Result<()> {
    let store = Arc::new(MemoryAuditStore::default());
    let (pipeline, channel) = pipeline_with(RecordingChannel::default(), store.clone());

    pipeline.handle(&welcome_event()).await?;

    let deliveries = channel.deliveries.lock().unwrap().clone();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "a@b.com");

    let records = store.records();
    assert_eq!(records.len(), 1, "exactly one record per accepted event");
    assert_eq!(records[0].status, NotificationStatus::Sent);
    assert_eq!(records[0].title, "Welcome to MiniCRM!");
    assert!(records[0].body.contains("Jo"));
    assert!(records[0].body.contains("sales_rep"));
    assert_eq!(records[0].recipient, "a@b.com");
    assert!(records[0].error_detail.is_none());

    Ok(())
}

/// Test: A malformed recipient fails validation before the channel is touched
#[tokio::test]
async fn test_invalid_email_short_circuits_side_effect() -> Result<()> {
    let store = Arc::new(MemoryAuditStore::default());
    let (pipeline, channel) = pipeline_with(RecordingChannel::default(), store.clone());

    let bad = event(
        Topic::UserCreated,
        &[
            ("userId", json!("u1")),
            ("email", json!("not-an-email")),
            ("firstName", json!("Jo")),
            ("role", json!("sales_rep")),
        ],
    );

    let err = pipeline.handle(&bad).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    assert_eq!(channel.delivery_count(), 0, "side effect must never run");

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, NotificationStatus::Failed);
    let detail = records[0].error_detail.as_deref().unwrap_or_default();
    assert!(
        detail.contains("invalid email format"),
        "error detail should cite the format failure: {detail}"
    );

    Ok(())
}

/// Test: A missing required field is recorded as Failed and re-raised
#[tokio::test]
async fn test_missing_field_recorded_and_reraised() -> Result<()> {
    let store = Arc::new(MemoryAuditStore::default());
    let (pipeline, channel) = pipeline_with(RecordingChannel::default(), store.clone());

    let incomplete = event(
        Topic::UserCreated,
        &[("userId", json!("u1")), ("email", json!("a@b.com"))],
    );

    let err = pipeline.handle(&incomplete).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(err.to_string().contains("firstName"));

    assert_eq!(channel.delivery_count(), 0);

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, NotificationStatus::Failed);
    assert!(records[0].error_detail.is_some());

    Ok(())
}

/// Test: A channel failure is recorded as Failed, then re-raised to the harness
#[tokio::test]
async fn test_side_effect_failure_recorded_then_reraised() -> Result<()> {
    let store = Arc::new(MemoryAuditStore::default());
    let (pipeline, _) = pipeline_with(RecordingChannel::failing(), store.clone());

    let err = pipeline.handle(&welcome_event()).await.unwrap_err();
    assert!(matches!(err, ServiceError::SideEffect(_)));

    let records = store.records();
    assert_eq!(records.len(), 1, "record written even when the send failed");
    assert_eq!(records[0].status, NotificationStatus::Failed);
    assert_eq!(
        records[0].error_detail.as_deref(),
        Some("side effect failed: mail relay rejected message"),
        "channel errors must be recorded without being wrapped a second time"
    );

    Ok(())
}

/// Test: A non-side-effect channel failure is wrapped exactly once
#[tokio::test]
async fn test_channel_transport_failure_wrapped_once() -> Result<()> {
    let store = Arc::new(MemoryAuditStore::default());
    let (pipeline, _) = pipeline_with(RecordingChannel::failing_with_timeout(), store.clone());

    let err = pipeline.handle(&welcome_event()).await.unwrap_err();
    assert!(matches!(err, ServiceError::SideEffect(_)));

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].error_detail.as_deref(),
        Some("side effect failed: transient failure: request timed out after 1000ms")
    );

    Ok(())
}

/// Test: Reprocessing the same event yields two independent records
#[tokio::test]
async fn test_redelivery_creates_second_record() -> Result<()> {
    let store = Arc::new(MemoryAuditStore::default());
    let (pipeline, channel) = pipeline_with(RecordingChannel::default(), store.clone());

    let event = welcome_event();
    pipeline.handle(&event).await?;
    pipeline.handle(&event).await?;

    let records = store.records();
    assert_eq!(records.len(), 2, "no deduplication across redeliveries");
    assert_ne!(records[0].id, records[1].id);
    assert_eq!(channel.delivery_count(), 2, "side effect may run twice");

    Ok(())
}

/// Test: A topic without a template fails validation and is still recorded
#[tokio::test]
async fn test_unsubscribed_topic_is_recorded_as_failed() -> Result<()> {
    let store = Arc::new(MemoryAuditStore::default());
    let (pipeline, channel) = pipeline_with(RecordingChannel::default(), store.clone());

    let unexpected = event(Topic::UserDeleted, &[("userId", json!("u1"))]);

    let err = pipeline.handle(&unexpected).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    assert_eq!(channel.delivery_count(), 0);
    assert_eq!(store.records().len(), 1);
    assert_eq!(store.records()[0].status, NotificationStatus::Failed);

    Ok(())
}

/// Test: Raw broker payloads parse into events before processing
#[tokio::test]
async fn test_process_accepts_wire_payload() -> Result<()> {
    let store = Arc::new(MemoryAuditStore::default());
    let (pipeline, _) = pipeline_with(RecordingChannel::default(), store.clone());

    let raw = serde_json::to_string(&welcome_event())?;
    pipeline.process(&raw).await?;

    assert_eq!(store.records().len(), 1);
    assert_eq!(store.records()[0].status, NotificationStatus::Sent);

    Ok(())
}

/// Test: Unparseable payloads are rejected without leaving a record
#[tokio::test]
async fn test_malformed_payload_leaves_no_record() -> Result<()> {
    let store = Arc::new(MemoryAuditStore::default());
    let (pipeline, channel) = pipeline_with(RecordingChannel::default(), store.clone());

    let err = pipeline.process("{not json").await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    assert_eq!(channel.delivery_count(), 0);
    assert!(store.records().is_empty(), "unaccepted events leave no audit row");

    Ok(())
}
