use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::models::event::{DomainEvent, Topic};

/// Where emitted events go. The broker client implements this; tests use
/// in-memory sinks.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), ServiceError>;
}

/// Best-effort publisher invoked by write use cases after their local
/// persistence commits.
///
/// Publish failures are always swallowed: the write has already succeeded
/// and its caller must not see a secondary-effect failure as a primary
/// one. Failures stay observable through logs and the failed counter.
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    published: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterStats {
    pub published: u64,
    pub failed: u64,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub async fn emit(&self, topic: Topic, payload: HashMap<String, JsonValue>) {
        let event = DomainEvent::new(topic, payload);

        match self.sink.publish(&event).await {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                debug!(topic = %topic, "Event published");
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    topic = %topic,
                    error = %e,
                    "Event publish failed after committed write"
                );
            }
        }
    }

    pub fn stats(&self) -> EmitterStats {
        EmitterStats {
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
