use std::sync::Arc;

use anyhow::{Error, Result};
use futures_util::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use minicrm::clients::{broker::BrokerClient, database::PgAuditStore, email::EmailClient};
use minicrm::config::Config;
use minicrm::models::template::subscribed_topics;
use minicrm::pipeline::NotificationPipeline;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    let broker = BrokerClient::connect(&config).await?;

    // Fail fast if the audit trail is unreachable: without it the pipeline
    // cannot honor its one-record-per-event invariant.
    let store = PgAuditStore::connect(&config.database_url).await?;
    store.health_check().await?;

    let email = EmailClient::new(&config)?;

    let pipeline = NotificationPipeline::new(Arc::new(email), Arc::new(store));

    let topics = subscribed_topics();
    let mut consumer = broker.subscribe(&config.consumer_group, &topics).await?;

    info!(
        group = %config.consumer_group,
        topics = topics.len(),
        "Notification worker started"
    );

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(error = %e, "Consumer stream error");
                continue;
            }
        };

        let payload = match std::str::from_utf8(&delivery.data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Discarding non-UTF-8 message");
                broker.reject(delivery.delivery_tag, false).await?;
                continue;
            }
        };

        match pipeline.process(payload).await {
            Ok(()) => broker.acknowledge(delivery.delivery_tag).await?,
            Err(e) => {
                // The failure is already in the audit trail. First failures
                // are requeued so the event gets one more pass (and one more
                // record); a redelivered failure is dropped.
                let requeue = !delivery.redelivered;
                warn!(error = %e, requeue, "Event processing failed");
                broker.reject(delivery.delivery_tag, requeue).await?;
            }
        }
    }

    Ok(())
}
