use async_trait::async_trait;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        BasicRejectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::info;

use crate::config::Config;
use crate::emitter::EventSink;
use crate::error::ServiceError;
use crate::models::event::{DomainEvent, Topic};

/// RabbitMQ transport behind the topic contract: a durable topic exchange
/// where each event kind is a routing key, and one durable queue per
/// consumer group so instances of a service load-balance without
/// double-processing within the group.
pub struct BrokerClient {
    channel: Channel,
    exchange: String,
}

impl BrokerClient {
    pub async fn connect(config: &Config) -> Result<Self, ServiceError> {
        let connection = Connection::connect(&config.amqp_url, ConnectionProperties::default())
            .await
            .map_err(|e| ServiceError::Broker(format!("failed to connect to broker: {}", e)))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| ServiceError::Broker(format!("channel creation failed: {}", e)))?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| ServiceError::Broker(format!("failed to set up QoS: {}", e)))?;

        channel
            .exchange_declare(
                &config.event_exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ServiceError::Broker(format!("failed to declare exchange: {}", e)))?;

        info!(exchange = %config.event_exchange, "Broker connection established");

        Ok(Self {
            channel,
            exchange: config.event_exchange.clone(),
        })
    }

    /// Declares the group's durable queue, binds it to the given topics and
    /// starts consuming. One queue per consumer group identity.
    pub async fn subscribe(
        &self,
        consumer_group: &str,
        topics: &[Topic],
    ) -> Result<Consumer, ServiceError> {
        self.channel
            .queue_declare(
                consumer_group,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ServiceError::Broker(format!("failed to declare group queue: {}", e)))?;

        for topic in topics {
            self.channel
                .queue_bind(
                    consumer_group,
                    &self.exchange,
                    topic.as_str(),
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    ServiceError::Broker(format!("failed to bind topic {}: {}", topic, e))
                })?;
        }

        let consumer = self
            .channel
            .basic_consume(
                consumer_group,
                consumer_group,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| ServiceError::Broker(format!("failed to create consumer: {}", e)))?;

        info!(
            queue = consumer_group,
            topics = topics.len(),
            "Consumer created for group queue"
        );

        Ok(consumer)
    }

    pub async fn acknowledge(&self, delivery_tag: u64) -> Result<(), ServiceError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| ServiceError::Broker(format!("failed to acknowledge message: {}", e)))?;

        Ok(())
    }

    pub async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), ServiceError> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(|e| ServiceError::Broker(format!("failed to reject message: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl EventSink for BrokerClient {
    /// At-most-once publish: the persistent message is handed to the channel
    /// without awaiting broker confirmation.
    async fn publish(&self, event: &DomainEvent) -> Result<(), ServiceError> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| ServiceError::Broker(format!("failed to encode event: {}", e)))?;

        self.channel
            .basic_publish(
                &self.exchange,
                event.topic.as_str(),
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| ServiceError::Broker(format!("failed to publish event: {}", e)))?;

        Ok(())
    }
}
