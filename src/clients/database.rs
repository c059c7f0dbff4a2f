use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

use crate::error::ServiceError;
use crate::models::notification::NotificationRecord;
use crate::pipeline::AuditStore;

/// PostgreSQL-backed audit trail. One INSERT per processing attempt;
/// rows are never updated afterwards.
pub struct PgAuditStore {
    client: Client,
}

impl PgAuditStore {
    pub async fn connect(database_url: &str) -> Result<Self, ServiceError> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| ServiceError::Datastore(format!("failed to connect: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Database connection closed");
            }
        });

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| ServiceError::Datastore(format!("health check failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn record(&self, record: &NotificationRecord) -> Result<(), ServiceError> {
        let notification_type = record.notification_type.to_string();
        let status = record.status.to_string();

        self.client
            .execute(
                "INSERT INTO notifications (
                    id,
                    notification_type,
                    title,
                    body,
                    recipient,
                    status,
                    metadata,
                    error_detail,
                    created_at,
                    updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                &[
                    &record.id,
                    &notification_type,
                    &record.title,
                    &record.body,
                    &record.recipient,
                    &status,
                    &record.metadata,
                    &record.error_detail,
                    &record.created_at,
                    &record.updated_at,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    record_id = %record.id,
                    error = %e,
                    "Failed to write notification record"
                );
                ServiceError::Datastore(format!("insert failed: {}", e))
            })?;

        debug!(
            record_id = %record.id,
            status = %record.status,
            "Notification record written"
        );

        Ok(())
    }
}
