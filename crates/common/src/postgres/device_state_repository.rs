use crate::domain::{
    DeviceState, DeviceStateRepository, DomainError, DomainResult, UpsertDeviceStateRepoInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// PostgreSQL implementation of DeviceStateRepository trait
#[derive(Clone)]
pub struct PostgresDeviceStateRepository {
    client: PostgresClient,
}

impl PostgresDeviceStateRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceStateRepository for PostgresDeviceStateRepository {
    #[instrument(skip(self, input), fields(device_id = %input.device_id, risk_factor = %input.risk_factor))]
    async fn upsert_device_state(&self, input: UpsertDeviceStateRepoInput) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        conn.execute(
            "INSERT INTO devices (device_id, risk_factor, last_updated)
             VALUES ($1, $2, $3)
             ON CONFLICT (device_id)
             DO UPDATE SET risk_factor = EXCLUDED.risk_factor, last_updated = EXCLUDED.last_updated",
            &[&input.device_id, &input.risk_factor, &input.last_updated],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(
            "updated device state for {}: risk_factor={} last_updated={}",
            input.device_id, input.risk_factor, input.last_updated
        );

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_device_state(&self, device_id: &str) -> DomainResult<Option<DeviceState>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT device_id, risk_factor, last_updated FROM devices WHERE device_id = $1",
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| DeviceState {
            device_id: row.get(0),
            risk_factor: row.get(1),
            last_updated: row.get(2),
        }))
    }
}
