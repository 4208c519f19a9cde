use crate::domain::{
    DomainError, DomainResult, Entry, EntryMeasurements, EntryReading, EntryRepository,
    EntryStatus, ListEntriesRepoInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracing::{debug, instrument, warn};

/// Entry row for PostgreSQL storage; measurement columns are NULL for faulty readings
#[derive(Debug, Clone)]
pub struct EntryRow {
    pub entry_uuid: String,
    pub device_id: String,
    pub status: i16,
    pub created_date: i64,
    pub accl_x: Option<Decimal>,
    pub accl_y: Option<Decimal>,
    pub accl_z: Option<Decimal>,
    pub gyro_x: Option<Decimal>,
    pub gyro_y: Option<Decimal>,
    pub gyro_z: Option<Decimal>,
    pub roll: Option<i32>,
    pub pitch: Option<i32>,
    pub rain: Option<Decimal>,
    pub soil: Option<Decimal>,
}

impl From<&Row> for EntryRow {
    fn from(row: &Row) -> Self {
        EntryRow {
            entry_uuid: row.get(0),
            device_id: row.get(1),
            status: row.get(2),
            created_date: row.get(3),
            accl_x: row.get(4),
            accl_y: row.get(5),
            accl_z: row.get(6),
            gyro_x: row.get(7),
            gyro_y: row.get(8),
            gyro_z: row.get(9),
            roll: row.get(10),
            pitch: row.get(11),
            rain: row.get(12),
            soil: row.get(13),
        }
    }
}

impl TryFrom<EntryRow> for Entry {
    type Error = DomainError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let status = EntryStatus::try_from(i64::from(row.status)).map_err(|_| {
            DomainError::CorruptEntry(format!("{}: status {}", row.entry_uuid, row.status))
        })?;

        let reading = match status {
            EntryStatus::SensorError => EntryReading::SensorError,
            EntryStatus::Ok => {
                let missing = || {
                    DomainError::CorruptEntry(format!(
                        "{}: missing measurement column",
                        row.entry_uuid
                    ))
                };
                EntryReading::Ok(EntryMeasurements {
                    accl_x: row.accl_x.ok_or_else(missing)?,
                    accl_y: row.accl_y.ok_or_else(missing)?,
                    accl_z: row.accl_z.ok_or_else(missing)?,
                    gyro_x: row.gyro_x.ok_or_else(missing)?,
                    gyro_y: row.gyro_y.ok_or_else(missing)?,
                    gyro_z: row.gyro_z.ok_or_else(missing)?,
                    roll: row.roll.ok_or_else(missing)?,
                    pitch: row.pitch.ok_or_else(missing)?,
                    rain: row.rain.ok_or_else(missing)?,
                    soil: row.soil.ok_or_else(missing)?,
                })
            }
        };

        Ok(Entry {
            entry_uuid: row.entry_uuid,
            device_id: row.device_id,
            created_date: row.created_date,
            reading,
        })
    }
}

/// PostgreSQL implementation of EntryRepository trait
#[derive(Clone)]
pub struct PostgresEntryRepository {
    client: PostgresClient,
}

impl PostgresEntryRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntryRepository for PostgresEntryRepository {
    #[instrument(skip(self, entry), fields(entry_uuid = %entry.entry_uuid, device_id = %entry.device_id))]
    async fn insert_entry(&self, entry: Entry) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let status = entry.status().code();
        let m = entry.measurements();

        let rows = conn
            .execute(
                "INSERT INTO entries (entry_uuid, device_id, status, created_date,
                                      accl_x, accl_y, accl_z, gyro_x, gyro_y, gyro_z,
                                      roll, pitch, rain, soil)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                 ON CONFLICT (entry_uuid) DO NOTHING",
                &[
                    &entry.entry_uuid,
                    &entry.device_id,
                    &status,
                    &entry.created_date,
                    &m.map(|m| m.accl_x),
                    &m.map(|m| m.accl_y),
                    &m.map(|m| m.accl_z),
                    &m.map(|m| m.gyro_x),
                    &m.map(|m| m.gyro_y),
                    &m.map(|m| m.gyro_z),
                    &m.map(|m| m.roll),
                    &m.map(|m| m.pitch),
                    &m.map(|m| m.rain),
                    &m.map(|m| m.soil),
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows == 0 {
            warn!(entry_uuid = %entry.entry_uuid, "entry already stored, keeping original");
            return Ok(false);
        }

        debug!(entry_uuid = %entry.entry_uuid, status, "stored entry");
        Ok(true)
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id, limit = input.limit))]
    async fn list_entries(&self, input: ListEntriesRepoInput) -> DomainResult<Vec<Entry>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        // No ORDER BY: the sample is whatever the scan yields first
        let rows = conn
            .query(
                "SELECT entry_uuid, device_id, status, created_date,
                        accl_x, accl_y, accl_z, gyro_x, gyro_y, gyro_z,
                        roll, pitch, rain, soil
                 FROM entries
                 WHERE device_id = $1 AND status = $2
                 LIMIT $3",
                &[&input.device_id, &input.status.code(), &input.limit],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let entries = rows
            .iter()
            .map(|row| Entry::try_from(EntryRow::from(row)))
            .collect::<DomainResult<Vec<_>>>()?;

        debug!(
            "found {} entries for device: {}",
            entries.len(),
            input.device_id
        );

        Ok(entries)
    }
}
