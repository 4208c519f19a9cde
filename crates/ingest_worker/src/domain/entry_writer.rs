use crate::domain::Derivation;
use common::domain::{
    DomainResult, Entry, EntryMeasurements, EntryReading, EntryRepository, ReadingPayload,
    SensorReading,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Persists each reading as a new immutable entry
pub struct EntryWriter {
    entry_repository: Arc<dyn EntryRepository>,
}

impl EntryWriter {
    pub fn new(entry_repository: Arc<dyn EntryRepository>) -> Self {
        Self { entry_repository }
    }

    /// Shape the stored entry for a reading.
    ///
    /// Sensor-error readings keep only identity, status and creation time.
    pub fn build_entry(reading: &SensorReading, derivation: &Derivation) -> DomainResult<Entry> {
        let entry_reading = match &reading.payload {
            ReadingPayload::SensorError => EntryReading::SensorError,
            ReadingPayload::Ok(raw) => EntryReading::Ok(EntryMeasurements::new(
                &reading.acceleration,
                raw,
                derivation.orientation.roll,
                derivation.orientation.pitch,
            )?),
        };

        Ok(Entry {
            entry_uuid: reading.entry_uuid.clone(),
            device_id: reading.device_id.clone(),
            created_date: derivation.timestamp,
            reading: entry_reading,
        })
    }

    /// Insert the entry built for `reading`.
    ///
    /// A redelivered reading leaves the stored entry untouched but still
    /// returns the freshly built one, so its `created_date` is this
    /// delivery's timestamp rather than the stored one.
    #[instrument(skip(self, reading, derivation), fields(entry_uuid = %reading.entry_uuid, device_id = %reading.device_id))]
    pub async fn write(
        &self,
        reading: &SensorReading,
        derivation: &Derivation,
    ) -> DomainResult<Entry> {
        let entry = Self::build_entry(reading, derivation)?;

        let inserted = self.entry_repository.insert_entry(entry.clone()).await?;
        if inserted {
            debug!(status = entry.status().code(), "entry written");
        } else {
            // Stored record keeps its original created_date
            warn!("entry already present, keeping stored record");
        }

        Ok(entry)
    }
}
