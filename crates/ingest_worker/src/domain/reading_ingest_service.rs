use crate::domain::{EntryWriter, OrientationDeriver, RiskAggregator};
use common::domain::{DomainResult, SensorEvent};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

/// Result of ingesting one sensor event
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub entry_uuid: String,
    pub created_date: i64,
    /// Set only when the device row was updated
    pub risk_factor: Option<Decimal>,
}

/// Domain service that runs one sensor event through the ingestion pipeline
///
/// Flow:
/// 1. Validate the event into a typed reading
/// 2. Stamp it and derive roll/pitch
/// 3. Write the entry
/// 4. Aggregate the device risk factor for OK readings
///
/// Steps run sequentially. A failure stops the pipeline and is returned as is.
pub struct ReadingIngestService {
    deriver: OrientationDeriver,
    writer: EntryWriter,
    aggregator: RiskAggregator,
}

impl ReadingIngestService {
    pub fn new(
        deriver: OrientationDeriver,
        writer: EntryWriter,
        aggregator: RiskAggregator,
    ) -> Self {
        Self {
            deriver,
            writer,
            aggregator,
        }
    }

    #[instrument(skip(self, event), fields(entry_uuid = %event.entry_uuid, device_id = %event.device_id))]
    pub async fn ingest(&self, event: SensorEvent) -> DomainResult<IngestOutcome> {
        let reading = event.into_reading()?;

        let derivation = self.deriver.derive(&reading);
        let entry = self.writer.write(&reading, &derivation).await?;
        let risk_factor = self.aggregator.aggregate(&entry).await?;

        debug!(status = entry.status().code(), "sensor event ingested");

        Ok(IngestOutcome {
            entry_uuid: entry.entry_uuid,
            created_date: entry.created_date,
            risk_factor,
        })
    }
}
