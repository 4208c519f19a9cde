use crate::domain::result::{DomainError, DomainResult};
use crate::domain::sensor_event::{Acceleration, RawMeasurements};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Health flag carried by every reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    Ok,
    SensorError,
}

impl EntryStatus {
    /// Wire and storage code for this status
    pub fn code(self) -> i16 {
        match self {
            EntryStatus::Ok => 0,
            EntryStatus::SensorError => -1,
        }
    }
}

impl TryFrom<i64> for EntryStatus {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EntryStatus::Ok),
            -1 => Ok(EntryStatus::SensorError),
            other => Err(DomainError::UnrecognizedStatus(other)),
        }
    }
}

/// Immutable record of one sensor reading as persisted in the entries store
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub entry_uuid: String,
    pub device_id: String,
    /// Server-assigned UNIX seconds
    pub created_date: i64,
    pub reading: EntryReading,
}

impl Entry {
    pub fn status(&self) -> EntryStatus {
        match self.reading {
            EntryReading::SensorError => EntryStatus::SensorError,
            EntryReading::Ok(_) => EntryStatus::Ok,
        }
    }

    pub fn measurements(&self) -> Option<&EntryMeasurements> {
        match &self.reading {
            EntryReading::Ok(measurements) => Some(measurements),
            EntryReading::SensorError => None,
        }
    }
}

/// Payload of an entry. Faulty readings carry no measurement data at all.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryReading {
    SensorError,
    Ok(EntryMeasurements),
}

/// Raw axes, derived tilt and environment values of a valid reading
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMeasurements {
    pub accl_x: Decimal,
    pub accl_y: Decimal,
    pub accl_z: Decimal,
    pub gyro_x: Decimal,
    pub gyro_y: Decimal,
    pub gyro_z: Decimal,
    /// Degrees, [0, 180]
    pub roll: i32,
    /// Degrees, [0, 90]
    pub pitch: i32,
    pub rain: Decimal,
    /// Domain range [0, 1023]
    pub soil: Decimal,
}

impl EntryMeasurements {
    /// Build persisted measurements from the wire values of a valid reading.
    ///
    /// Every float goes through [`exact_decimal`] so the stored value is the
    /// one the sensor reported, not its nearest binary approximation.
    pub fn new(
        acceleration: &Acceleration,
        raw: &RawMeasurements,
        roll: i32,
        pitch: i32,
    ) -> DomainResult<Self> {
        Ok(Self {
            accl_x: exact_decimal("accl_x", acceleration.x)?,
            accl_y: exact_decimal("accl_y", acceleration.y)?,
            accl_z: exact_decimal("accl_z", acceleration.z)?,
            gyro_x: exact_decimal("gyro_x", raw.gyro_x)?,
            gyro_y: exact_decimal("gyro_y", raw.gyro_y)?,
            gyro_z: exact_decimal("gyro_z", raw.gyro_z)?,
            roll,
            pitch,
            rain: exact_decimal("rain", raw.rain)?,
            soil: exact_decimal("soil", raw.soil)?,
        })
    }
}

/// Convert a float to a decimal through its shortest round-trip text form
pub fn exact_decimal(field: &'static str, value: f64) -> DomainResult<Decimal> {
    let text = value.to_string();
    Decimal::from_str(&text).map_err(|_| DomainError::InvalidDecimal { field, value: text })
}

/// Input for the bounded, filtered retrieval of entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntriesRepoInput {
    pub device_id: String,
    pub status: EntryStatus,
    /// Maximum number of entries returned
    pub limit: i64,
}

/// Repository trait for the append-only entries store
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Insert a new entry keyed by its UUID, never overwriting an existing one
    ///
    /// # Returns
    /// `true` if the entry was written, `false` if the UUID was already present
    async fn insert_entry(&self, entry: Entry) -> DomainResult<bool>;

    /// Retrieve up to `limit` entries matching device and status.
    /// The result has no ordering guarantee and is not necessarily the most recent entries.
    async fn list_entries(&self, input: ListEntriesRepoInput) -> DomainResult<Vec<Entry>>;
}
