use crate::domain::entry::EntryStatus;
use crate::domain::result::{DomainError, DomainResult};
use crate::garde::validate_struct;
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Inbound sensor event exactly as published by the device gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SensorEvent {
    #[serde(rename = "entryUUID")]
    #[garde(length(min = 1))]
    pub entry_uuid: String,

    #[serde(rename = "deviceID")]
    #[garde(length(min = 1))]
    pub device_id: String,

    /// 0 = OK, -1 = sensor error
    #[garde(skip)]
    pub status: i64,

    #[garde(skip)]
    pub accl_x: f64,
    #[garde(skip)]
    pub accl_y: f64,
    #[garde(skip)]
    pub accl_z: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub gyro_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub gyro_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub gyro_z: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub rain: Option<f64>,
    /// Domain range [0, 1023]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(inner(range(min = 0.0, max = 1023.0)))]
    pub soil: Option<f64>,
}

/// Raw accelerometer axes in the sensor's own (unremapped) frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Measurements only present on valid readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMeasurements {
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    pub rain: f64,
    pub soil: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingPayload {
    SensorError,
    Ok(RawMeasurements),
}

/// A validated sensor event
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub entry_uuid: String,
    pub device_id: String,
    pub acceleration: Acceleration,
    pub payload: ReadingPayload,
}

impl SensorReading {
    pub fn status(&self) -> EntryStatus {
        match self.payload {
            ReadingPayload::SensorError => EntryStatus::SensorError,
            ReadingPayload::Ok(_) => EntryStatus::Ok,
        }
    }
}

impl SensorEvent {
    /// Validate the event at the ingestion boundary.
    ///
    /// Rejects empty identifiers, unknown status codes, soil outside
    /// [0, 1023] and OK events missing any gyroscope, rain or soil value.
    /// Measurements sent alongside a sensor-error status are dropped
    /// unchecked.
    pub fn into_reading(mut self) -> DomainResult<SensorReading> {
        let status = EntryStatus::try_from(self.status)?;
        if status == EntryStatus::SensorError {
            self.gyro_x = None;
            self.gyro_y = None;
            self.gyro_z = None;
            self.rain = None;
            self.soil = None;
        }

        validate_struct(&self)?;
        let acceleration = Acceleration {
            x: self.accl_x,
            y: self.accl_y,
            z: self.accl_z,
        };

        let payload = match status {
            EntryStatus::SensorError => ReadingPayload::SensorError,
            EntryStatus::Ok => ReadingPayload::Ok(RawMeasurements {
                gyro_x: self.gyro_x.ok_or(DomainError::MissingMeasurement("gyro_x"))?,
                gyro_y: self.gyro_y.ok_or(DomainError::MissingMeasurement("gyro_y"))?,
                gyro_z: self.gyro_z.ok_or(DomainError::MissingMeasurement("gyro_z"))?,
                rain: self.rain.ok_or(DomainError::MissingMeasurement("rain"))?,
                soil: self.soil.ok_or(DomainError::MissingMeasurement("soil"))?,
            }),
        };

        Ok(SensorReading {
            entry_uuid: self.entry_uuid,
            device_id: self.device_id,
            acceleration,
            payload,
        })
    }
}
