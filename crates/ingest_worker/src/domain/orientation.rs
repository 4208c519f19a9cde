use chrono::{DateTime, Utc};
use common::domain::{Acceleration, Clock, SensorReading};
use std::sync::Arc;
use tracing::debug;

/// Radians-to-degrees factor used for tilt angles.
/// Kept at 57.3 rather than 180/π so stored angles match existing records.
pub const DEGREES_PER_RADIAN: f64 = 57.3;

/// Tilt of the sensor housing, in whole degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    /// [0, 180]
    pub roll: i32,
    /// [0, 90]
    pub pitch: i32,
}

impl Orientation {
    /// Two-axis tilt from a three-axis accelerometer sample.
    ///
    /// The board is mounted vertically, so the sensor's z axis is the logical
    /// y axis and its y axis is the logical z axis.
    pub fn from_acceleration(acceleration: &Acceleration) -> Self {
        let x = acceleration.x;
        let y = acceleration.z;
        let z = acceleration.y;

        let roll = y.atan2(z).abs() * DEGREES_PER_RADIAN;
        let pitch = (-x).atan2((y * y + z * z).sqrt()).abs() * DEGREES_PER_RADIAN;

        Self {
            roll: roll.round_ties_even() as i32,
            pitch: pitch.round_ties_even() as i32,
        }
    }
}

/// Server-side enrichment of one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
    /// UNIX seconds
    pub timestamp: i64,
    pub orientation: Orientation,
}

/// Stamps readings with ingestion time and derives their orientation
pub struct OrientationDeriver {
    clock: Arc<dyn Clock>,
}

impl OrientationDeriver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn derive(&self, reading: &SensorReading) -> Derivation {
        let timestamp = epoch_seconds(self.clock.now());
        let orientation = Orientation::from_acceleration(&reading.acceleration);

        debug!(
            entry_uuid = %reading.entry_uuid,
            timestamp,
            roll = orientation.roll,
            pitch = orientation.pitch,
            "derived timestamp and orientation"
        );

        Derivation {
            timestamp,
            orientation,
        }
    }
}

/// UNIX time rounded to the nearest whole second
pub fn epoch_seconds(now: DateTime<Utc>) -> i64 {
    now.timestamp() + i64::from(now.timestamp_subsec_millis() >= 500)
}
