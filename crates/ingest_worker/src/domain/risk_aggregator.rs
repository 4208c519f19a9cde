use common::domain::{
    DeviceStateRepository, DomainError, DomainResult, Entry, EntryMeasurements, EntryRepository,
    EntryStatus, ListEntriesRepoInput, UpsertDeviceStateRepoInput,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const SOIL_SCALE: Decimal = Decimal::from_parts(1023, 0, 0, false, 0);
const ROLL_SCALE: Decimal = Decimal::from_parts(180, 0, 0, false, 0);
const PITCH_SCALE: Decimal = Decimal::from_parts(90, 0, 0, false, 0);
const TWO: Decimal = Decimal::TWO;

/// Which pair of sorted history entries drives the trend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPairPolicy {
    /// First two entries of the sorted sample
    #[default]
    Earliest,
    /// Last two entries of the sorted sample
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAggregatorConfig {
    /// Cap on entries retrieved per aggregation
    pub sample_limit: i64,
    /// Below this many OK entries the risk factor is reset to zero
    pub min_history: usize,
    pub trend_pair: TrendPairPolicy,
}

impl Default for RiskAggregatorConfig {
    fn default() -> Self {
        Self {
            sample_limit: 10,
            min_history: 3,
            trend_pair: TrendPairPolicy::Earliest,
        }
    }
}

/// Derives a trend-based landslide risk factor per device
///
/// Flow:
/// 1. Retrieve a capped, unordered sample of the device's OK entries
/// 2. Sort it ascending by creation time
/// 3. Compare the composite feature of the trend pair, scaled by the current reading
/// 4. Upsert the device row
///
/// The retrieval and the upsert are not coordinated. Concurrent readings for
/// one device may overwrite each other's result.
pub struct RiskAggregator {
    entry_repository: Arc<dyn EntryRepository>,
    device_state_repository: Arc<dyn DeviceStateRepository>,
    config: RiskAggregatorConfig,
}

impl RiskAggregator {
    pub fn new(
        entry_repository: Arc<dyn EntryRepository>,
        device_state_repository: Arc<dyn DeviceStateRepository>,
        config: RiskAggregatorConfig,
    ) -> Self {
        Self {
            entry_repository,
            device_state_repository,
            config,
        }
    }

    /// Recompute and store the device's risk factor after `entry` was written.
    ///
    /// Sensor-error entries are skipped and leave the devices store untouched.
    ///
    /// # Returns
    /// The stored risk factor, or `None` when no aggregation took place
    #[instrument(skip(self, entry), fields(device_id = %entry.device_id, entry_uuid = %entry.entry_uuid))]
    pub async fn aggregate(&self, entry: &Entry) -> DomainResult<Option<Decimal>> {
        let Some(current) = entry.measurements() else {
            debug!("sensor error reading, skipping risk aggregation");
            return Ok(None);
        };

        let sample = self.sample_history(&entry.device_id).await?;
        let risk_factor = self.compute_risk_factor(&sample, current)?;

        self.device_state_repository
            .upsert_device_state(UpsertDeviceStateRepoInput {
                device_id: entry.device_id.clone(),
                risk_factor,
                last_updated: entry.created_date,
            })
            .await?;

        info!(
            risk_factor = %risk_factor,
            sample_size = sample.len(),
            "device risk factor updated"
        );

        Ok(Some(risk_factor))
    }

    /// Retrieve the capped OK history of a device, sorted ascending by creation time
    pub async fn sample_history(&self, device_id: &str) -> DomainResult<Vec<Entry>> {
        let mut sample = self
            .entry_repository
            .list_entries(ListEntriesRepoInput {
                device_id: device_id.to_string(),
                status: EntryStatus::Ok,
                limit: self.config.sample_limit,
            })
            .await?;

        sample.sort_by_key(|entry| entry.created_date);
        Ok(sample)
    }

    /// Risk factor for a sorted sample and the current reading
    pub fn compute_risk_factor(
        &self,
        sample: &[Entry],
        current: &EntryMeasurements,
    ) -> DomainResult<Decimal> {
        let min_history = self.config.min_history.max(2);
        if sample.len() < min_history {
            debug!(
                sample_size = sample.len(),
                min_history, "insufficient history, resetting risk factor"
            );
            return Ok(Decimal::ZERO);
        }

        let (a, b) = match self.config.trend_pair {
            TrendPairPolicy::Earliest => (&sample[0], &sample[1]),
            TrendPairPolicy::Latest => (&sample[sample.len() - 2], &sample[sample.len() - 1]),
        };

        let k_a = composite_feature(history_measurements(a)?)?;
        let k_b = composite_feature(history_measurements(b)?)?;
        let k_cur = composite_feature(current)?;

        let delta = k_a
            .checked_sub(k_b)
            .ok_or_else(|| overflow("trend delta"))?
            .abs();
        let risk_factor = delta
            .checked_mul(k_cur)
            .ok_or_else(|| overflow("risk factor"))?;

        debug!(k_a = %k_a, k_b = %k_b, k_cur = %k_cur, "computed risk features");
        Ok(risk_factor)
    }
}

/// `soil / 1023 + (roll / 180 + pitch / 90) / 2`, never negative
pub fn composite_feature(measurements: &EntryMeasurements) -> DomainResult<Decimal> {
    if measurements.soil < Decimal::ZERO || measurements.soil > SOIL_SCALE {
        return Err(DomainError::ValidationError(format!(
            "soil: {} outside [0, 1023]",
            measurements.soil
        )));
    }

    let soil = measurements
        .soil
        .checked_div(SOIL_SCALE)
        .ok_or_else(|| overflow("soil term"))?;
    let roll = Decimal::from(measurements.roll) / ROLL_SCALE;
    let pitch = Decimal::from(measurements.pitch) / PITCH_SCALE;

    let tilt = (roll + pitch) / TWO;
    soil.checked_add(tilt).ok_or_else(|| overflow("composite feature"))
}

fn history_measurements(entry: &Entry) -> DomainResult<&EntryMeasurements> {
    entry.measurements().ok_or_else(|| {
        DomainError::CorruptEntry(format!(
            "entry {} returned as OK history without measurements",
            entry.entry_uuid
        ))
    })
}

fn overflow(stage: &str) -> DomainError {
    DomainError::RiskComputationOverflow(stage.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{EntryReading, MockDeviceStateRepository, MockEntryRepository};
    use std::str::FromStr;

    fn measurements(soil: i64, roll: i32, pitch: i32) -> EntryMeasurements {
        EntryMeasurements {
            accl_x: Decimal::ZERO,
            accl_y: Decimal::ZERO,
            accl_z: Decimal::ONE,
            gyro_x: Decimal::ZERO,
            gyro_y: Decimal::ZERO,
            gyro_z: Decimal::ZERO,
            roll,
            pitch,
            rain: Decimal::ZERO,
            soil: Decimal::from(soil),
        }
    }

    fn ok_entry(uuid: &str, created_date: i64, soil: i64, roll: i32, pitch: i32) -> Entry {
        Entry {
            entry_uuid: uuid.to_string(),
            device_id: "D1".to_string(),
            created_date,
            reading: EntryReading::Ok(measurements(soil, roll, pitch)),
        }
    }

    /// Three prior readings plus the current one, in storage order
    fn scenario_sample() -> Vec<Entry> {
        vec![
            ok_entry("e-2", 1_000, 900, 170, 80),
            ok_entry("e-cur", 2_000, 500, 90, 45),
            ok_entry("e-0", 800, 100, 10, 5),
            ok_entry("e-1", 900, 200, 20, 10),
        ]
    }

    fn approx(value: Decimal, expected: &str) -> bool {
        let expected = Decimal::from_str(expected).unwrap();
        (value - expected).abs() < Decimal::new(1, 9)
    }

    fn aggregator(
        entry_repository: MockEntryRepository,
        device_state_repository: MockDeviceStateRepository,
        config: RiskAggregatorConfig,
    ) -> RiskAggregator {
        RiskAggregator::new(
            Arc::new(entry_repository),
            Arc::new(device_state_repository),
            config,
        )
    }

    #[test]
    fn test_composite_feature() {
        let k = composite_feature(&measurements(500, 90, 45)).unwrap();
        assert!(approx(k, "0.988758553274682306940371456"));

        let flat = composite_feature(&measurements(0, 0, 0)).unwrap();
        assert_eq!(flat, Decimal::ZERO);
    }

    #[test]
    fn test_out_of_range_soil_is_rejected() {
        let negative = composite_feature(&measurements(-1023, 0, 0));
        let too_wet = composite_feature(&measurements(1024, 0, 0));

        assert!(matches!(negative, Err(DomainError::ValidationError(_))));
        assert!(matches!(too_wet, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_negative_current_soil_never_yields_negative_risk() {
        let aggregator = aggregator(
            MockEntryRepository::new(),
            MockDeviceStateRepository::new(),
            RiskAggregatorConfig::default(),
        );
        let sample = vec![
            ok_entry("e-0", 800, 100, 0, 0),
            ok_entry("e-1", 900, 200, 0, 0),
            ok_entry("e-cur", 1_000, -1023, 0, 0),
        ];

        let result = aggregator.compute_risk_factor(&sample, &measurements(-1023, 0, 0));

        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_current_reading_skips_upsert() {
        // Arrange
        let mut entry_repo = MockEntryRepository::new();
        entry_repo
            .expect_list_entries()
            .times(1)
            .return_once(|_| Ok(scenario_sample()));

        let mut device_repo = MockDeviceStateRepository::new();
        device_repo.expect_upsert_device_state().times(0);

        let aggregator = aggregator(entry_repo, device_repo, RiskAggregatorConfig::default());
        let current = ok_entry("e-cur", 2_000, -1, 90, 45);

        // Act
        let result = aggregator.aggregate(&current).await;

        // Assert
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_risk_factor_non_negative_over_domain() {
        let aggregator = aggregator(
            MockEntryRepository::new(),
            MockDeviceStateRepository::new(),
            RiskAggregatorConfig::default(),
        );
        for soil in [0, 1, 511, 1022, 1023] {
            for (roll, pitch) in [(0, 0), (180, 90), (45, 10)] {
                let sample = vec![
                    ok_entry("e-0", 1, 1023 - soil, 180 - roll, 90 - pitch),
                    ok_entry("e-1", 2, soil, roll, pitch),
                    ok_entry("e-2", 3, soil, roll, pitch),
                ];
                let risk = aggregator
                    .compute_risk_factor(&sample, &measurements(soil, roll, pitch))
                    .unwrap();
                assert!(risk >= Decimal::ZERO, "risk {} for soil {}", risk, soil);
            }
        }
    }

    #[tokio::test]
    async fn test_scenario_uses_earliest_pair() {
        // Arrange
        let mut entry_repo = MockEntryRepository::new();
        entry_repo
            .expect_list_entries()
            .withf(|input: &ListEntriesRepoInput| {
                input.device_id == "D1" && input.status == EntryStatus::Ok && input.limit == 10
            })
            .times(1)
            .return_once(|_| Ok(scenario_sample()));

        let mut device_repo = MockDeviceStateRepository::new();
        device_repo
            .expect_upsert_device_state()
            .withf(|input: &UpsertDeviceStateRepoInput| {
                input.device_id == "D1"
                    && input.last_updated == 2_000
                    && approx(input.risk_factor, "0.151583870744782673644654536")
            })
            .times(1)
            .return_once(|_| Ok(()));

        let aggregator = aggregator(entry_repo, device_repo, RiskAggregatorConfig::default());
        let current = ok_entry("e-cur", 2_000, 500, 90, 45);

        // Act
        let result = aggregator.aggregate(&current).await;

        // Assert
        let risk = result.unwrap().unwrap();
        assert!(approx(risk, "0.151583870744782673644654536"));
    }

    #[tokio::test]
    async fn test_latest_policy_uses_last_pair() {
        // Arrange
        let mut entry_repo = MockEntryRepository::new();
        entry_repo
            .expect_list_entries()
            .times(1)
            .return_once(|_| Ok(scenario_sample()));

        let mut device_repo = MockDeviceStateRepository::new();
        device_repo
            .expect_upsert_device_state()
            .times(1)
            .return_once(|_| Ok(()));

        let config = RiskAggregatorConfig {
            trend_pair: TrendPairPolicy::Latest,
            ..RiskAggregatorConfig::default()
        };
        let aggregator = aggregator(entry_repo, device_repo, config);
        let current = ok_entry("e-cur", 2_000, 500, 90, 45);

        // Act
        let risk = aggregator.aggregate(&current).await.unwrap().unwrap();

        // Assert
        assert!(approx(risk, "0.798594090560318920928134815"));
    }

    #[tokio::test]
    async fn test_short_history_resets_risk_to_zero() {
        // Arrange
        let mut entry_repo = MockEntryRepository::new();
        entry_repo.expect_list_entries().times(1).return_once(|_| {
            Ok(vec![
                ok_entry("e-0", 800, 100, 10, 5),
                ok_entry("e-cur", 2_000, 500, 90, 45),
            ])
        });

        let mut device_repo = MockDeviceStateRepository::new();
        device_repo
            .expect_upsert_device_state()
            .withf(|input: &UpsertDeviceStateRepoInput| {
                input.risk_factor == Decimal::ZERO && input.last_updated == 2_000
            })
            .times(1)
            .return_once(|_| Ok(()));

        let aggregator = aggregator(entry_repo, device_repo, RiskAggregatorConfig::default());
        let current = ok_entry("e-cur", 2_000, 500, 90, 45);

        // Act
        let result = aggregator.aggregate(&current).await;

        // Assert
        assert_eq!(result.unwrap(), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_sensor_error_entry_never_touches_devices() {
        // Arrange
        let mut entry_repo = MockEntryRepository::new();
        entry_repo.expect_list_entries().times(0);

        let mut device_repo = MockDeviceStateRepository::new();
        device_repo.expect_upsert_device_state().times(0);

        let aggregator = aggregator(entry_repo, device_repo, RiskAggregatorConfig::default());
        let errored = Entry {
            entry_uuid: "e-err".to_string(),
            device_id: "D1".to_string(),
            created_date: 2_000,
            reading: EntryReading::SensorError,
        };

        // Act
        let result = aggregator.aggregate(&errored).await;

        // Assert
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sample_history_is_sorted_and_repeatable() {
        // Arrange
        let mut entry_repo = MockEntryRepository::new();
        entry_repo
            .expect_list_entries()
            .times(2)
            .returning(|_| Ok(scenario_sample()));

        let aggregator = aggregator(
            entry_repo,
            MockDeviceStateRepository::new(),
            RiskAggregatorConfig::default(),
        );
        let current = measurements(500, 90, 45);

        // Act
        let first = aggregator.sample_history("D1").await.unwrap();
        let second = aggregator.sample_history("D1").await.unwrap();

        // Assert
        let dates: Vec<i64> = first.iter().map(|e| e.created_date).collect();
        assert_eq!(dates, vec![800, 900, 1_000, 2_000]);
        assert_eq!(first, second);
        assert_eq!(
            aggregator.compute_risk_factor(&first, &current).unwrap(),
            aggregator.compute_risk_factor(&second, &current).unwrap()
        );
    }

    #[tokio::test]
    async fn test_upsert_failure_propagates() {
        // Arrange
        let mut entry_repo = MockEntryRepository::new();
        entry_repo
            .expect_list_entries()
            .times(1)
            .return_once(|_| Ok(scenario_sample()));

        let mut device_repo = MockDeviceStateRepository::new();
        device_repo
            .expect_upsert_device_state()
            .times(1)
            .return_once(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("timeout"))));

        let aggregator = aggregator(entry_repo, device_repo, RiskAggregatorConfig::default());
        let current = ok_entry("e-cur", 2_000, 500, 90, 45);

        // Act
        let result = aggregator.aggregate(&current).await;

        // Assert
        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }

    #[test]
    fn test_corrupt_history_entry_is_rejected() {
        let aggregator = aggregator(
            MockEntryRepository::new(),
            MockDeviceStateRepository::new(),
            RiskAggregatorConfig::default(),
        );
        let mut sample = scenario_sample();
        sample.sort_by_key(|e| e.created_date);
        sample[0].reading = EntryReading::SensorError;

        let result = aggregator.compute_risk_factor(&sample, &measurements(500, 90, 45));
        assert!(matches!(result, Err(DomainError::CorruptEntry(_))));
    }

    #[test]
    fn test_trend_pair_policy_deserializes_lowercase() {
        let policy: TrendPairPolicy = serde_json::from_str("\"latest\"").unwrap();
        assert_eq!(policy, TrendPairPolicy::Latest);
        assert_eq!(TrendPairPolicy::default(), TrendPairPolicy::Earliest);
    }
}
