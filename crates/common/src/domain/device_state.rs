use crate::domain::result::DomainResult;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Current aggregate state of one physical sensor unit
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub device_id: String,
    /// Non-negative, unitless
    pub risk_factor: Decimal,
    /// UNIX seconds of the most recent aggregation
    pub last_updated: i64,
}

/// Input for writing a device's risk factor, creating the row if absent
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertDeviceStateRepoInput {
    pub device_id: String,
    pub risk_factor: Decimal,
    pub last_updated: i64,
}

/// Repository trait for the per-device state store
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceStateRepository: Send + Sync {
    /// Set risk factor and last-updated time in a single atomic write
    async fn upsert_device_state(&self, input: UpsertDeviceStateRepoInput) -> DomainResult<()>;

    /// Get a device's current state
    async fn get_device_state(&self, device_id: &str) -> DomainResult<Option<DeviceState>>;
}
