pub mod domain;
pub mod garde;
pub mod nats;
pub mod postgres;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockClock;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceStateRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEntryRepository;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamConsumer;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockPullConsumer;
