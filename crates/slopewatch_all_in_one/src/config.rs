use config::{Config, ConfigError, Environment};
use ingest_worker::domain::{RiskAggregatorConfig, TrendPairPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// OTLP gRPC collector endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream carrying sensor events
    #[serde(default = "default_nats_sensor_stream")]
    pub nats_sensor_stream: String,

    /// Subject pattern for the consumer filter
    #[serde(default = "default_nats_sensor_subject")]
    pub nats_sensor_subject: String,

    /// Durable consumer name
    #[serde(default = "default_nats_consumer_name")]
    pub nats_consumer_name: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Delivery attempts per message before JetStream gives up
    #[serde(default = "default_nats_max_deliver")]
    pub nats_max_deliver: i64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    // Risk aggregation
    /// Entries retrieved per aggregation
    #[serde(default = "default_risk_sample_limit")]
    pub risk_sample_limit: i64,

    /// Minimum OK entries before a non-zero risk factor is computed
    #[serde(default = "default_risk_min_history")]
    pub risk_min_history: usize,

    /// earliest or latest
    #[serde(default)]
    pub risk_trend_pair: TrendPairPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "slopewatch".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_sensor_stream() -> String {
    "sensor_readings".to_string()
}

fn default_nats_sensor_subject() -> String {
    "sensor_readings.>".to_string()
}

fn default_nats_consumer_name() -> String {
    "slopewatch-ingest".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_nats_max_deliver() -> i64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "slopewatch".to_string()
}

fn default_postgres_username() -> String {
    "slopewatch".to_string()
}

fn default_postgres_password() -> String {
    "slopewatch".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_risk_sample_limit() -> i64 {
    10
}

fn default_risk_min_history() -> usize {
    3
}

impl ServiceConfig {
    /// Load configuration from `SLOPEWATCH_`-prefixed environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("SLOPEWATCH"))
            .build()?
            .try_deserialize()
    }

    pub fn risk_config(&self) -> RiskAggregatorConfig {
        RiskAggregatorConfig {
            sample_limit: self.risk_sample_limit,
            min_history: self.risk_min_history,
            trend_pair: self.risk_trend_pair,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests mutate process environment; run them one at a time
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SLOPEWATCH_LOG_LEVEL",
        "SLOPEWATCH_NATS_MAX_DELIVER",
        "SLOPEWATCH_RISK_TREND_PAIR",
        "SLOPEWATCH_RISK_SAMPLE_LIMIT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.nats_sensor_stream, "sensor_readings");
        assert_eq!(config.nats_max_deliver, 5);
        assert_eq!(config.risk_config(), RiskAggregatorConfig::default());
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("SLOPEWATCH_LOG_LEVEL", "debug");
        std::env::set_var("SLOPEWATCH_NATS_MAX_DELIVER", "2");
        std::env::set_var("SLOPEWATCH_RISK_TREND_PAIR", "latest");
        std::env::set_var("SLOPEWATCH_RISK_SAMPLE_LIMIT", "25");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.nats_max_deliver, 2);

        let risk = config.risk_config();
        assert_eq!(risk.trend_pair, TrendPairPolicy::Latest);
        assert_eq!(risk.sample_limit, 25);
        assert_eq!(risk.min_history, 3);

        clear_env();
    }
}
