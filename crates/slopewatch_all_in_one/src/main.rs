mod config;

use common::domain::SystemClock;
use common::nats::NatsClient;
use common::postgres::{
    ensure_schema, PostgresClient, PostgresConfig, PostgresDeviceStateRepository,
    PostgresEntryRepository,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use config::ServiceConfig;
use ingest_worker::{IngestWorker, IngestWorkerConfig, IngestWorkerDependencies};
use slopewatch_runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting slopewatch service"
    );
    debug!("Configuration: {:?}", config);

    let (dependencies, nats_client) = match initialize_shared_dependencies(&config).await {
        Ok(deps) => deps,
        Err(e) => {
            error!("Failed to initialize shared dependencies: {:#}", e);
            std::process::exit(1);
        }
    };

    let ingest_worker = match IngestWorker::new(
        dependencies,
        nats_client.clone(),
        IngestWorkerConfig {
            stream: config.nats_sensor_stream.clone(),
            subject: config.nats_sensor_subject.clone(),
            consumer_name: config.nats_consumer_name.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            max_deliver: config.nats_max_deliver,
            risk: config.risk_config(),
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize ingest worker: {:#}", e);
            std::process::exit(1);
        }
    };

    Runner::new()
        .with_named_process("ingest_worker", ingest_worker.into_runner_process())
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            if let Ok(client) = Arc::try_unwrap(nats_client) {
                client.close().await;
            }
            shutdown_telemetry(telemetry_providers);
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;
}

async fn initialize_shared_dependencies(
    config: &ServiceConfig,
) -> anyhow::Result<(IngestWorkerDependencies, Arc<NatsClient>)> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);

    info!("Initializing PostgreSQL...");
    let postgres_client = PostgresClient::new(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
    })?;
    tokio::time::timeout(startup_timeout, postgres_client.ping())
        .await
        .map_err(|_| anyhow::anyhow!("timed out connecting to PostgreSQL"))??;
    ensure_schema(&postgres_client).await?;

    let dependencies = IngestWorkerDependencies {
        entry_repository: Arc::new(PostgresEntryRepository::new(postgres_client.clone())),
        device_state_repository: Arc::new(PostgresDeviceStateRepository::new(postgres_client)),
        clock: Arc::new(SystemClock),
    };

    info!("Initializing NATS...");
    let nats_client = Arc::new(NatsClient::connect(&config.nats_url, startup_timeout).await?);
    nats_client.ensure_stream(&config.nats_sensor_stream).await?;

    Ok((dependencies, nats_client))
}
