use crate::domain::{
    EntryWriter, OrientationDeriver, ReadingIngestService, RiskAggregator, RiskAggregatorConfig,
};
use crate::nats::SensorEventConsumer;
use common::domain::{Clock, DeviceStateRepository, EntryRepository};
use common::nats::{NatsClient, TowerConsumerConfig};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct IngestWorkerConfig {
    pub stream: String,
    pub subject: String,
    pub consumer_name: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub max_deliver: i64,
    pub risk: RiskAggregatorConfig,
}

/// Storage and clock handles shared by every invocation
pub struct IngestWorkerDependencies {
    pub entry_repository: Arc<dyn EntryRepository>,
    pub device_state_repository: Arc<dyn DeviceStateRepository>,
    pub clock: Arc<dyn Clock>,
}

pub type RunnerProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

pub struct IngestWorker {
    consumer: SensorEventConsumer,
}

impl IngestWorker {
    pub async fn new(
        dependencies: IngestWorkerDependencies,
        nats_client: Arc<NatsClient>,
        config: IngestWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing sensor ingest worker");

        let ingest_service = Arc::new(build_ingest_service(dependencies, config.risk));

        let consumer_config = TowerConsumerConfig {
            stream_name: config.stream,
            consumer_name: config.consumer_name,
            filter_subject: config.subject,
            batch_size: config.nats_batch_size,
            max_wait: Duration::from_secs(config.nats_batch_wait_secs),
            max_deliver: config.max_deliver,
        };
        let consumer = SensorEventConsumer::new(
            nats_client.create_consumer_client(),
            consumer_config,
            ingest_service,
        )
        .await?;

        info!("Sensor ingest worker initialized");

        Ok(Self { consumer })
    }

    pub fn into_runner_process(self) -> RunnerProcess {
        let consumer = self.consumer;
        Box::new(move |ctx| Box::pin(async move { consumer.run(ctx).await }))
    }
}

/// Wire the deriver, writer and aggregator over shared storage handles
pub fn build_ingest_service(
    dependencies: IngestWorkerDependencies,
    risk: RiskAggregatorConfig,
) -> ReadingIngestService {
    let IngestWorkerDependencies {
        entry_repository,
        device_state_repository,
        clock,
    } = dependencies;

    ReadingIngestService::new(
        OrientationDeriver::new(clock),
        EntryWriter::new(Arc::clone(&entry_repository)),
        RiskAggregator::new(entry_repository, device_state_repository, risk),
    )
}
