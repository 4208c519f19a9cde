use crate::domain::ReadingIngestService;
use crate::nats::SensorEventConsumerService;
use anyhow::Result;
use common::nats::{
    JetStreamConsumer, NatsConsumeLoggingLayer, NatsConsumeLoggingService,
    NatsConsumeTracingLayer, NatsConsumeTracingService, TowerConsumer, TowerConsumerConfig,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::debug;

type SensorEventLayeredService =
    NatsConsumeTracingService<NatsConsumeLoggingService<SensorEventConsumerService>>;

/// Durable JetStream consumer feeding sensor events into the ingestion pipeline
pub struct SensorEventConsumer {
    consumer: TowerConsumer<SensorEventLayeredService>,
}

impl SensorEventConsumer {
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        config: TowerConsumerConfig,
        ingest_service: Arc<ReadingIngestService>,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            filter = %config.filter_subject,
            "initializing sensor event consumer with Tower middleware"
        );

        let layered_service = ServiceBuilder::new()
            .layer(NatsConsumeTracingLayer::new())
            .layer(NatsConsumeLoggingLayer::new())
            .service(SensorEventConsumerService::new(ingest_service));

        let consumer = TowerConsumer::new(jetstream, config, layered_service).await?;

        Ok(Self { consumer })
    }

    pub async fn run(self, ctx: CancellationToken) -> Result<()> {
        debug!("starting sensor event consumer");
        self.consumer.run(ctx).await
    }
}
