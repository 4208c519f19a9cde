use crate::nats::{ConsumeRequest, ConsumeResponse, JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, warn};

/// Settings for a durable pull consumer
#[derive(Debug, Clone)]
pub struct TowerConsumerConfig {
    pub stream_name: String,
    pub consumer_name: String,
    pub filter_subject: String,
    pub batch_size: usize,
    pub max_wait: Duration,
    /// Delivery attempts before JetStream stops redelivering a message
    pub max_deliver: i64,
}

/// A NATS consumer that hands every message, one at a time, to a tower service.
///
/// Each message is one independent invocation: the service decides ack or
/// nak, and a nak leaves redelivery to JetStream.
pub struct TowerConsumer<S> {
    consumer: Box<dyn PullConsumer>,
    config: TowerConsumerConfig,
    service: S,
}

impl<S> TowerConsumer<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        config: TowerConsumerConfig,
        service: S,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            filter_subject = %config.filter_subject,
            "creating tower nats consumer"
        );

        let pull_config = jetstream::consumer::pull::Config {
            name: Some(config.consumer_name.clone()),
            durable_name: Some(config.consumer_name.clone()),
            filter_subject: config.filter_subject.clone(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            max_deliver: config.max_deliver,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(pull_config, &config.stream_name)
            .await
            .context("failed to create consumer")?;

        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            "tower nats consumer created successfully"
        );

        Ok(Self {
            consumer,
            config,
            service,
        })
    }

    /// Run the consumer loop until cancellation
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        info!(
            stream = %self.config.stream_name,
            consumer = %self.config.consumer_name,
            "starting tower nats consumer"
        );

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!(
                        stream = %self.config.stream_name,
                        consumer = %self.config.consumer_name,
                        "received shutdown signal, stopping consumer"
                    );
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(
                            stream = %self.config.stream_name,
                            consumer = %self.config.consumer_name,
                            error = %e,
                            "error processing batch"
                        );
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        debug!(consumer = %self.config.consumer_name, "consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_and_process_batch(&mut self) -> Result<()> {
        let messages = self
            .consumer
            .fetch_messages(self.config.batch_size, self.config.max_wait)
            .await?;

        if messages.is_empty() {
            debug!("no messages in batch");
            return Ok(());
        }

        debug!(message_count = messages.len(), "received message batch");

        for msg in &messages {
            let request = ConsumeRequest::new(
                msg.subject.to_string(),
                Bytes::copy_from_slice(&msg.payload),
                msg.headers.clone(),
            );

            match self.handle(request).await {
                ConsumeResponse::Ack => {
                    if let Err(e) = msg.ack().await {
                        error!(subject = %msg.subject, error = %e, "failed to acknowledge message");
                    }
                }
                ConsumeResponse::Nak(reason) => {
                    warn!(
                        subject = %msg.subject,
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "rejecting message"
                    );
                    if let Err(e) = msg.ack_with(jetstream::AckKind::Nak(None)).await {
                        error!(subject = %msg.subject, error = %e, "failed to reject message");
                    }
                }
            }
        }

        Ok(())
    }

    /// Drive one request through the service; service errors become a nak
    async fn handle(&mut self, request: ConsumeRequest) -> ConsumeResponse {
        let subject = request.subject.clone();
        let result = match ServiceExt::<ConsumeRequest>::ready(&mut self.service).await {
            Ok(service) => service.call(request).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            error!(subject = %subject, error = %e, "service error processing message");
            ConsumeResponse::nak(e.to_string())
        })
    }
}
