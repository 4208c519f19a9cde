use crate::domain::ReadingIngestService;
use common::domain::SensorEvent;
use common::nats::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, error, warn};

/// Tower service for ingesting individual sensor event messages.
///
/// This service:
/// 1. Decodes the JSON payload into a `SensorEvent`
/// 2. Runs it through the domain `ReadingIngestService`
/// 3. Returns Ack/Nak response
#[derive(Clone)]
pub struct SensorEventConsumerService {
    domain_service: Arc<ReadingIngestService>,
}

impl SensorEventConsumerService {
    pub fn new(domain_service: Arc<ReadingIngestService>) -> Self {
        Self { domain_service }
    }
}

impl Service<ConsumeRequest> for SensorEventConsumerService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let domain_service = Arc::clone(&self.domain_service);

        Box::pin(async move {
            let event: SensorEvent = match serde_json::from_slice(&req.payload) {
                Ok(event) => event,
                Err(e) => {
                    error!(
                        error = %e,
                        subject = %req.subject,
                        "failed to decode sensor event JSON"
                    );
                    return Ok(ConsumeResponse::nak(format!("Decode error: {}", e)));
                }
            };

            let device_id = event.device_id.clone();

            match domain_service.ingest(event).await {
                Ok(outcome) => {
                    debug!(
                        device_id = %device_id,
                        entry_uuid = %outcome.entry_uuid,
                        "successfully ingested sensor event"
                    );
                    Ok(ConsumeResponse::ack())
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        device_id = %device_id,
                        "failed to ingest sensor event"
                    );
                    Ok(ConsumeResponse::nak(e.to_string()))
                }
            }
        })
    }
}
