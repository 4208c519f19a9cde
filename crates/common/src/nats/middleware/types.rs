use async_nats::HeaderMap;
use bytes::Bytes;

/// One NATS message handed to a tower service.
///
/// Owns all message data so it can move through middleware layers freely.
#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    pub subject: String,
    pub payload: Bytes,
    /// Carries the publisher's trace context when present
    pub headers: Option<HeaderMap>,
}

impl ConsumeRequest {
    pub fn new(subject: String, payload: Bytes, headers: Option<HeaderMap>) -> Self {
        Self {
            subject,
            payload,
            headers,
        }
    }
}

/// Outcome of handling one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeResponse {
    /// Handled; acknowledge so it is not redelivered
    Ack,
    /// Failed; reject so JetStream redelivers it
    Nak(Option<String>),
}

impl ConsumeResponse {
    pub fn ack() -> Self {
        Self::Ack
    }

    pub fn nak(reason: impl Into<String>) -> Self {
        Self::Nak(Some(reason.into()))
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    pub fn is_nak(&self) -> bool {
        matches!(self, Self::Nak(_))
    }
}
