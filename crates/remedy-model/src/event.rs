use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque inbound event as delivered by the ingress collaborator
///
/// The payload is kept verbatim; nothing about its shape is assumed until
/// the normalizer inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    payload: Value,
    received_at: DateTime<Utc>,
}

impl RawEvent {
    /// Wrap a payload received now
    #[inline]
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self::received_at(payload, Utc::now())
    }

    /// Wrap a payload with an explicit receipt time
    #[inline]
    #[must_use]
    pub fn received_at(payload: Value, received_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            received_at,
        }
    }

    /// The untouched payload
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// When the ingress layer received the event
    #[inline]
    #[must_use]
    pub fn receipt_time(&self) -> DateTime<Utc> {
        self.received_at
    }
}

impl From<Value> for RawEvent {
    fn from(payload: Value) -> Self {
        Self::new(payload)
    }
}
