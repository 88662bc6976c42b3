//! The `extraData` blob echoed back by the gateway on callback.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationData {
    pub booking_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<Uuid>,
}

#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("extraData is empty")]
    Empty,

    #[error("extraData is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("extraData is not a correlation object: {0}")]
    Json(#[from] serde_json::Error),
}

impl CorrelationData {
    pub fn new(booking_id: Uuid, payment_id: Uuid) -> Self {
        Self {
            booking_id,
            payment_id: Some(payment_id),
        }
    }

    pub fn encode(&self) -> String {
        // Serializing two Uuid fields cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn decode(extra_data: &str) -> Result<Self, CorrelationError> {
        let trimmed = extra_data.trim();
        if trimmed.is_empty() {
            return Err(CorrelationError::Empty);
        }
        let bytes = STANDARD.decode(trimmed)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
