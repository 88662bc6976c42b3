//! Inbound gateway callbacks (IPN).
//!
//! Every path ends in an acknowledgement. Nothing is surfaced to the caller;
//! each outcome that did not change state is logged with enough context to
//! find the attempt again.

use crate::config::SignatureMode;
use crate::payments::correlation::CorrelationData;
use crate::payments::provider::PaymentProvider;
use crate::payments::signature::CallbackFields;
use crate::payments::state::CallbackOutcome;
use crate::payments::store::{CallbackApplication, CallbackUpdate, SettlementStore};
use crate::payments::types::{audit_entry, AuditKind};
use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to one callback delivery. The HTTP answer is the same for all of them.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackDisposition {
    /// Body did not carry the signed field set
    Malformed,
    /// Failed verification in strict mode
    Rejected { reason: String },
    /// `extraData` could not be decoded to a booking id
    Uncorrelated,
    /// Reached the ledger
    Settled(CallbackApplication),
    /// Storage failed; the gateway will redeliver
    StorageFailure,
}

pub struct CallbackProcessor {
    store: Arc<dyn SettlementStore>,
    provider: Arc<dyn PaymentProvider>,
    signature_mode: SignatureMode,
}

impl CallbackProcessor {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        provider: Arc<dyn PaymentProvider>,
        signature_mode: SignatureMode,
    ) -> Self {
        Self {
            store,
            provider,
            signature_mode,
        }
    }

    pub fn signature_mode(&self) -> SignatureMode {
        self.signature_mode
    }

    /// Handle a raw callback body. Never fails.
    pub async fn handle(&self, payload: JsonValue) -> CallbackDisposition {
        let fields: CallbackFields = match serde_json::from_value(payload.clone()) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "callback body is missing signed fields, ignoring");
                return CallbackDisposition::Malformed;
            }
        };

        let verification = self.provider.verify_callback(&fields);
        if !verification.valid {
            let reason = verification
                .reason
                .unwrap_or_else(|| "verification failed".to_string());
            match self.signature_mode {
                SignatureMode::Strict => {
                    warn!(
                        order_id = %fields.order_id,
                        reason = %reason,
                        "callback rejected, no state change"
                    );
                    return CallbackDisposition::Rejected { reason };
                }
                SignatureMode::Sandbox => {
                    warn!(
                        order_id = %fields.order_id,
                        reason = %reason,
                        "callback NOT verified, accepted because signature mode is sandbox"
                    );
                }
            }
        }

        let correlation = match CorrelationData::decode(&fields.extra_data) {
            Ok(correlation) => correlation,
            Err(e) => {
                warn!(
                    order_id = %fields.order_id,
                    error = %e,
                    "callback extraData undecodable, ignoring"
                );
                return CallbackDisposition::Uncorrelated;
            }
        };

        let outcome = CallbackOutcome::from_result_code(fields.result_code);
        debug!(
            order_id = %fields.order_id,
            booking_id = %correlation.booking_id,
            result_code = fields.result_code,
            outcome = ?outcome,
            "applying callback"
        );

        let update = CallbackUpdate {
            order_id: fields.order_id.clone(),
            booking_id: correlation.booking_id,
            outcome,
            amount: BigDecimal::from(fields.amount),
            provider_transaction_id: fields.trans_id.map(|id| id.to_string()),
            audit_entry: audit_entry(AuditKind::Callback, payload),
        };

        match self.store.apply_callback(update).await {
            Ok(application) => {
                log_application(&fields, &correlation, &application);
                CallbackDisposition::Settled(application)
            }
            Err(e) => {
                error!(
                    order_id = %fields.order_id,
                    booking_id = %correlation.booking_id,
                    error = %e,
                    "callback could not be applied"
                );
                CallbackDisposition::StorageFailure
            }
        }
    }
}

fn log_application(
    fields: &CallbackFields,
    correlation: &CorrelationData,
    application: &CallbackApplication,
) {
    match application {
        CallbackApplication::Applied {
            payment_id,
            status,
            booking_updated,
        } => info!(
            order_id = %fields.order_id,
            booking_id = %correlation.booking_id,
            payment_id = %payment_id,
            status = %status,
            booking_updated = booking_updated,
            "callback applied"
        ),
        CallbackApplication::Duplicate { payment_id, status } => info!(
            order_id = %fields.order_id,
            payment_id = %payment_id,
            status = %status,
            "duplicate callback delivery, nothing to apply"
        ),
        CallbackApplication::Dropped { payment_id, reason } => warn!(
            order_id = %fields.order_id,
            booking_id = %correlation.booking_id,
            payment_id = %payment_id,
            result_code = fields.result_code,
            reason = %reason,
            "callback dropped, needs manual review"
        ),
        CallbackApplication::BookingMismatch {
            payment_id,
            attempt_booking_id,
        } => warn!(
            order_id = %fields.order_id,
            payment_id = %payment_id,
            callback_booking_id = %correlation.booking_id,
            attempt_booking_id = %attempt_booking_id,
            "callback booking does not match attempt, dropped"
        ),
        CallbackApplication::UnknownOrder => warn!(
            order_id = %fields.order_id,
            booking_id = %correlation.booking_id,
            "callback for unknown order id, ignoring"
        ),
    }
}
