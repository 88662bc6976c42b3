//! Refunds of a booking's captured payment.

use crate::payments::provider::PaymentProvider;
use crate::payments::store::{RefundApplication, RefundUpdate, SettlementStore};
use crate::payments::types::{
    audit_entry, to_provider_amount, AuditKind, PaymentAttemptStatus, RefundRequest,
};
use crate::services::error::{SettlementError, SettlementResult};
use bigdecimal::BigDecimal;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RefundCommand {
    pub booking_id: Uuid,
    /// Defaults to the full captured amount
    pub amount: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundResult {
    pub payment_id: Uuid,
    pub status: PaymentAttemptStatus,
    pub refunded_amount: BigDecimal,
    pub provider_payload: JsonValue,
}

pub struct RefundInitiator {
    store: Arc<dyn SettlementStore>,
    provider: Arc<dyn PaymentProvider>,
}

impl RefundInitiator {
    pub fn new(store: Arc<dyn SettlementStore>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { store, provider }
    }

    pub async fn refund(&self, command: RefundCommand) -> SettlementResult<RefundResult> {
        let attempt = self
            .store
            .find_latest_captured(command.booking_id)
            .await?
            .ok_or(SettlementError::NoCapturedPayment(command.booking_id))?;

        let amount = command.amount.unwrap_or_else(|| attempt.amount.clone());
        if amount <= BigDecimal::from(0) {
            return Err(SettlementError::InvalidAmount {
                amount: amount.to_string(),
                reason: "Refund amount must be greater than zero".to_string(),
            });
        }
        if amount > attempt.amount {
            return Err(SettlementError::RefundAmountExceedsCapture {
                requested: amount,
                captured: attempt.amount,
            });
        }
        let provider_amount =
            to_provider_amount(&amount, "amount").map_err(|e| SettlementError::InvalidAmount {
                amount: amount.to_string(),
                reason: e.user_message(),
            })?;

        let provider_transaction_id = attempt
            .provider_transaction_id
            .clone()
            .ok_or(SettlementError::MissingProviderTransaction(attempt.id))?;

        let request = RefundRequest {
            order_id: Uuid::new_v4().to_string(),
            request_id: Uuid::new_v4().to_string(),
            amount: provider_amount,
            provider_transaction_id,
            description: format!("Refund for tour booking {}", attempt.booking_id),
        };

        info!(
            booking_id = %attempt.booking_id,
            payment_id = %attempt.id,
            refund_order_id = %request.order_id,
            amount = provider_amount,
            "requesting refund from provider"
        );

        let response = match self.provider.refund(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(payment_id = %attempt.id, error = %e, "refund call failed");
                self.record_failure(
                    attempt.id,
                    audit_entry(AuditKind::RefundError, json!({ "error": e.to_string() })),
                )
                .await;
                return Err(SettlementError::Provider(e));
            }
        };

        if !response.is_success() {
            warn!(
                payment_id = %attempt.id,
                result_code = response.result_code,
                message = %response.message,
                "provider rejected refund, attempt stays captured"
            );
            self.record_failure(
                attempt.id,
                audit_entry(AuditKind::RefundResponse, response.provider_payload.clone()),
            )
            .await;
            return Err(SettlementError::ProviderRejected {
                result_code: response.result_code,
                message: response.message,
                provider_payload: response.provider_payload,
            });
        }

        let application = self
            .store
            .apply_refund(RefundUpdate {
                payment_id: attempt.id,
                amount: amount.clone(),
                audit_entry: audit_entry(
                    AuditKind::RefundResponse,
                    response.provider_payload.clone(),
                ),
            })
            .await
            .map_err(|e| {
                // The provider already moved the money; this needs an operator.
                error!(
                    payment_id = %attempt.id,
                    error = %e,
                    "refund accepted by provider but could not be recorded"
                );
                e
            })?;

        match application {
            RefundApplication::Refunded(refunded) => {
                info!(
                    booking_id = %refunded.booking_id,
                    payment_id = %refunded.id,
                    amount = %amount,
                    "payment refunded"
                );
                Ok(RefundResult {
                    payment_id: refunded.id,
                    status: refunded.status,
                    refunded_amount: amount,
                    provider_payload: response.provider_payload,
                })
            }
            RefundApplication::Conflict { status } => {
                error!(
                    payment_id = %attempt.id,
                    status = %status,
                    "refund accepted by provider but attempt is no longer captured"
                );
                Err(SettlementError::RefundConflict(attempt.id))
            }
        }
    }

    /// Audit-only write. A failure here must not hide the provider's answer.
    async fn record_failure(&self, payment_id: Uuid, entry: JsonValue) {
        if let Err(e) = self.store.append_payload(payment_id, entry).await {
            error!(payment_id = %payment_id, error = %e, "failed to append refund audit entry");
        }
    }
}
