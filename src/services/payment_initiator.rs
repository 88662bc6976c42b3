//! Payment initiation: validate, call the gateway's create endpoint, record the attempt.
//!
//! The booking itself is never written here. Only a verified callback can say
//! that money moved.

use crate::config::SettlementConfig;
use crate::payments::correlation::CorrelationData;
use crate::payments::provider::PaymentProvider;
use crate::payments::store::SettlementStore;
use crate::payments::types::{
    audit_entry, to_provider_amount, AuditKind, CreatePaymentRequest, NewPaymentAttempt,
    PaymentAttemptStatus,
};
use crate::services::error::{SettlementError, SettlementResult};
use bigdecimal::BigDecimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct InitiatePaymentCommand {
    pub booking_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitiatedPayment {
    pub payment_id: Uuid,
    pub order_id: String,
    pub redirect_url: Option<String>,
}

pub struct PaymentInitiator {
    store: Arc<dyn SettlementStore>,
    provider: Arc<dyn PaymentProvider>,
    settlement: SettlementConfig,
}

impl PaymentInitiator {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        provider: Arc<dyn PaymentProvider>,
        settlement: SettlementConfig,
    ) -> Self {
        Self {
            store,
            provider,
            settlement,
        }
    }

    pub async fn initiate(
        &self,
        command: InitiatePaymentCommand,
    ) -> SettlementResult<InitiatedPayment> {
        let provider_amount = self.validate(&command)?;

        let booking = self
            .store
            .get_booking(command.booking_id)
            .await?
            .ok_or(SettlementError::BookingNotFound(command.booking_id))?;

        if booking.payment_status.is_settled() {
            warn!(
                booking_id = %booking.id,
                payment_status = %booking.payment_status.to_db_status(),
                "payment initiation refused for settled booking"
            );
            return Err(SettlementError::BookingAlreadyPaid {
                booking_id: booking.id,
                payment_status: booking.payment_status.to_db_status().to_string(),
            });
        }

        let payment_id = Uuid::new_v4();
        let order_id = Uuid::new_v4().to_string();
        let request_id = Uuid::new_v4().to_string();
        let extra_data = CorrelationData::new(booking.id, payment_id).encode();

        let request = CreatePaymentRequest {
            order_id: order_id.clone(),
            request_id: request_id.clone(),
            amount: provider_amount,
            order_info: format!("Tour booking {}", booking.id),
            extra_data,
        };

        info!(
            booking_id = %booking.id,
            payment_id = %payment_id,
            order_id = %order_id,
            amount = provider_amount,
            "creating payment with provider"
        );

        let provider_result = self.provider.create_payment(request).await;

        let (status, payload, outcome) = match provider_result {
            Ok(response) if response.is_success() => (
                PaymentAttemptStatus::RequiresAction,
                audit_entry(AuditKind::CreateResponse, response.provider_payload),
                Ok(response.redirect_url),
            ),
            Ok(response) => {
                warn!(
                    booking_id = %booking.id,
                    order_id = %order_id,
                    result_code = response.result_code,
                    message = %response.message,
                    "provider declined payment creation"
                );
                let rejection = SettlementError::ProviderRejected {
                    result_code: response.result_code,
                    message: response.message,
                    provider_payload: response.provider_payload.clone(),
                };
                (
                    PaymentAttemptStatus::Failed,
                    audit_entry(AuditKind::CreateResponse, response.provider_payload),
                    Err(rejection),
                )
            }
            Err(e) => {
                error!(
                    booking_id = %booking.id,
                    order_id = %order_id,
                    error = %e,
                    "payment creation call failed"
                );
                (
                    PaymentAttemptStatus::Failed,
                    audit_entry(AuditKind::CreateError, json!({ "error": e.to_string() })),
                    Err(SettlementError::Provider(e)),
                )
            }
        };

        // A failed create still leaves an audit record.
        let attempt = self
            .store
            .create_attempt(NewPaymentAttempt {
                id: payment_id,
                booking_id: booking.id,
                payer_id: booking.customer_id,
                payee_id: booking.guide_id,
                amount: command.amount,
                currency: self.settlement.currency.clone(),
                method: self.provider.name(),
                status,
                provider_order_id: order_id.clone(),
                provider_request_id: request_id,
                provider_payload: serde_json::Value::Array(vec![payload]),
            })
            .await
            .map_err(|e| {
                error!(
                    booking_id = %booking.id,
                    order_id = %order_id,
                    error = %e,
                    "failed to record payment attempt"
                );
                e
            })?;

        let redirect_url = outcome?;
        info!(
            booking_id = %booking.id,
            payment_id = %attempt.id,
            order_id = %order_id,
            "payment attempt awaiting customer action"
        );

        Ok(InitiatedPayment {
            payment_id: attempt.id,
            order_id,
            redirect_url,
        })
    }

    fn validate(&self, command: &InitiatePaymentCommand) -> SettlementResult<i64> {
        let expected = &self.settlement.currency;
        if &command.currency != expected
            || !self
                .provider
                .supported_currencies()
                .contains(&command.currency.as_str())
        {
            return Err(SettlementError::InvalidCurrency {
                currency: command.currency.clone(),
                expected: expected.clone(),
            });
        }

        if command.amount <= BigDecimal::from(0) {
            return Err(SettlementError::InvalidAmount {
                amount: command.amount.to_string(),
                reason: "Amount must be greater than zero".to_string(),
            });
        }

        to_provider_amount(&command.amount, "amount").map_err(|e| {
            SettlementError::InvalidAmount {
                amount: command.amount.to_string(),
                reason: e.user_message(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::InMemorySettlementStore;
    use crate::payments::error::{PaymentError, PaymentResult};
    use crate::payments::signature::CallbackFields;
    use crate::payments::store::PaymentRecordStore;
    use crate::payments::types::{
        Booking, BookingPaymentStatus, BookingStatus, CreatePaymentResponse, ProviderName,
        RefundRequest, RefundResponse, WebhookVerificationResult,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum CreateBehaviour {
        Accept,
        Decline(i64),
        Unreachable,
    }

    struct ScriptedProvider {
        behaviour: CreateBehaviour,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(behaviour: CreateBehaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PaymentProvider for ScriptedProvider {
        async fn create_payment(
            &self,
            request: CreatePaymentRequest,
        ) -> PaymentResult<CreatePaymentResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                CreateBehaviour::Accept => Ok(CreatePaymentResponse {
                    result_code: 0,
                    message: "Successful.".to_string(),
                    redirect_url: Some(format!("https://pay.test/{}", request.order_id)),
                    provider_payload: json!({"resultCode": 0}),
                }),
                CreateBehaviour::Decline(code) => Ok(CreatePaymentResponse {
                    result_code: code,
                    message: "Declined".to_string(),
                    redirect_url: None,
                    provider_payload: json!({"resultCode": code}),
                }),
                CreateBehaviour::Unreachable => Err(PaymentError::NetworkError {
                    message: "connection refused".to_string(),
                }),
            }
        }

        async fn refund(&self, _request: RefundRequest) -> PaymentResult<RefundResponse> {
            unreachable!("initiation never refunds")
        }

        fn verify_callback(&self, _callback: &CallbackFields) -> WebhookVerificationResult {
            WebhookVerificationResult {
                valid: true,
                reason: None,
            }
        }

        fn name(&self) -> ProviderName {
            ProviderName::Momo
        }

        fn supported_currencies(&self) -> &'static [&'static str] {
            &["VND"]
        }
    }

    async fn seeded_store(payment_status: BookingPaymentStatus) -> (Arc<InMemorySettlementStore>, Uuid) {
        let store = Arc::new(InMemorySettlementStore::new());
        let booking_id = Uuid::new_v4();
        store
            .insert_booking(Booking {
                id: booking_id,
                customer_id: Uuid::new_v4(),
                guide_id: Uuid::new_v4(),
                status: BookingStatus::Pending,
                payment_status,
                total_price: BigDecimal::from(200),
            })
            .await;
        (store, booking_id)
    }

    fn command(booking_id: Uuid, amount: i64, currency: &str) -> InitiatePaymentCommand {
        InitiatePaymentCommand {
            booking_id,
            amount: BigDecimal::from(amount),
            currency: currency.to_string(),
        }
    }

    #[tokio::test]
    async fn successful_create_records_requires_action_attempt() {
        let (store, booking_id) = seeded_store(BookingPaymentStatus::Pending).await;
        let provider = ScriptedProvider::new(CreateBehaviour::Accept);
        let initiator =
            PaymentInitiator::new(store.clone(), provider.clone(), SettlementConfig::default());

        let initiated = initiator
            .initiate(command(booking_id, 200, "VND"))
            .await
            .unwrap();

        assert!(initiated.redirect_url.is_some());
        let attempt = store.find_by_id(initiated.payment_id).await.unwrap().unwrap();
        assert_eq!(attempt.status, PaymentAttemptStatus::RequiresAction);
        assert_eq!(attempt.provider_order_id, initiated.order_id);
        assert_eq!(attempt.provider_payload[0]["kind"], "create_response");

        let booking = store.booking(booking_id).await.unwrap();
        assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);
    }

    #[tokio::test]
    async fn declined_and_unreachable_creates_still_leave_failed_attempts() {
        let (store, booking_id) = seeded_store(BookingPaymentStatus::Pending).await;

        let declined = PaymentInitiator::new(
            store.clone(),
            ScriptedProvider::new(CreateBehaviour::Decline(1001)),
            SettlementConfig::default(),
        );
        let err = declined
            .initiate(command(booking_id, 200, "VND"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::ProviderRejected {
                result_code: 1001,
                ..
            }
        ));

        let unreachable = PaymentInitiator::new(
            store.clone(),
            ScriptedProvider::new(CreateBehaviour::Unreachable),
            SettlementConfig::default(),
        );
        let err = unreachable
            .initiate(command(booking_id, 200, "VND"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Provider(_)));

        let attempts = store.list_by_booking(booking_id).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert!(attempts
            .iter()
            .all(|a| a.status == PaymentAttemptStatus::Failed));
        assert_eq!(attempts[0].provider_payload[0]["kind"], "create_error");
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_the_provider_is_called() {
        let (store, booking_id) = seeded_store(BookingPaymentStatus::Pending).await;
        let provider = ScriptedProvider::new(CreateBehaviour::Accept);
        let initiator =
            PaymentInitiator::new(store.clone(), provider.clone(), SettlementConfig::default());

        let err = initiator
            .initiate(command(booking_id, 200, "USD"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidCurrency { .. }));

        let err = initiator
            .initiate(command(booking_id, 0, "VND"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidAmount { .. }));

        let fractional = InitiatePaymentCommand {
            booking_id,
            amount: "199.5".parse().unwrap(),
            currency: "VND".to_string(),
        };
        let err = initiator.initiate(fractional).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidAmount { .. }));

        let err = initiator
            .initiate(command(Uuid::new_v4(), 200, "VND"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::BookingNotFound(_)));

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.attempt_count().await, 0);
    }

    #[tokio::test]
    async fn settled_booking_cannot_be_paid_again() {
        let (store, booking_id) = seeded_store(BookingPaymentStatus::Paid).await;
        let provider = ScriptedProvider::new(CreateBehaviour::Accept);
        let initiator =
            PaymentInitiator::new(store.clone(), provider.clone(), SettlementConfig::default());

        let err = initiator
            .initiate(command(booking_id, 200, "VND"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::BookingAlreadyPaid { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
