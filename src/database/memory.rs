//! Process-local settlement store for `SKIP_EXTERNALS` runs and tests.
//!
//! One async mutex guards bookings and attempts together, so each ledger call
//! is a single critical section, the same way a Postgres transaction holding
//! row locks would serialize it.

use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::payments::state::CallbackDecision;
use crate::payments::store::{
    evaluate_callback, BookingStatusGateway, CallbackApplication, CallbackUpdate,
    PaymentRecordStore, RefundApplication, RefundUpdate, SettlementLedger,
};
use crate::payments::types::{
    Booking, BookingPaymentStatus, NewPaymentAttempt, PaymentAttempt, PaymentAttemptStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    bookings: HashMap<Uuid, Booking>,
    /// Insertion order; later entries are newer.
    attempts: Vec<PaymentAttempt>,
}

#[derive(Default)]
pub struct InMemorySettlementStore {
    state: Mutex<MemoryState>,
}

impl InMemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a booking. Bookings are owned elsewhere; this stands in for that owner.
    pub async fn insert_booking(&self, booking: Booking) {
        let mut state = self.state.lock().await;
        state.bookings.insert(booking.id, booking);
    }

    pub async fn booking(&self, booking_id: Uuid) -> Option<Booking> {
        self.state.lock().await.bookings.get(&booking_id).cloned()
    }

    pub async fn attempt_count(&self) -> usize {
        self.state.lock().await.attempts.len()
    }
}

fn push_payload(trail: &mut JsonValue, entry: JsonValue) {
    match trail {
        JsonValue::Array(entries) => entries.push(entry),
        other => {
            let previous = other.take();
            *other = if previous.is_null() {
                JsonValue::Array(vec![entry])
            } else {
                JsonValue::Array(vec![previous, entry])
            };
        }
    }
}

#[async_trait]
impl PaymentRecordStore for InMemorySettlementStore {
    async fn create_attempt(&self, attempt: NewPaymentAttempt) -> DbResult<PaymentAttempt> {
        let mut state = self.state.lock().await;

        if !state.bookings.contains_key(&attempt.booking_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::ForeignKeyViolation {
                table: "payment_attempts".to_string(),
                column: "booking_id".to_string(),
            }));
        }
        if state
            .attempts
            .iter()
            .any(|a| a.provider_order_id == attempt.provider_order_id)
        {
            return Err(DatabaseError::new(
                DatabaseErrorKind::UniqueConstraintViolation {
                    column: "provider_order_id".to_string(),
                    value: attempt.provider_order_id,
                },
            ));
        }

        let now = Utc::now();
        let mut provider_payload = JsonValue::Array(Vec::new());
        if !attempt.provider_payload.is_null() {
            provider_payload = match attempt.provider_payload {
                JsonValue::Array(entries) => JsonValue::Array(entries),
                single => JsonValue::Array(vec![single]),
            };
        }

        let record = PaymentAttempt {
            id: attempt.id,
            booking_id: attempt.booking_id,
            payer_id: attempt.payer_id,
            payee_id: attempt.payee_id,
            amount: attempt.amount,
            currency: attempt.currency,
            method: attempt.method,
            status: attempt.status,
            provider_order_id: attempt.provider_order_id,
            provider_request_id: attempt.provider_request_id,
            provider_transaction_id: None,
            provider_payload,
            refunded_amount: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };
        state.attempts.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PaymentAttempt>> {
        let state = self.state.lock().await;
        Ok(state.attempts.iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_order_id(&self, order_id: &str) -> DbResult<Option<PaymentAttempt>> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .iter()
            .find(|a| a.provider_order_id == order_id)
            .cloned())
    }

    async fn find_latest_by_booking(&self, booking_id: Uuid) -> DbResult<Option<PaymentAttempt>> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .iter()
            .rev()
            .find(|a| a.booking_id == booking_id)
            .cloned())
    }

    async fn find_latest_captured(&self, booking_id: Uuid) -> DbResult<Option<PaymentAttempt>> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .iter()
            .rev()
            .find(|a| a.booking_id == booking_id && a.status == PaymentAttemptStatus::Captured)
            .cloned())
    }

    async fn list_by_booking(&self, booking_id: Uuid) -> DbResult<Vec<PaymentAttempt>> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .iter()
            .rev()
            .filter(|a| a.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn append_payload(&self, id: Uuid, entry: JsonValue) -> DbResult<()> {
        let mut state = self.state.lock().await;
        let attempt = state
            .attempts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| DatabaseError::not_found("PaymentAttempt", id))?;
        push_payload(&mut attempt.provider_payload, entry);
        Ok(())
    }
}

#[async_trait]
impl BookingStatusGateway for InMemorySettlementStore {
    async fn get_booking(&self, booking_id: Uuid) -> DbResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&booking_id).cloned())
    }
}

#[async_trait]
impl SettlementLedger for InMemorySettlementStore {
    async fn apply_callback(&self, update: CallbackUpdate) -> DbResult<CallbackApplication> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(index) = state
            .attempts
            .iter()
            .position(|a| a.provider_order_id == update.order_id)
        else {
            return Ok(CallbackApplication::UnknownOrder);
        };

        let attempt_id = state.attempts[index].id;
        let attempt_booking_id = state.attempts[index].booking_id;

        if attempt_booking_id != update.booking_id {
            push_payload(
                &mut state.attempts[index].provider_payload,
                update.audit_entry,
            );
            return Ok(CallbackApplication::BookingMismatch {
                payment_id: attempt_id,
                attempt_booking_id,
            });
        }

        let booking = state
            .bookings
            .get(&attempt_booking_id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Booking", attempt_booking_id))?;
        let other_capture_exists = state.attempts.iter().any(|a| {
            a.booking_id == attempt_booking_id
                && a.id != attempt_id
                && matches!(
                    a.status,
                    PaymentAttemptStatus::Captured | PaymentAttemptStatus::Refunded
                )
        });

        let decision = evaluate_callback(
            &state.attempts[index],
            &booking,
            other_capture_exists,
            &update,
        );

        let attempt = &mut state.attempts[index];
        push_payload(&mut attempt.provider_payload, update.audit_entry);

        let application = match &decision {
            CallbackDecision::Capture | CallbackDecision::Fail { .. } => {
                let status = decision
                    .target_status()
                    .unwrap_or(PaymentAttemptStatus::Failed);
                attempt.status = status;
                if update.provider_transaction_id.is_some() {
                    attempt.provider_transaction_id = update.provider_transaction_id;
                }
                attempt.updated_at = Utc::now();

                let booking_update = decision.booking_update();
                if let Some((booking_status, payment_status)) = booking_update {
                    if let Some(booking) = state.bookings.get_mut(&attempt_booking_id) {
                        booking.status = booking_status;
                        booking.payment_status = payment_status;
                    }
                }

                CallbackApplication::Applied {
                    payment_id: attempt_id,
                    status,
                    booking_updated: booking_update.is_some(),
                }
            }
            CallbackDecision::Duplicate => CallbackApplication::Duplicate {
                payment_id: attempt_id,
                status: attempt.status,
            },
            CallbackDecision::Drop { reason } => CallbackApplication::Dropped {
                payment_id: attempt_id,
                reason: *reason,
            },
        };

        Ok(application)
    }

    async fn apply_refund(&self, update: RefundUpdate) -> DbResult<RefundApplication> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let attempt = state
            .attempts
            .iter_mut()
            .find(|a| a.id == update.payment_id)
            .ok_or_else(|| DatabaseError::not_found("PaymentAttempt", update.payment_id))?;

        push_payload(&mut attempt.provider_payload, update.audit_entry);

        if !attempt
            .status
            .can_transition_to(PaymentAttemptStatus::Refunded)
        {
            return Ok(RefundApplication::Conflict {
                status: attempt.status,
            });
        }

        let now = Utc::now();
        attempt.status = PaymentAttemptStatus::Refunded;
        attempt.refunded_amount = Some(update.amount);
        attempt.refunded_at = Some(now);
        attempt.updated_at = now;
        let refunded = attempt.clone();

        if let Some(booking) = state.bookings.get_mut(&refunded.booking_id) {
            booking.payment_status = BookingPaymentStatus::Refunded;
        }

        Ok(RefundApplication::Refunded(refunded))
    }
}
