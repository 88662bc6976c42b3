//! Postgres-backed settlement store.
//!
//! Ledger writes take row locks in a fixed order, attempt first and booking
//! second, so concurrent callbacks and refunds for one booking serialize
//! instead of deadlocking.

use crate::database::booking_repository::BookingRepository;
use crate::database::error::{DatabaseError, DbResult};
use crate::database::payment_attempt_repository::PaymentAttemptRepository;
use crate::payments::state::CallbackDecision;
use crate::payments::store::{
    evaluate_callback, BookingStatusGateway, CallbackApplication, CallbackUpdate,
    PaymentRecordStore, RefundApplication, RefundUpdate, SettlementLedger,
};
use crate::payments::types::{
    Booking, BookingPaymentStatus, NewPaymentAttempt, PaymentAttempt, PaymentAttemptStatus,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgSettlementStore {
    pool: PgPool,
    attempts: PaymentAttemptRepository,
    bookings: BookingRepository,
}

impl PgSettlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            attempts: PaymentAttemptRepository::new(pool.clone()),
            bookings: BookingRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl PaymentRecordStore for PgSettlementStore {
    async fn create_attempt(&self, attempt: NewPaymentAttempt) -> DbResult<PaymentAttempt> {
        self.attempts.create(attempt).await
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PaymentAttempt>> {
        self.attempts.find_by_id(id).await
    }

    async fn find_by_order_id(&self, order_id: &str) -> DbResult<Option<PaymentAttempt>> {
        self.attempts.find_by_order_id(order_id).await
    }

    async fn find_latest_by_booking(&self, booking_id: Uuid) -> DbResult<Option<PaymentAttempt>> {
        self.attempts.find_latest_by_booking(booking_id).await
    }

    async fn find_latest_captured(&self, booking_id: Uuid) -> DbResult<Option<PaymentAttempt>> {
        self.attempts.find_latest_captured(booking_id).await
    }

    async fn list_by_booking(&self, booking_id: Uuid) -> DbResult<Vec<PaymentAttempt>> {
        self.attempts.list_by_booking(booking_id).await
    }

    async fn append_payload(&self, id: Uuid, entry: JsonValue) -> DbResult<()> {
        self.attempts.append_payload(id, entry).await
    }
}

#[async_trait]
impl BookingStatusGateway for PgSettlementStore {
    async fn get_booking(&self, booking_id: Uuid) -> DbResult<Option<Booking>> {
        self.bookings.find_by_id(booking_id).await
    }
}

#[async_trait]
impl SettlementLedger for PgSettlementStore {
    async fn apply_callback(&self, update: CallbackUpdate) -> DbResult<CallbackApplication> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::transaction)?;

        let Some(attempt) =
            PaymentAttemptRepository::lock_by_order_id_tx(&mut tx, &update.order_id).await?
        else {
            tx.rollback().await.map_err(DatabaseError::transaction)?;
            return Ok(CallbackApplication::UnknownOrder);
        };

        if attempt.booking_id != update.booking_id {
            PaymentAttemptRepository::append_payload_tx(&mut tx, attempt.id, update.audit_entry)
                .await?;
            tx.commit().await.map_err(DatabaseError::transaction)?;
            return Ok(CallbackApplication::BookingMismatch {
                payment_id: attempt.id,
                attempt_booking_id: attempt.booking_id,
            });
        }

        let booking = BookingRepository::lock_by_id_tx(&mut tx, attempt.booking_id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Booking", attempt.booking_id))?;
        let other_capture_exists =
            PaymentAttemptRepository::other_capture_exists_tx(&mut tx, booking.id, attempt.id)
                .await?;

        let decision = evaluate_callback(&attempt, &booking, other_capture_exists, &update);
        debug!(
            payment_id = %attempt.id,
            attempt_status = %attempt.status,
            decision = ?decision,
            "callback decision taken under lock"
        );

        PaymentAttemptRepository::append_payload_tx(&mut tx, attempt.id, update.audit_entry)
            .await?;

        let application = match decision {
            CallbackDecision::Capture | CallbackDecision::Fail { .. } => {
                let status = decision
                    .target_status()
                    .unwrap_or(PaymentAttemptStatus::Failed);
                PaymentAttemptRepository::update_status_tx(
                    &mut tx,
                    attempt.id,
                    status,
                    update.provider_transaction_id.as_deref(),
                )
                .await?;

                let booking_update = decision.booking_update();
                if let Some((booking_status, payment_status)) = booking_update {
                    BookingRepository::set_status_tx(
                        &mut tx,
                        booking.id,
                        booking_status,
                        payment_status,
                    )
                    .await?;
                }

                CallbackApplication::Applied {
                    payment_id: attempt.id,
                    status,
                    booking_updated: booking_update.is_some(),
                }
            }
            CallbackDecision::Duplicate => CallbackApplication::Duplicate {
                payment_id: attempt.id,
                status: attempt.status,
            },
            CallbackDecision::Drop { reason } => CallbackApplication::Dropped {
                payment_id: attempt.id,
                reason,
            },
        };

        tx.commit().await.map_err(DatabaseError::transaction)?;
        Ok(application)
    }

    async fn apply_refund(&self, update: RefundUpdate) -> DbResult<RefundApplication> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::transaction)?;

        let attempt = PaymentAttemptRepository::lock_by_id_tx(&mut tx, update.payment_id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("PaymentAttempt", update.payment_id))?;

        PaymentAttemptRepository::append_payload_tx(&mut tx, attempt.id, update.audit_entry)
            .await?;

        if !attempt
            .status
            .can_transition_to(PaymentAttemptStatus::Refunded)
        {
            tx.commit().await.map_err(DatabaseError::transaction)?;
            return Ok(RefundApplication::Conflict {
                status: attempt.status,
            });
        }

        let refunded =
            PaymentAttemptRepository::mark_refunded_tx(&mut tx, attempt.id, &update.amount)
                .await?;
        BookingRepository::set_payment_status_tx(
            &mut tx,
            attempt.booking_id,
            BookingPaymentStatus::Refunded,
        )
        .await?;

        tx.commit().await.map_err(DatabaseError::transaction)?;
        Ok(RefundApplication::Refunded(refunded))
    }
}
