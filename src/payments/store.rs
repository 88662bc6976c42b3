//! Storage seams for the settlement services.
//!
//! `PaymentRecordStore` and `BookingStatusGateway` are plain reads and audit
//! appends. Every status write goes through `SettlementLedger`, whose
//! implementations apply the attempt and booking changes in one atomic unit.

use crate::database::error::DbResult;
use crate::payments::state::{decide_callback, CallbackContext, CallbackDecision, CallbackOutcome};
use crate::payments::types::{Booking, NewPaymentAttempt, PaymentAttempt, PaymentAttemptStatus};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[async_trait]
pub trait PaymentRecordStore: Send + Sync {
    async fn create_attempt(&self, attempt: NewPaymentAttempt) -> DbResult<PaymentAttempt>;

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PaymentAttempt>>;

    async fn find_by_order_id(&self, order_id: &str) -> DbResult<Option<PaymentAttempt>>;

    async fn find_latest_by_booking(&self, booking_id: Uuid) -> DbResult<Option<PaymentAttempt>>;

    async fn find_latest_captured(&self, booking_id: Uuid) -> DbResult<Option<PaymentAttempt>>;

    /// Newest first.
    async fn list_by_booking(&self, booking_id: Uuid) -> DbResult<Vec<PaymentAttempt>>;

    /// Append one entry to the attempt's audit trail. Status is untouched.
    async fn append_payload(&self, id: Uuid, entry: JsonValue) -> DbResult<()>;
}

#[async_trait]
pub trait BookingStatusGateway: Send + Sync {
    async fn get_booking(&self, booking_id: Uuid) -> DbResult<Option<Booking>>;
}

/// A verified callback, reduced to what the ledger needs.
#[derive(Debug, Clone)]
pub struct CallbackUpdate {
    pub order_id: String,
    /// Booking id recovered from `extraData`
    pub booking_id: Uuid,
    pub outcome: CallbackOutcome,
    pub amount: BigDecimal,
    pub provider_transaction_id: Option<String>,
    /// Audit entry appended whatever the decision
    pub audit_entry: JsonValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackApplication {
    Applied {
        payment_id: Uuid,
        status: PaymentAttemptStatus,
        booking_updated: bool,
    },
    Duplicate {
        payment_id: Uuid,
        status: PaymentAttemptStatus,
    },
    Dropped {
        payment_id: Uuid,
        reason: &'static str,
    },
    BookingMismatch {
        payment_id: Uuid,
        attempt_booking_id: Uuid,
    },
    UnknownOrder,
}

#[derive(Debug, Clone)]
pub struct RefundUpdate {
    pub payment_id: Uuid,
    pub amount: BigDecimal,
    pub audit_entry: JsonValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefundApplication {
    Refunded(PaymentAttempt),
    /// The attempt was no longer `captured` when the lock was taken.
    Conflict { status: PaymentAttemptStatus },
}

#[async_trait]
pub trait SettlementLedger: Send + Sync {
    /// Lock the attempt by order id, decide, write attempt + booking + audit, commit.
    async fn apply_callback(&self, update: CallbackUpdate) -> DbResult<CallbackApplication>;

    /// Lock the attempt, re-check `captured`, mark refunded and flag the booking.
    async fn apply_refund(&self, update: RefundUpdate) -> DbResult<RefundApplication>;
}

/// Shared decision step for ledger implementations, run while the attempt is locked.
pub fn evaluate_callback(
    attempt: &PaymentAttempt,
    booking: &Booking,
    other_capture_exists: bool,
    update: &CallbackUpdate,
) -> CallbackDecision {
    decide_callback(
        update.outcome,
        CallbackContext {
            attempt_status: attempt.status,
            booking_payment_status: booking.payment_status,
            other_capture_exists,
            amount_matches: attempt.amount == update.amount,
        },
    )
}

/// Payment store, booking reads and ledger behind one handle.
pub trait SettlementStore: PaymentRecordStore + BookingStatusGateway + SettlementLedger {}

impl<T> SettlementStore for T where T: PaymentRecordStore + BookingStatusGateway + SettlementLedger {}
