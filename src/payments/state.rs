//! Pure transition rules for applying a callback to an attempt and its booking.
//!
//! Storage layers call [`decide_callback`] while holding their locks, so the
//! same rules apply to Postgres and to the in-memory store.

use crate::payments::types::{BookingPaymentStatus, BookingStatus, PaymentAttemptStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Success,
    Failure,
}

impl CallbackOutcome {
    /// `0` is success, anything else is failure.
    pub fn from_result_code(result_code: i64) -> Self {
        if result_code == 0 {
            CallbackOutcome::Success
        } else {
            CallbackOutcome::Failure
        }
    }
}

/// What the lock holder observed about the attempt and its booking.
#[derive(Debug, Clone, Copy)]
pub struct CallbackContext {
    pub attempt_status: PaymentAttemptStatus,
    pub booking_payment_status: BookingPaymentStatus,
    /// Some other attempt for this booking is `captured` or `refunded`.
    pub other_capture_exists: bool,
    pub amount_matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackDecision {
    /// requires_action -> captured; booking -> confirmed/paid
    Capture,
    /// requires_action -> failed; booking -> cancelled/pending when `update_booking`
    Fail { update_booking: bool },
    /// The attempt already reflects this outcome.
    Duplicate,
    /// Not a legal transition; record the body and change nothing.
    Drop { reason: &'static str },
}

impl CallbackDecision {
    pub fn target_status(&self) -> Option<PaymentAttemptStatus> {
        match self {
            CallbackDecision::Capture => Some(PaymentAttemptStatus::Captured),
            CallbackDecision::Fail { .. } => Some(PaymentAttemptStatus::Failed),
            _ => None,
        }
    }

    /// New `(status, payment_status)` for the booking, if it changes.
    pub fn booking_update(&self) -> Option<(BookingStatus, BookingPaymentStatus)> {
        match self {
            CallbackDecision::Capture => {
                Some((BookingStatus::Confirmed, BookingPaymentStatus::Paid))
            }
            CallbackDecision::Fail {
                update_booking: true,
            } => Some((BookingStatus::Cancelled, BookingPaymentStatus::Pending)),
            _ => None,
        }
    }
}

pub fn decide_callback(outcome: CallbackOutcome, ctx: CallbackContext) -> CallbackDecision {
    use PaymentAttemptStatus::*;

    let booking_settled = ctx.booking_payment_status.is_settled() || ctx.other_capture_exists;

    let decision = match (outcome, ctx.attempt_status) {
        (CallbackOutcome::Success, Captured) | (CallbackOutcome::Success, Refunded) => {
            CallbackDecision::Duplicate
        }
        (CallbackOutcome::Failure, Failed) => CallbackDecision::Duplicate,

        (CallbackOutcome::Success, RequiresAction) if !ctx.amount_matches => {
            CallbackDecision::Drop {
                reason: "callback amount does not match attempt amount",
            }
        }
        (CallbackOutcome::Success, RequiresAction) if booking_settled => CallbackDecision::Drop {
            reason: "booking already settled by another attempt",
        },
        (CallbackOutcome::Success, RequiresAction) => CallbackDecision::Capture,
        (CallbackOutcome::Failure, RequiresAction) => CallbackDecision::Fail {
            update_booking: !booking_settled,
        },

        (CallbackOutcome::Success, Failed) => CallbackDecision::Drop {
            reason: "success callback for a failed attempt",
        },
        (CallbackOutcome::Failure, Captured) | (CallbackOutcome::Failure, Refunded) => {
            CallbackDecision::Drop {
                reason: "failure callback for a captured attempt",
            }
        }
    };

    if let Some(target) = decision.target_status() {
        debug_assert!(ctx.attempt_status.can_transition_to(target));
    }
    decision
}
