mod common;

use bigdecimal::BigDecimal;
use common::Harness;
use tourbook_payments::payments::store::{CallbackApplication, PaymentRecordStore};
use tourbook_payments::payments::types::{
    BookingPaymentStatus, BookingStatus, PaymentAttemptStatus,
};
use tourbook_payments::services::{
    CallbackDisposition, InitiatePaymentCommand, RefundCommand, SettlementError,
};
use uuid::Uuid;

async fn initiate(harness: &Harness, booking_id: Uuid, amount: i64) -> (Uuid, String) {
    let initiated = harness
        .initiator
        .initiate(InitiatePaymentCommand {
            booking_id,
            amount: BigDecimal::from(amount),
            currency: "VND".to_string(),
        })
        .await
        .unwrap();
    (initiated.payment_id, initiated.order_id)
}

#[tokio::test]
async fn end_to_end_capture_then_full_refund() {
    let harness = Harness::new();
    let booking_id = harness.booking(200).await;

    let (payment_id, order_id) = initiate(&harness, booking_id, 200).await;
    let attempt = harness.store.find_by_id(payment_id).await.unwrap().unwrap();
    assert_eq!(attempt.status, PaymentAttemptStatus::RequiresAction);
    assert_eq!(attempt.provider_order_id, order_id);

    let disposition = harness
        .callbacks
        .handle(harness.gateway.signed_callback(0, Some(4_088_878_653)))
        .await;
    assert!(matches!(
        disposition,
        CallbackDisposition::Settled(CallbackApplication::Applied {
            status: PaymentAttemptStatus::Captured,
            booking_updated: true,
            ..
        })
    ));

    let view = harness.status.status(booking_id).await.unwrap();
    assert_eq!(view.booking_status, BookingStatus::Confirmed);
    assert_eq!(view.payment_status, BookingPaymentStatus::Paid);

    let refunded = harness
        .refunds
        .refund(RefundCommand {
            booking_id,
            amount: None,
        })
        .await
        .unwrap();
    assert_eq!(refunded.refunded_amount, BigDecimal::from(200));
    assert_eq!(refunded.status, PaymentAttemptStatus::Refunded);

    let attempt = harness.store.find_by_id(payment_id).await.unwrap().unwrap();
    assert_eq!(attempt.status, PaymentAttemptStatus::Refunded);
    assert!(attempt.refunded_at.is_some());
    let booking = harness.store.booking(booking_id).await.unwrap();
    assert_eq!(booking.payment_status, BookingPaymentStatus::Refunded);

    let kinds: Vec<String> = attempt
        .provider_payload
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["kind"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(kinds, ["create_response", "callback", "refund_response"]);
}

#[tokio::test]
async fn failure_callback_cancels_booking_and_blocks_refund() {
    let harness = Harness::new();
    let booking_id = harness.booking(200).await;
    let (payment_id, _) = initiate(&harness, booking_id, 200).await;

    harness
        .callbacks
        .handle(harness.gateway.signed_callback(9, None))
        .await;

    let attempt = harness.store.find_by_id(payment_id).await.unwrap().unwrap();
    assert_eq!(attempt.status, PaymentAttemptStatus::Failed);
    let booking = harness.store.booking(booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);

    let err = harness
        .refunds
        .refund(RefundCommand {
            booking_id,
            amount: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::NoCapturedPayment(id) if id == booking_id));
    assert_eq!(harness.gateway.refund_count(), 0);
}

#[tokio::test]
async fn duplicate_success_callback_applies_once() {
    let harness = Harness::new();
    let booking_id = harness.booking(200).await;
    let (payment_id, _) = initiate(&harness, booking_id, 200).await;
    let callback = harness.gateway.signed_callback(0, Some(1));

    harness.callbacks.handle(callback.clone()).await;
    let after_first = harness.store.find_by_id(payment_id).await.unwrap().unwrap();

    let second = harness.callbacks.handle(callback).await;
    assert!(matches!(
        second,
        CallbackDisposition::Settled(CallbackApplication::Duplicate {
            status: PaymentAttemptStatus::Captured,
            ..
        })
    ));

    let after_second = harness.store.find_by_id(payment_id).await.unwrap().unwrap();
    assert_eq!(after_second.status, PaymentAttemptStatus::Captured);
    assert_eq!(after_second.updated_at, after_first.updated_at);
    assert_eq!(after_second.refunded_at, None);
    assert_eq!(
        harness.store.booking(booking_id).await.unwrap().payment_status,
        BookingPaymentStatus::Paid
    );
}

#[tokio::test]
async fn concurrent_duplicate_deliveries_capture_exactly_once() {
    let harness = std::sync::Arc::new(Harness::new());
    let booking_id = harness.booking(200).await;
    initiate(&harness, booking_id, 200).await;
    let callback = harness.gateway.signed_callback(0, Some(7));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let harness = harness.clone();
        let callback = callback.clone();
        handles.push(tokio::spawn(async move {
            harness.callbacks.handle(callback).await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if let CallbackDisposition::Settled(CallbackApplication::Applied { .. }) =
            handle.await.unwrap()
        {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn forged_callback_changes_nothing_in_strict_mode() {
    let harness = Harness::new();
    let booking_id = harness.booking(200).await;
    let (payment_id, _) = initiate(&harness, booking_id, 200).await;
    let before = harness.store.find_by_id(payment_id).await.unwrap();

    let mut forged = harness.gateway.signed_callback(0, Some(1));
    forged["amount"] = serde_json::json!(1);

    let disposition = harness.callbacks.handle(forged).await;
    assert!(matches!(disposition, CallbackDisposition::Rejected { .. }));
    assert_eq!(harness.store.find_by_id(payment_id).await.unwrap(), before);
    let booking = harness.store.booking(booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);
}

#[tokio::test]
async fn refund_bounds_are_checked_before_calling_the_provider() {
    let harness = Harness::new();
    let booking_id = harness.booking(200).await;

    let err = harness
        .refunds
        .refund(RefundCommand {
            booking_id,
            amount: Some(BigDecimal::from(10)),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::NoCapturedPayment(_)));

    initiate(&harness, booking_id, 200).await;
    harness
        .callbacks
        .handle(harness.gateway.signed_callback(0, Some(1)))
        .await;

    let err = harness
        .refunds
        .refund(RefundCommand {
            booking_id,
            amount: Some(BigDecimal::from(201)),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SettlementError::RefundAmountExceedsCapture { .. }
    ));

    let err = harness
        .refunds
        .refund(RefundCommand {
            booking_id,
            amount: Some(BigDecimal::from(0)),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::InvalidAmount { .. }));

    assert_eq!(harness.gateway.refund_count(), 0);
}

#[tokio::test]
async fn refunded_attempts_were_captured_first() {
    let harness = Harness::new();
    let booking_id = harness.booking(200).await;
    let (payment_id, _) = initiate(&harness, booking_id, 200).await;

    // No capture yet: nothing can reach refunded.
    let err = harness
        .refunds
        .refund(RefundCommand {
            booking_id,
            amount: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::NoCapturedPayment(_)));
    assert_eq!(
        harness.store.find_by_id(payment_id).await.unwrap().unwrap().status,
        PaymentAttemptStatus::RequiresAction
    );

    harness
        .callbacks
        .handle(harness.gateway.signed_callback(0, Some(1)))
        .await;
    harness
        .refunds
        .refund(RefundCommand {
            booking_id,
            amount: None,
        })
        .await
        .unwrap();

    let attempt = harness.store.find_by_id(payment_id).await.unwrap().unwrap();
    assert_eq!(attempt.status, PaymentAttemptStatus::Refunded);
    assert!(attempt.provider_transaction_id.is_some());
}

#[tokio::test]
async fn late_failure_callback_does_not_unsettle_a_paid_booking() {
    let harness = Harness::new();
    let booking_id = harness.booking(200).await;

    let (stale_id, _) = initiate(&harness, booking_id, 200).await;
    let stale_failure = harness.gateway.signed_callback(1006, None);

    let (paid_id, _) = initiate(&harness, booking_id, 200).await;
    harness
        .callbacks
        .handle(harness.gateway.signed_callback(0, Some(42)))
        .await;

    harness.callbacks.handle(stale_failure).await;

    let stale = harness.store.find_by_id(stale_id).await.unwrap().unwrap();
    assert_eq!(stale.status, PaymentAttemptStatus::Failed);
    let paid = harness.store.find_by_id(paid_id).await.unwrap().unwrap();
    assert_eq!(paid.status, PaymentAttemptStatus::Captured);

    let booking = harness.store.booking(booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Paid);
}
