//! Read-only payment views composed from the booking and its attempts.

use crate::payments::store::SettlementStore;
use crate::payments::types::{BookingPaymentStatus, BookingStatus, PaymentAttempt};
use crate::services::error::{SettlementError, SettlementResult};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentStatusView {
    pub booking_id: Uuid,
    pub payment_status: BookingPaymentStatus,
    pub booking_status: BookingStatus,
    pub latest_attempt: Option<PaymentAttempt>,
}

pub struct PaymentStatusService {
    store: Arc<dyn SettlementStore>,
}

impl PaymentStatusService {
    pub fn new(store: Arc<dyn SettlementStore>) -> Self {
        Self { store }
    }

    pub async fn status(&self, booking_id: Uuid) -> SettlementResult<PaymentStatusView> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(SettlementError::BookingNotFound(booking_id))?;
        let latest_attempt = self.store.find_latest_by_booking(booking_id).await?;

        Ok(PaymentStatusView {
            booking_id,
            payment_status: booking.payment_status,
            booking_status: booking.status,
            latest_attempt,
        })
    }

    /// Newest first.
    pub async fn attempts(&self, booking_id: Uuid) -> SettlementResult<Vec<PaymentAttempt>> {
        if self.store.get_booking(booking_id).await?.is_none() {
            return Err(SettlementError::BookingNotFound(booking_id));
        }
        Ok(self.store.list_by_booking(booking_id).await?)
    }
}
