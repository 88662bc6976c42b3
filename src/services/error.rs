use crate::database::error::DatabaseError;
use crate::error::{AppError, AppErrorKind, DomainError, ValidationError};
use crate::payments::error::PaymentError;
use crate::payments::types::ProviderName;
use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

pub type SettlementResult<T> = Result<T, SettlementError>;

/// Errors returned by the initiate and refund orchestrators.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Unsupported currency {currency}, expected {expected}")]
    InvalidCurrency { currency: String, expected: String },

    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("Booking {booking_id} already settled ({payment_status})")]
    BookingAlreadyPaid {
        booking_id: Uuid,
        payment_status: String,
    },

    #[error("Booking {0} has no captured payment")]
    NoCapturedPayment(Uuid),

    #[error("Refund amount {requested} exceeds captured amount {captured}")]
    RefundAmountExceedsCapture {
        requested: BigDecimal,
        captured: BigDecimal,
    },

    #[error("Payment {0} was captured without a provider transaction id")]
    MissingProviderTransaction(Uuid),

    #[error("Provider rejected the request with result code {result_code}: {message}")]
    ProviderRejected {
        result_code: i64,
        message: String,
        provider_payload: JsonValue,
    },

    #[error("Payment {0} is no longer refundable")]
    RefundConflict(Uuid),

    #[error(transparent)]
    Provider(#[from] PaymentError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::InvalidCurrency { currency, expected } => {
                AppError::new(AppErrorKind::Validation(ValidationError::InvalidCurrency {
                    currency,
                    reason: format!("Only {} is supported", expected),
                }))
            }
            SettlementError::InvalidAmount { amount, reason } => {
                AppError::new(AppErrorKind::Validation(ValidationError::InvalidAmount {
                    amount,
                    reason,
                }))
            }
            SettlementError::BookingNotFound(booking_id) => {
                AppError::new(AppErrorKind::Domain(DomainError::BookingNotFound {
                    booking_id: booking_id.to_string(),
                }))
            }
            SettlementError::BookingAlreadyPaid {
                booking_id,
                payment_status,
            } => AppError::new(AppErrorKind::Domain(DomainError::BookingAlreadyPaid {
                booking_id: booking_id.to_string(),
                payment_status,
            })),
            SettlementError::NoCapturedPayment(booking_id) => {
                AppError::new(AppErrorKind::Domain(DomainError::NoCapturedPayment {
                    booking_id: booking_id.to_string(),
                }))
            }
            SettlementError::RefundAmountExceedsCapture {
                requested,
                captured,
            } => AppError::new(AppErrorKind::Domain(
                DomainError::RefundAmountExceedsCapture {
                    requested: requested.to_string(),
                    captured: captured.to_string(),
                },
            )),
            SettlementError::MissingProviderTransaction(payment_id) => AppError::new(
                AppErrorKind::Domain(DomainError::MissingProviderTransaction {
                    payment_id: payment_id.to_string(),
                }),
            ),
            SettlementError::ProviderRejected {
                result_code,
                message,
                provider_payload,
            } => AppError::new(AppErrorKind::Domain(DomainError::ProviderDeclined {
                provider: ProviderName::Momo.to_string(),
                result_code,
                message,
            }))
            .with_details(provider_payload),
            SettlementError::RefundConflict(payment_id) => {
                AppError::new(AppErrorKind::Domain(DomainError::RefundConflict {
                    payment_id: payment_id.to_string(),
                }))
            }
            SettlementError::Provider(e) => e.into(),
            SettlementError::Storage(e) => e.into(),
        }
    }
}
