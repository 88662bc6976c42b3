//! Unified error handling for the settlement service
//!
//! This module provides one error type for every HTTP-facing failure, with
//! HTTP status mapping, user-friendly messages and structured error codes.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Error codes for programmatic handling by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "BOOKING_NOT_FOUND")]
    BookingNotFound,
    #[serde(rename = "BOOKING_ALREADY_PAID")]
    BookingAlreadyPaid,
    #[serde(rename = "NO_CAPTURED_PAYMENT")]
    NoCapturedPayment,
    #[serde(rename = "REFUND_AMOUNT_EXCEEDS_CAPTURE")]
    RefundAmountExceedsCapture,
    #[serde(rename = "MISSING_PROVIDER_TRANSACTION")]
    MissingProviderTransaction,
    #[serde(rename = "REFUND_CONFLICT")]
    RefundConflict,
    #[serde(rename = "PAYMENT_DECLINED")]
    PaymentDeclined,
    #[serde(rename = "INVALID_CURRENCY")]
    InvalidCurrency,
    #[serde(rename = "INVALID_AMOUNT")]
    InvalidAmount,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 503, 504)
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Settlement business-rule errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Booking with given ID doesn't exist
    BookingNotFound { booking_id: String },
    /// Booking has already been paid (or paid and refunded)
    BookingAlreadyPaid {
        booking_id: String,
        payment_status: String,
    },
    /// Refund requested but nothing was ever captured
    NoCapturedPayment { booking_id: String },
    /// Refund amount is larger than the captured amount
    RefundAmountExceedsCapture { requested: String, captured: String },
    /// Capture was recorded without a provider transaction id
    MissingProviderTransaction { payment_id: String },
    /// Attempt changed state while the refund was in flight
    RefundConflict { payment_id: String },
    /// Provider answered with a non-zero result code
    ProviderDeclined {
        provider: String,
        result_code: i64,
        message: String,
    },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Payment provider unreachable or returned garbage
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    /// Rate limit exceeded
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    /// External service timeout
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Currency other than the settlement currency
    InvalidCurrency { currency: String, reason: String },
    /// Invalid amount (format or value)
    InvalidAmount { amount: String, reason: String },
    /// Required field missing
    MissingField { field: String },
    /// Any other malformed field
    InvalidField { field: String, reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
    pub details: Option<JsonValue>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
            details: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach machine-readable details, e.g. the provider payload of a rejected refund
    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::BookingNotFound { .. } => 404,
                DomainError::BookingAlreadyPaid { .. } => 409, // Conflict
                DomainError::NoCapturedPayment { .. } => 422,  // Unprocessable Entity
                DomainError::RefundAmountExceedsCapture { .. } => 422,
                DomainError::MissingProviderTransaction { .. } => 422,
                DomainError::RefundConflict { .. } => 409,
                DomainError::ProviderDeclined { .. } => 402, // Payment Required
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => {
                    if *is_retryable {
                        503
                    } else {
                        502
                    }
                }
                ExternalError::RateLimit { .. } => 503,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::BookingNotFound { .. } => ErrorCode::BookingNotFound,
                DomainError::BookingAlreadyPaid { .. } => ErrorCode::BookingAlreadyPaid,
                DomainError::NoCapturedPayment { .. } => ErrorCode::NoCapturedPayment,
                DomainError::RefundAmountExceedsCapture { .. } => {
                    ErrorCode::RefundAmountExceedsCapture
                }
                DomainError::MissingProviderTransaction { .. } => {
                    ErrorCode::MissingProviderTransaction
                }
                DomainError::RefundConflict { .. } => ErrorCode::RefundConflict,
                DomainError::ProviderDeclined { .. } => ErrorCode::PaymentDeclined,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidCurrency { .. } => ErrorCode::InvalidCurrency,
                ValidationError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
                _ => ErrorCode::ValidationError,
            },
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::BookingNotFound { booking_id } => {
                    format!("Booking '{}' not found", booking_id)
                }
                DomainError::BookingAlreadyPaid {
                    booking_id,
                    payment_status,
                } => {
                    format!(
                        "Booking '{}' cannot be paid again (payment status: {})",
                        booking_id, payment_status
                    )
                }
                DomainError::NoCapturedPayment { booking_id } => {
                    format!("Booking '{}' has no captured payment to refund", booking_id)
                }
                DomainError::RefundAmountExceedsCapture {
                    requested,
                    captured,
                } => {
                    format!(
                        "Refund amount {} exceeds captured amount {}",
                        requested, captured
                    )
                }
                DomainError::MissingProviderTransaction { payment_id } => {
                    format!(
                        "Payment '{}' has no provider transaction id; refund must be handled manually",
                        payment_id
                    )
                }
                DomainError::RefundConflict { payment_id } => {
                    format!(
                        "Payment '{}' changed while the refund was processed. Check its status before retrying",
                        payment_id
                    )
                }
                DomainError::ProviderDeclined {
                    provider,
                    result_code,
                    message,
                } => {
                    format!(
                        "Payment provider ({}) declined the request (code {}): {}",
                        provider, result_code, message
                    )
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider {
                    provider,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!(
                            "Payment provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        "Payment processing failed. Please contact support".to_string()
                    }
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!(
                            "Rate limit exceeded for {}. Please try again later",
                            service
                        )
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidCurrency { currency, reason } => {
                    format!("Invalid currency '{}': {}", currency, reason)
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(err) => matches!(err, DomainError::RefundConflict { .. }),
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => *is_retryable,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// Conversions from specific error types live next to those types
// (database/error.rs, payments/error.rs, services/error.rs).

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
