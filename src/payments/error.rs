use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Provider timeout after {timeout_secs}s")]
    TimeoutError { timeout_secs: u64 },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },

    #[error("Invalid provider response: {message}")]
    InvalidResponse { provider: String, message: String },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::TimeoutError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::ProviderError { retryable, .. } => *retryable,
            PaymentError::InvalidResponse { .. } => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::TimeoutError { .. } => 504,
            PaymentError::RateLimitError { .. } => 429,
            PaymentError::ProviderError { .. } => 502,
            PaymentError::InvalidResponse { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::NetworkError { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            PaymentError::TimeoutError { .. } => {
                "Payment provider did not respond in time".to_string()
            }
            PaymentError::RateLimitError { .. } => {
                "Too many requests to payment provider. Please retry shortly".to_string()
            }
            PaymentError::ProviderError { .. } | PaymentError::InvalidResponse { .. } => {
                "Payment provider returned an error".to_string()
            }
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError, ValidationError};

        match err {
            PaymentError::ValidationError { message, field } => {
                AppError::new(AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    reason: message,
                }))
            }
            PaymentError::TimeoutError { timeout_secs } => {
                AppError::new(AppErrorKind::External(ExternalError::Timeout {
                    service: "momo".to_string(),
                    timeout_secs,
                }))
            }
            PaymentError::RateLimitError {
                retry_after_seconds,
                ..
            } => AppError::new(AppErrorKind::External(ExternalError::RateLimit {
                service: "momo".to_string(),
                retry_after: retry_after_seconds,
            })),
            other => AppError::new(AppErrorKind::External(ExternalError::PaymentProvider {
                provider: "momo".to_string(),
                message: other.to_string(),
                is_retryable: other.is_retryable(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(
            PaymentError::ValidationError {
                message: "bad".to_string(),
                field: None
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            PaymentError::TimeoutError { timeout_secs: 30 }.http_status_code(),
            504
        );
        assert_eq!(
            PaymentError::InvalidResponse {
                provider: "momo".to_string(),
                message: "not json".to_string()
            }
            .http_status_code(),
            502
        );
    }

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::NetworkError {
            message: "connection reset".to_string()
        }
        .is_retryable());
        assert!(PaymentError::TimeoutError { timeout_secs: 30 }.is_retryable());
        assert!(!PaymentError::InvalidResponse {
            provider: "momo".to_string(),
            message: "garbled".to_string()
        }
        .is_retryable());
    }
}
