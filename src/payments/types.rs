use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Momo,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Momo => "momo",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "momo" => Ok(ProviderName::Momo),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported provider: {}", value),
                field: Some("method".to_string()),
            }),
        }
    }
}

/// Lifecycle of a single payment attempt.
///
/// `requires_action -> {captured, failed}`, `captured -> refunded`.
/// `failed` and `refunded` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAttemptStatus {
    RequiresAction,
    Captured,
    Failed,
    Refunded,
}

impl PaymentAttemptStatus {
    pub fn valid_transitions(&self) -> &'static [PaymentAttemptStatus] {
        match self {
            PaymentAttemptStatus::RequiresAction => {
                &[PaymentAttemptStatus::Captured, PaymentAttemptStatus::Failed]
            }
            PaymentAttemptStatus::Captured => &[PaymentAttemptStatus::Refunded],
            PaymentAttemptStatus::Failed | PaymentAttemptStatus::Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, target: PaymentAttemptStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status {
            "requires_action" => Some(PaymentAttemptStatus::RequiresAction),
            "captured" => Some(PaymentAttemptStatus::Captured),
            "failed" => Some(PaymentAttemptStatus::Failed),
            "refunded" => Some(PaymentAttemptStatus::Refunded),
            _ => None,
        }
    }

    pub fn to_db_status(&self) -> &'static str {
        match self {
            PaymentAttemptStatus::RequiresAction => "requires_action",
            PaymentAttemptStatus::Captured => "captured",
            PaymentAttemptStatus::Failed => "failed",
            PaymentAttemptStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentAttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_status())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn from_db_status(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    pub fn to_db_status(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentStatus {
    Pending,
    RequiresAction,
    Paid,
    Refunded,
}

impl BookingPaymentStatus {
    pub fn from_db_status(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(BookingPaymentStatus::Pending),
            "requires_action" => Some(BookingPaymentStatus::RequiresAction),
            "paid" => Some(BookingPaymentStatus::Paid),
            "refunded" => Some(BookingPaymentStatus::Refunded),
            _ => None,
        }
    }

    pub fn to_db_status(&self) -> &'static str {
        match self {
            BookingPaymentStatus::Pending => "pending",
            BookingPaymentStatus::RequiresAction => "requires_action",
            BookingPaymentStatus::Paid => "paid",
            BookingPaymentStatus::Refunded => "refunded",
        }
    }

    /// Money for this booking has moved at least once.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            BookingPaymentStatus::Paid | BookingPaymentStatus::Refunded
        )
    }
}

/// The two booking fields the settlement core owns, plus what it reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub guide_id: Uuid,
    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,
    pub total_price: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub payee_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: ProviderName,
    pub status: PaymentAttemptStatus,
    pub provider_order_id: String,
    pub provider_request_id: String,
    pub provider_transaction_id: Option<String>,
    /// Append-only list of raw provider bodies. Never read by business logic.
    pub provider_payload: JsonValue,
    pub refunded_amount: Option<BigDecimal>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape for a fresh attempt. Only `requires_action` or `failed` are valid here.
#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub payee_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: ProviderName,
    pub status: PaymentAttemptStatus,
    pub provider_order_id: String,
    pub provider_request_id: String,
    pub provider_payload: JsonValue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    CreateResponse,
    CreateError,
    Callback,
    RefundResponse,
    RefundError,
}

/// One entry of an attempt's `provider_payload` trail.
pub fn audit_entry(kind: AuditKind, body: JsonValue) -> JsonValue {
    serde_json::json!({
        "kind": kind,
        "recorded_at": Utc::now().to_rfc3339(),
        "body": body,
    })
}

/// Provider-agnostic create call, already carrying the correlation ids.
#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub order_info: String,
    pub extra_data: String,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentResponse {
    pub result_code: i64,
    pub message: String,
    pub redirect_url: Option<String>,
    pub provider_payload: JsonValue,
}

impl CreatePaymentResponse {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub provider_transaction_id: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct RefundResponse {
    pub result_code: i64,
    pub message: String,
    pub provider_payload: JsonValue,
}

impl RefundResponse {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookVerificationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

/// Converts a decimal amount to whole provider units. Fractions are rejected.
pub fn to_provider_amount(amount: &BigDecimal, field: &str) -> Result<i64, PaymentError> {
    let whole = amount.with_scale(0);
    if &whole != amount {
        return Err(PaymentError::ValidationError {
            message: format!("amount must be a whole number, got {}", amount),
            field: Some(field.to_string()),
        });
    }
    whole
        .to_string()
        .parse::<i64>()
        .map_err(|_| PaymentError::ValidationError {
            message: format!("amount out of range: {}", amount),
            field: Some(field.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_transitions_follow_table() {
        use PaymentAttemptStatus::*;

        assert!(RequiresAction.can_transition_to(Captured));
        assert!(RequiresAction.can_transition_to(Failed));
        assert!(Captured.can_transition_to(Refunded));

        assert!(!RequiresAction.can_transition_to(Refunded));
        assert!(!Captured.can_transition_to(Failed));
        assert!(!Captured.can_transition_to(RequiresAction));
        assert!(!Failed.can_transition_to(Captured));
        assert!(!Refunded.can_transition_to(Captured));

        assert!(Failed.is_terminal());
        assert!(Refunded.is_terminal());
        assert!(!Captured.is_terminal());
    }

    #[test]
    fn db_status_strings_are_stable() {
        for status in [
            PaymentAttemptStatus::RequiresAction,
            PaymentAttemptStatus::Captured,
            PaymentAttemptStatus::Failed,
            PaymentAttemptStatus::Refunded,
        ] {
            assert_eq!(
                PaymentAttemptStatus::from_db_status(status.to_db_status()),
                Some(status)
            );
        }
        assert_eq!(PaymentAttemptStatus::from_db_status("pending"), None);
        assert_eq!(
            BookingPaymentStatus::from_db_status("paid"),
            Some(BookingPaymentStatus::Paid)
        );
        assert_eq!(BookingStatus::Cancelled.to_db_status(), "cancelled");
    }

    #[test]
    fn provider_amount_rejects_fractions() {
        let whole = BigDecimal::from_str("200").unwrap();
        assert_eq!(to_provider_amount(&whole, "amount").unwrap(), 200);

        let scaled = BigDecimal::from_str("200.00").unwrap();
        assert_eq!(to_provider_amount(&scaled, "amount").unwrap(), 200);

        let fraction = BigDecimal::from_str("199.5").unwrap();
        assert!(to_provider_amount(&fraction, "amount").is_err());
    }

    #[test]
    fn audit_entry_has_kind_and_body() {
        let entry = audit_entry(AuditKind::Callback, serde_json::json!({"resultCode": 0}));
        assert_eq!(entry["kind"], "callback");
        assert_eq!(entry["body"]["resultCode"], 0);
        assert!(entry["recorded_at"].is_string());
    }
}
