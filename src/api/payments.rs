//! Payment endpoints exposed to the booking application

use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::payments::types::{
    BookingPaymentStatus, BookingStatus, PaymentAttempt, PaymentAttemptStatus, ProviderName,
};
use crate::services::{
    InitiatePaymentCommand, PaymentInitiator, PaymentStatusService, RefundCommand,
    RefundInitiator,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentsState {
    pub initiator: Arc<PaymentInitiator>,
    pub refunds: Arc<RefundInitiator>,
    pub status: Arc<PaymentStatusService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentBody {
    pub booking_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponseBody {
    pub payment_id: Uuid,
    pub order_id: String,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundBody {
    pub booking_id: Uuid,
    #[serde(default)]
    pub amount: Option<BigDecimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponseBody {
    pub status: PaymentAttemptStatus,
    pub payment_id: Uuid,
    pub refunded_amount: BigDecimal,
    pub provider_payload: JsonValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptBody {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: ProviderName,
    pub status: PaymentAttemptStatus,
    pub provider_order_id: String,
    pub provider_transaction_id: Option<String>,
    pub refunded_amount: Option<BigDecimal>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub provider_payload: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentAttempt> for AttemptBody {
    fn from(attempt: PaymentAttempt) -> Self {
        Self {
            id: attempt.id,
            booking_id: attempt.booking_id,
            amount: attempt.amount,
            currency: attempt.currency,
            method: attempt.method,
            status: attempt.status,
            provider_order_id: attempt.provider_order_id,
            provider_transaction_id: attempt.provider_transaction_id,
            refunded_amount: attempt.refunded_amount,
            refunded_at: attempt.refunded_at,
            provider_payload: attempt.provider_payload,
            created_at: attempt.created_at,
            updated_at: attempt.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusBody {
    pub booking_id: Uuid,
    pub payment_status: BookingPaymentStatus,
    pub booking_status: BookingStatus,
    pub latest_attempt: Option<AttemptBody>,
}

/// POST /api/payments/momo/create
pub async fn create_payment(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    Json(body): Json<CreatePaymentBody>,
) -> Result<(StatusCode, Json<CreatePaymentResponseBody>), AppError> {
    info!(booking_id = %body.booking_id, "payment creation requested");

    let initiated = state
        .initiator
        .initiate(InitiatePaymentCommand {
            booking_id: body.booking_id,
            amount: body.amount,
            currency: body.currency,
        })
        .await
        .map_err(|e| with_request_id(e.into(), &headers))?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponseBody {
            payment_id: initiated.payment_id,
            order_id: initiated.order_id,
            redirect_url: initiated.redirect_url,
        }),
    ))
}

/// POST /api/payments/momo/refund
pub async fn refund_payment(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    Json(body): Json<RefundBody>,
) -> Result<Json<RefundResponseBody>, AppError> {
    info!(booking_id = %body.booking_id, "refund requested");

    let refunded = state
        .refunds
        .refund(RefundCommand {
            booking_id: body.booking_id,
            amount: body.amount,
        })
        .await
        .map_err(|e| with_request_id(e.into(), &headers))?;

    Ok(Json(RefundResponseBody {
        status: refunded.status,
        payment_id: refunded.payment_id,
        refunded_amount: refunded.refunded_amount,
        provider_payload: refunded.provider_payload,
    }))
}

/// GET /api/payments/bookings/{booking_id}/status
pub async fn get_payment_status(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<PaymentStatusBody>, AppError> {
    let view = state
        .status
        .status(booking_id)
        .await
        .map_err(|e| with_request_id(e.into(), &headers))?;

    Ok(Json(PaymentStatusBody {
        booking_id: view.booking_id,
        payment_status: view.payment_status,
        booking_status: view.booking_status,
        latest_attempt: view.latest_attempt.map(AttemptBody::from),
    }))
}

/// GET /api/payments/bookings/{booking_id}/attempts
pub async fn list_payment_attempts(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Vec<AttemptBody>>, AppError> {
    let attempts = state
        .status
        .attempts(booking_id)
        .await
        .map_err(|e| with_request_id(e.into(), &headers))?;

    Ok(Json(attempts.into_iter().map(AttemptBody::from).collect()))
}

fn with_request_id(error: AppError, headers: &HeaderMap) -> AppError {
    match get_request_id_from_headers(headers) {
        Some(request_id) => error.with_request_id(request_id),
        None => error,
    }
}
