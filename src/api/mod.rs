//! HTTP surface: payment endpoints, gateway callback and health probes

pub mod payments;
pub mod webhooks;

use crate::health::{self, HealthChecker};
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::CallbackProcessor;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

/// Everything the router needs, built once at start-up.
#[derive(Clone)]
pub struct ApiState {
    pub payments: payments::PaymentsState,
    pub callbacks: Arc<CallbackProcessor>,
    pub health: HealthChecker,
}

pub fn router(state: ApiState) -> Router {
    let payment_routes = Router::new()
        .route("/api/payments/momo/create", post(payments::create_payment))
        .route("/api/payments/momo/refund", post(payments::refund_payment))
        .route(
            "/api/payments/bookings/{booking_id}/status",
            get(payments::get_payment_status),
        )
        .route(
            "/api/payments/bookings/{booking_id}/attempts",
            get(payments::list_payment_attempts),
        )
        .with_state(state.payments);

    let webhook_routes = Router::new()
        .route("/webhooks/momo", post(webhooks::handle_momo_callback))
        .with_state(Arc::new(webhooks::WebhookState {
            processor: state.callbacks,
        }));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/health/live", get(health::liveness))
        .with_state(state.health);

    Router::new()
        .merge(payment_routes)
        .merge(webhook_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
