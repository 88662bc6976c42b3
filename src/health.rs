//! Health check module
//! Provides health status for the application and its dependencies

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    /// `None` when running on the in-memory store
    db_pool: Option<sqlx::PgPool>,
}

impl HealthChecker {
    pub fn new(db_pool: Option<sqlx::PgPool>) -> Self {
        Self { db_pool }
    }

    /// Perform comprehensive health check
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();

        let Some(pool) = &self.db_pool else {
            health_status.checks.insert(
                "database".to_string(),
                ComponentHealth::warning(None, Some("in-memory store".to_string())),
            );
            health_status.status = HealthState::Degraded;
            return health_status;
        };

        match timeout(Duration::from_secs(5), check_database_health(pool)).await {
            Ok(Ok(response_time)) => {
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::up(Some(response_time)),
                );
                info!("Database health check: OK ({}ms)", response_time);
            }
            Ok(Err(e)) => {
                health_status.status = HealthState::Unhealthy;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::down(Some(e.to_string())),
                );
                error!("Database health check failed: {}", e);
            }
            Err(_) => {
                health_status.status = HealthState::Unhealthy;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::down(Some("Timeout".to_string())),
                );
                error!("Database health check timed out");
            }
        }

        health_status
    }
}

pub async fn check_database_health(
    pool: &sqlx::PgPool,
) -> Result<u128, Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();
    crate::database::health_check(pool).await?;
    Ok(start.elapsed().as_millis())
}

/// GET /health
pub async fn health(
    State(checker): State<HealthChecker>,
) -> Result<Json<HealthStatus>, (StatusCode, String)> {
    let health_status = checker.check_health().await;

    // Return 503 if any component is unhealthy
    if matches!(health_status.status, HealthState::Unhealthy) {
        error!("Health check failed - service unhealthy");
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        Ok(Json(health_status))
    }
}

/// GET /health/ready - checks if the service is ready to accept traffic
pub async fn readiness(
    state: State<HealthChecker>,
) -> Result<Json<HealthStatus>, (StatusCode, String)> {
    let result = health(state).await;
    if result.is_err() {
        error!("Readiness check failed");
    }
    result
}

/// GET /health/live
pub async fn liveness() -> &'static str {
    "OK"
}
