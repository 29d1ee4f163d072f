//! Health endpoint.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness check, never behind the auth gate

use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use crate::envelope::{Envelope, json_success};
use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "success": true,
///   "data": {
///     "status": "healthy",
///     "version": "0.1.0",
///     "uptime_seconds": 42,
///     "timestamp": "2024-01-15T10:30:00Z"
///   }
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Envelope<HealthResponse> {
    json_success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}
