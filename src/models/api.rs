use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    /// Application version
    pub version: String,
    /// Seconds since the router was built
    pub uptime_seconds: u64,
    /// Timestamp of the check
    pub timestamp: DateTime<Utc>,
}

/// Body accepted by `POST /messages` after validation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageRequest {
    /// Message text (at least 3 characters)
    pub message: String,
}

/// Response after a message was accepted.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageAccepted {
    /// Server-assigned message id
    pub id: Uuid,
    pub message: String,
    /// `sub` claim of the caller, when a token was presented
    pub author: Option<String>,
    /// Correlation id of the request that created it
    pub request_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Response of `GET /items/{id}`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ItemResponse {
    /// Item id, coerced from the path
    pub id: i64,
    /// Query flag (default "yes")
    pub flag: String,
}
