//! Message submission endpoint.
//!
//! # Endpoints
//!
//! - `POST /messages` - Accept a message; token optional
//!
//! The body has already been validated by the pipeline, so the handler reads
//! the coerced body from [`Sections`] instead of re-parsing the request.

use axum::Extension;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::envelope::{Envelope, json_success};
use crate::error::{AppError, AppResult};
use crate::models::{CreateMessageRequest, MessageAccepted};
use crate::pipeline::{CorrelationId, Identity, Sections};

/// Accept a message.
///
/// # Request Body
///
/// ```json
/// { "message": "hello" }
/// ```
///
/// Responds `201` with the stored message, attributed to the token's `sub`
/// claim when the caller sent one.
#[instrument(skip_all)]
pub async fn create_message(
    Extension(sections): Extension<Sections>,
    identity: Option<Extension<Identity>>,
    correlation: Option<Extension<CorrelationId>>,
) -> AppResult<(StatusCode, Envelope<MessageAccepted>)> {
    let request: CreateMessageRequest = serde_json::from_value(sections.body)
        .map_err(|e| AppError::bad_request(format!("Invalid message body: {e}")))?;

    let author = identity.and_then(|Extension(Identity(claims))| {
        claims.get("sub").and_then(|s| s.as_str()).map(str::to_string)
    });

    let accepted = MessageAccepted {
        id: Uuid::new_v4(),
        message: request.message,
        author,
        request_id: correlation.map(|Extension(CorrelationId(id))| id),
        received_at: Utc::now(),
    };
    info!(message_id = %accepted.id, author = ?accepted.author, "Message accepted");

    Ok((StatusCode::CREATED, json_success(accepted)))
}
