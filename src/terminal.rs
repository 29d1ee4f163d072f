//! Terminal handlers: the not-found responder and the fault renderer.
//!
//! [`render_fault`] is the only place a fault becomes a response. Stages,
//! handlers (through `AppError: IntoResponse`) and foreign service errors
//! (through [`handle_error`]) all end up here.

use axum::Json;
use axum::response::{IntoResponse, Response};
use tower::BoxError;
use tracing::{debug, error};

use crate::envelope::json_error;
use crate::error::{AppError, to_http_fault};

/// Render a fault as a JSON error envelope.
///
/// Server errors are logged with their cause; client errors only at debug.
pub fn render_fault(fault: AppError) -> Response {
    if fault.is_server_error() {
        error!(
            status = fault.status.as_u16(),
            code = fault.code.as_deref().unwrap_or(""),
            cause = fault.cause.as_deref().unwrap_or(""),
            "Request failed"
        );
    } else {
        debug!(
            status = fault.status.as_u16(),
            code = fault.code.as_deref().unwrap_or(""),
            message = %fault.message,
            "Request rejected"
        );
    }

    let body = json_error(fault.message, fault.code.as_deref(), fault.details);
    (fault.status, Json(body)).into_response()
}

/// Fallback handler for unmatched routes and unmatched methods on known
/// routes.
///
/// Always answers `404` with the same body, so repeated calls are
/// byte-identical.
pub async fn not_found() -> Response {
    render_fault(AppError::not_found())
}

/// Adapter for `axum::error_handling::HandleErrorLayer`.
///
/// Lets fallible tower middleware (timeouts, load shedding) report through
/// the same envelope as everything else.
pub async fn handle_error(err: BoxError) -> Response {
    render_fault(to_http_fault(err))
}
