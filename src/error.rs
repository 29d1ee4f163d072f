use std::any::Any;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use tower::BoxError;

/// Generic message sent to clients for every unrecognized failure.
pub const INTERNAL_MESSAGE: &str = "Internal Server Error";

/// Machine-readable error codes carried in the `error.code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Credential missing where one is required.
    Unauthorized,
    /// Credential present but failed verification.
    InvalidToken,
    /// No route matched.
    NotFound,
    /// One or more request sections failed schema coercion.
    Validation,
    /// Request body could not be read as JSON.
    BadRequest,
    /// Request body exceeded the buffering limit.
    PayloadTooLarge,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "ERR_UNAUTHORIZED",
            ErrorCode::InvalidToken => "ERR_INVALID_TOKEN",
            ErrorCode::NotFound => "ERR_NOT_FOUND",
            ErrorCode::Validation => "ERR_VALIDATION",
            ErrorCode::BadRequest => "ERR_BAD_REQUEST",
            ErrorCode::PayloadTooLarge => "ERR_PAYLOAD_TOO_LARGE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application fault propagated through the pipeline and rendered once.
///
/// Faults are plain data: constructing one never fails and the status
/// defaults to `500 Internal Server Error`. The `cause` is kept for
/// server-side logs only and is never serialized to clients.
///
/// # Example
///
/// ```rust
/// use axum::http::StatusCode;
/// use tollgate::error::{AppError, ErrorCode};
///
/// let fault = AppError::new("Payment required")
///     .with_status(StatusCode::PAYMENT_REQUIRED)
///     .with_code("ERR_PAYMENT");
/// assert_eq!(fault.status, StatusCode::PAYMENT_REQUIRED);
///
/// let fault = AppError::unauthorized();
/// assert_eq!(fault.code.as_deref(), Some(ErrorCode::Unauthorized.as_str()));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct AppError {
    pub message: String,
    pub status: StatusCode,
    pub code: Option<String>,
    pub details: Option<Value>,
    pub cause: Option<String>,
}

impl AppError {
    /// Create a fault with the given message and status 500.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: None,
            details: None,
            cause: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Missing credential on a route that requires one.
    pub fn unauthorized() -> Self {
        Self::new("Unauthorized")
            .with_status(StatusCode::UNAUTHORIZED)
            .with_code(ErrorCode::Unauthorized.as_str())
    }

    /// Credential present but rejected by verification.
    pub fn invalid_token() -> Self {
        Self::new("Invalid token")
            .with_status(StatusCode::UNAUTHORIZED)
            .with_code(ErrorCode::InvalidToken.as_str())
    }

    pub fn not_found() -> Self {
        Self::new("Not Found")
            .with_status(StatusCode::NOT_FOUND)
            .with_code(ErrorCode::NotFound.as_str())
    }

    /// Validation failure. `details` maps section names to issue lists;
    /// `None` when the schema itself broke and no issues are available.
    pub fn validation(details: Option<Value>) -> Self {
        let fault = Self::new("Validation failed")
            .with_status(StatusCode::BAD_REQUEST)
            .with_code(ErrorCode::Validation.as_str());
        match details {
            Some(details) => fault.with_details(details),
            None => fault,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message)
            .with_status(StatusCode::BAD_REQUEST)
            .with_code(ErrorCode::BadRequest.as_str())
    }

    pub fn payload_too_large() -> Self {
        Self::new("Payload Too Large")
            .with_status(StatusCode::PAYLOAD_TOO_LARGE)
            .with_code(ErrorCode::PayloadTooLarge.as_str())
    }

    /// Generic 500. The cause is retained for logging but never rendered.
    pub fn internal(cause: impl Into<String>) -> Self {
        Self {
            cause: Some(cause.into()),
            ..Self::new(INTERNAL_MESSAGE)
        }
    }

    /// Normalize a panic payload. Panics carry no error type, so they always
    /// become the generic internal fault.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let cause = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with non-string payload".to_string());
        Self::internal(cause)
    }

    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }
}

/// Normalize any failure into an [`AppError`].
///
/// Faults pass through untouched; every other error becomes the generic
/// internal fault with the original message kept as `cause`. Applying this
/// twice gives the same result as applying it once.
pub fn to_http_fault(err: BoxError) -> AppError {
    match err.downcast::<AppError>() {
        Ok(fault) => *fault,
        Err(other) => AppError::internal(other.to_string()),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        crate::terminal::render_fault(self)
    }
}

/// Errors raised while loading configuration or building interceptors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("Invalid {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Unsupported signing algorithm '{0}' (expected HS256, HS384 or HS512)")]
    UnsupportedAlgorithm(String),

    #[error("JWT secret must not be empty")]
    EmptySecret,
}

/// Convenience type alias for handler results.
pub type AppResult<T> = Result<T, AppError>;
