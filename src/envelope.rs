//! Uniform JSON response envelope.
//!
//! Every response produced by this crate uses one of two shapes:
//!
//! ```json
//! {"success": true, "data": <T>}
//! {"success": false, "error": {"message": "...", "code": "ERR_...", "details": ...}}
//! ```
//!
//! `code` and `details` are omitted when absent.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Error half of the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<Value>,
}

/// Response envelope with an explicit `success` discriminant.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success(T),
    Error(ErrorBody),
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Envelope", 2)?;
        match self {
            Envelope::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            Envelope::Error(error) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = match self {
            Envelope::Success(_) => StatusCode::OK,
            Envelope::Error(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Wrap `data` in a success envelope.
pub fn json_success<T>(data: T) -> Envelope<T> {
    Envelope::Success(data)
}

/// Build an error envelope.
pub fn json_error(
    message: impl Into<String>,
    code: Option<&str>,
    details: Option<Value>,
) -> Envelope<()> {
    Envelope::Error(ErrorBody {
        message: message.into(),
        code: code.map(str::to_string),
        details,
    })
}
