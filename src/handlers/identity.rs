//! Identity echo endpoint.
//!
//! # Endpoints
//!
//! - `GET /me` - Returns the decoded claims of the caller's token

use axum::Extension;
use serde_json::Value;
use tracing::instrument;

use crate::envelope::{Envelope, json_success};
use crate::error::{AppError, AppResult};
use crate::pipeline::Identity;

/// Return the verified claims set, unchanged.
///
/// Without an identity (no auth gate installed, or a gate that let an
/// anonymous request through) the answer is `401 ERR_UNAUTHORIZED`.
#[instrument(skip_all)]
pub async fn me(identity: Option<Extension<Identity>>) -> AppResult<Envelope<Value>> {
    let Some(Extension(Identity(claims))) = identity else {
        return Err(AppError::unauthorized());
    };

    Ok(json_success(claims))
}
