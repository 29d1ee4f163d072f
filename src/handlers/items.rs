//! Item lookup endpoint, showing path and query coercion.
//!
//! # Endpoints
//!
//! - `GET /items/{id}?flag=...` - `id` arrives as an integer, `flag`
//!   defaults to `"yes"`

use axum::Extension;
use tracing::instrument;

use crate::envelope::{Envelope, json_success};
use crate::error::{AppError, AppResult};
use crate::models::ItemResponse;
use crate::pipeline::Sections;

#[instrument(skip_all)]
pub async fn get_item(
    Extension(sections): Extension<Sections>,
) -> AppResult<Envelope<ItemResponse>> {
    let id = sections
        .params
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AppError::bad_request("Item id must be an integer"))?;
    let flag = sections
        .query
        .get("flag")
        .and_then(|v| v.as_str())
        .unwrap_or("yes")
        .to_string();

    Ok(json_success(ItemResponse { id, flag }))
}
