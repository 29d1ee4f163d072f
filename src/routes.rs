//! Demo router wiring the interceptors around a few handlers.
//!
//! # Layer Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │      CORS        │ ← Cross-origin headers, preflight
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Security headers │ ← nosniff, frame options, ...
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← span per request (carries request_id)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Global pipeline  │ ← access log, request id (every route + fallback)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Route pipeline   │ ← auth gate and/or validation, per route
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `GET /health` - public
//! - `GET /me` - bearer token required
//! - `POST /messages` - token optional, body `{"message": string >= 3}`
//! - `GET /items/{id}` - `id` coerced to integer, `flag` query defaults to `"yes"`
//! - anything else - `404 ERR_NOT_FOUND`

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn};

use crate::config::Config;
use crate::error::ConfigError;
use crate::handlers;
use crate::middleware::{
    AccessLog, AccessLogConfig, AuthGate, RequestId, RequestIdConfig, Validate,
    ValidationConfig, cors_layer, security_headers,
};
use crate::pipeline::Pipeline;
use crate::schema::{FieldRule, ObjectSchema};
use crate::state::AppState;
use crate::terminal::not_found;

/// Build the application router with all routes and layers configured.
///
/// # Layer Configuration
///
/// - **Auth gate**: installed on `/me` and `/messages` if `jwt_secret` is set
/// - **Request ID**: header name and trust from config
/// - **CORS**: configured from `cors_allowed_origins`
///
/// # Errors
///
/// Returns [`ConfigError`] if a configured header name is invalid or the
/// JWT secret is blank.
pub fn build_router(config: &Config) -> Result<Router, ConfigError> {
    // =========================================================================
    // Pipelines
    // =========================================================================
    let global = Pipeline::new()
        .stage(AccessLog::new(
            AccessLogConfig::default().header(&config.request_id_header)?,
        ))
        .stage(RequestId::new(
            RequestIdConfig::default()
                .header(&config.request_id_header)?
                .trust_incoming(config.trust_request_id),
        ));

    let gate = AuthGate::from_config(config)?;
    match &gate {
        Some(_) => info!(
            algorithms = ?config.jwt_algorithms,
            credentials_required = config.auth_credentials_required,
            "Bearer token authentication enabled"
        ),
        None => warn!("Bearer token authentication disabled (no JWT_SECRET set)"),
    }

    let mut me = Pipeline::new();
    let mut messages = Pipeline::new().with_body_limit(config.max_request_body_size);
    if let Some(gate) = &gate {
        me = me.stage(gate.clone());
        messages = messages.stage(gate.optional());
    }
    let messages = messages.stage(Validate::new(ValidationConfig::new().body(
        ObjectSchema::new().field("message", FieldRule::string().min_len(3)),
    )));

    let items = Pipeline::new().stage(Validate::new(
        ValidationConfig::new()
            .query(ObjectSchema::new().field("flag", FieldRule::string().default(json!("yes"))))
            .params(ObjectSchema::new().field("id", FieldRule::integer())),
    ));

    info!(
        max_size_mb = config.max_request_body_size / (1024 * 1024),
        "Request body size limit configured"
    );

    // =========================================================================
    // Routes
    // =========================================================================
    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/me", get(handlers::me).route_layer(me))
        .route("/messages", post(handlers::create_message).route_layer(messages))
        .route("/items/{id}", get(handlers::get_item).route_layer(items))
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .with_state(AppState::new(config.clone()));

    // =========================================================================
    // Layers (order matters - last added runs first)
    // =========================================================================
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        info_span!(
            "http_request",
            method = %req.method(),
            uri = %req.uri(),
            request_id = tracing::field::Empty,
        )
    });

    Ok(router
        .layer(global)
        .layer(trace)
        .layer(security_headers())
        .layer(cors_layer(&config.cors_allowed_origins)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_router_without_secret() {
        assert!(build_router(&Config::default()).is_ok());
    }

    #[test]
    fn test_build_router_rejects_bad_header() {
        let config = Config {
            request_id_header: "bad header".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            build_router(&config),
            Err(ConfigError::InvalidHeaderName(_))
        ));
    }

    #[test]
    fn test_build_router_rejects_blank_secret() {
        let config = Config {
            jwt_secret: Some(" ".to_string()),
            ..Config::default()
        };
        assert!(matches!(build_router(&config), Err(ConfigError::EmptySecret)));
    }
}
