//! # tollgate
//!
//! Composable request interceptors for axum/tower services:
//!
//! - **Pipeline**: ordered stages over one mutable request context, with a
//!   single fault sink and exactly-once completion callbacks
//! - **Auth**: HMAC bearer token verification, claims exposed as identity
//! - **Validation**: schema coercion of body, query and path parameters
//! - **Correlation**: request ids generated or propagated, echoed on responses
//! - **Access log**: one structured record per request, plus Prometheus metrics
//! - **Envelope**: uniform `{"success": ..}` JSON responses for data and faults
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              tower-http (CORS, security headers)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline: AccessLog → RequestId → AuthGate → Validate      │
//! │                 │ Outcome::Fail                             │
//! │                 └──────────→ terminal::render_fault         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (Extension<Sections>, Extension<Identity>, ...)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use tollgate::middleware::{AccessLog, AuthConfig, AuthGate, RequestId};
//! use tollgate::pipeline::Pipeline;
//!
//! let pipeline = Pipeline::new()
//!     .stage(AccessLog::default())
//!     .stage(RequestId::default())
//!     .stage(AuthGate::new(AuthConfig::new("change-me")));
//!
//! let app: Router = Router::new()
//!     .route("/me", get(|| async { "hello" }))
//!     .layer(pipeline);
//! ```
//!
//! ## Demo Server
//!
//! ```bash
//! JWT_SECRET=change-me cargo run
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod schema;
pub mod state;
pub mod terminal;
pub mod token;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use envelope::{Envelope, json_error, json_success};
pub use error::{AppError, AppResult, ConfigError, ErrorCode, to_http_fault};
pub use pipeline::{Outcome, Pipeline, RequestContext, Stage};
pub use routes::build_router;
pub use state::AppState;
