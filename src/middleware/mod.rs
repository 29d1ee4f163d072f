//! Request interceptors and boundary layers.
//!
//! Pipeline stages (run inside [`Pipeline`](crate::pipeline::Pipeline)):
//!
//! - **Access Log**: one structured record per completed request
//! - **Request ID**: correlation id generation and propagation
//! - **Auth**: bearer token verification, decoded claims as identity
//! - **Validate**: schema coercion of body, query and path parameters
//!
//! Boundary layers (plain tower-http layers on the router):
//!
//! - **Security headers** and **CORS**
//!
//! # Architecture
//!
//! ```text
//! Request → Access Log → Request ID → Auth → Validate → Handler → Response
//!               ↓             ↓          ↓        ↓
//!         record on    X-Request-Id    401      400 ERR_VALIDATION
//!          completion     header
//! ```
//!
//! # Security Considerations
//!
//! - Token rejection reasons are logged, never returned to the client
//! - Untrusted deployments should set `trust_incoming = false` so clients
//!   cannot choose their own correlation ids
//! - Security headers never override values set by a handler

pub mod access_log;
pub mod auth;
pub mod request_id;
pub mod security;
pub mod validate;

pub use access_log::{AccessLog, AccessLogConfig, AccessLogger, AccessRecord, TracingLogger};
pub use auth::{AuthConfig, AuthGate};
pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdConfig};
pub use security::{cors_layer, security_headers};
pub use validate::{Section, Validate, ValidationConfig};
