//! Request ID stage for log correlation.
//!
//! # Features
//!
//! - Reuses an incoming `X-Request-Id` header when trusted
//! - Generates a UUIDv4 otherwise (swappable generator)
//! - Stores the id in the request context and forwarded request headers
//! - Echoes the id on every response, including error responses
//! - Records the id on the current tracing span
//!
//! # Client Usage
//!
//! Clients can provide their own request ID:
//!
//! ```bash
//! curl -H "X-Request-Id: my-correlation-id" http://localhost:3000/health
//! ```
//!
//! The same ID will be returned in the response for correlation, unless the
//! stage is configured with `trust_incoming = false`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::HeaderName;
use axum::http::header::HeaderValue;
use chrono::Utc;
use rand::TryRngCore;
use rand::rngs::OsRng;
use tracing::{Span, debug, warn};

use crate::error::ConfigError;
use crate::pipeline::{Outcome, RequestContext, Stage, StageFuture};

/// Default header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fallback header value when the id is not a valid header value.
/// Using `from_static` avoids runtime parsing and is infallible.
static UNKNOWN_REQUEST_ID: HeaderValue = HeaderValue::from_static("unknown");

/// Mints a fresh request id.
pub type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// Default generator: a UUIDv4 from OS randomness.
///
/// Never fails. If the OS random source is unavailable, returns a
/// `<unix millis>-<hex fraction>` composite instead.
pub fn generate_request_id() -> String {
    let mut bytes = [0u8; 16];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string(),
        Err(e) => {
            warn!(error = %e, "OS random source unavailable, using fallback request id");
            fallback_request_id()
        }
    }
}

fn fallback_request_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let now = Utc::now();
    let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);
    let fraction = (u64::from(now.timestamp_subsec_nanos()) << 20) ^ sequence;
    format!("{}-{fraction:x}", now.timestamp_millis())
}

/// Configuration for [`RequestId`].
#[derive(Clone)]
pub struct RequestIdConfig {
    pub header: HeaderName,
    /// Reuse the incoming header value when present.
    pub trust_incoming: bool,
    pub generator: Generator,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(REQUEST_ID_HEADER),
            trust_incoming: true,
            generator: Arc::new(generate_request_id),
        }
    }
}

impl RequestIdConfig {
    /// Use a custom header name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHeaderName`] if `name` is not a valid
    /// HTTP header name.
    pub fn header(mut self, name: &str) -> Result<Self, ConfigError> {
        self.header = HeaderName::try_from(name)
            .map_err(|_| ConfigError::InvalidHeaderName(name.to_string()))?;
        Ok(self)
    }

    pub fn trust_incoming(mut self, trust: bool) -> Self {
        self.trust_incoming = trust;
        self
    }

    pub fn generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generator = Arc::new(generator);
        self
    }
}

impl fmt::Debug for RequestIdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIdConfig")
            .field("header", &self.header)
            .field("trust_incoming", &self.trust_incoming)
            .finish_non_exhaustive()
    }
}

/// Stage assigning a correlation id to every request.
#[derive(Clone, Debug, Default)]
pub struct RequestId {
    config: RequestIdConfig,
}

impl RequestId {
    pub fn new(config: RequestIdConfig) -> Self {
        Self { config }
    }

    /// Extract request ID from headers or generate a new one.
    fn extract_or_generate(&self, ctx: &RequestContext) -> String {
        if self.config.trust_incoming
            && let Some(header_value) = ctx.headers.get(&self.config.header)
            && let Ok(value) = header_value.to_str()
            && !value.is_empty()
        {
            return value.to_string();
        }

        (self.config.generator)()
    }

    fn assign(&self, ctx: &mut RequestContext) {
        let request_id = self.extract_or_generate(ctx);
        let header_value = HeaderValue::from_str(&request_id)
            .unwrap_or_else(|_| UNKNOWN_REQUEST_ID.clone());

        // Handlers behind the pipeline read it from the forwarded headers too
        ctx.headers
            .insert(self.config.header.clone(), header_value.clone());
        ctx.correlation_id = Some(request_id.clone());

        Span::current().record("request_id", request_id.as_str());
        debug!(request_id = %request_id, "Processing request");

        let header = self.config.header.clone();
        ctx.on_complete(move |_, response| {
            response.headers_mut().insert(header, header_value);
        });
    }
}

impl Stage for RequestId {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> StageFuture<'a> {
        Box::pin(async move {
            self.assign(ctx);
            Outcome::Continue
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Method, Uri};
    use axum::response::Response;
    use uuid::Uuid;

    fn ctx_with(header: Option<(&'static str, &'static str)>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some((name, value)) = header {
            headers.insert(name, HeaderValue::from_static(value));
        }
        RequestContext::new(Method::GET, Uri::from_static("/"), headers)
    }

    fn fixed() -> RequestIdConfig {
        RequestIdConfig::default().generator(|| "generated-1".to_string())
    }

    fn finish(mut ctx: RequestContext) -> Response {
        let mut response = Response::new(Body::empty());
        ctx.complete(&mut response);
        response
    }

    #[test]
    fn test_existing_request_id_is_reused() {
        let stage = RequestId::new(fixed());
        let mut ctx = ctx_with(Some(("x-request-id", "abc-123")));

        stage.assign(&mut ctx);

        assert_eq!(ctx.correlation_id.as_deref(), Some("abc-123"));
        let response = finish(ctx);
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[test]
    fn test_untrusted_incoming_is_replaced() {
        let stage = RequestId::new(fixed().trust_incoming(false));
        let mut ctx = ctx_with(Some(("x-request-id", "abc-123")));

        stage.assign(&mut ctx);

        assert_eq!(ctx.correlation_id.as_deref(), Some("generated-1"));
        assert_eq!(ctx.headers["x-request-id"], "generated-1");
        let response = finish(ctx);
        assert_eq!(response.headers()["x-request-id"], "generated-1");
    }

    #[test]
    fn test_empty_incoming_is_replaced() {
        let stage = RequestId::new(fixed());
        let mut ctx = ctx_with(Some(("x-request-id", "")));

        stage.assign(&mut ctx);
        assert_eq!(ctx.correlation_id.as_deref(), Some("generated-1"));
    }

    #[test]
    fn test_custom_header_name() {
        let config = fixed().header("X-Correlation-Id").unwrap();
        let stage = RequestId::new(config);
        let mut ctx = ctx_with(Some(("x-correlation-id", "corr-9")));

        stage.assign(&mut ctx);

        let response = finish(ctx);
        assert_eq!(response.headers()["x-correlation-id"], "corr-9");
        assert!(response.headers().get(REQUEST_ID_HEADER).is_none());
    }

    #[test]
    fn test_invalid_header_name() {
        let result = RequestIdConfig::default().header("bad header");
        assert!(matches!(result, Err(ConfigError::InvalidHeaderName(_))));
    }

    #[test]
    fn test_generate_new_request_id() {
        let id = generate_request_id();

        // Should be a valid UUID
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, generate_request_id());
    }

    #[test]
    fn test_fallback_request_id_shape() {
        let id = fallback_request_id();
        let (millis, fraction) = id.split_once('-').unwrap();

        assert!(millis.parse::<i64>().is_ok());
        assert!(u64::from_str_radix(fraction, 16).is_ok());
        assert_ne!(id, fallback_request_id());
    }
}
