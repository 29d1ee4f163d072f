//! Access log stage: one structured record per completed request.
//!
//! The stage notes the start time and continues immediately. The record is
//! written from a completion callback, so it fires exactly once however the
//! request ends: handler response, fault rendered by the pipeline, or the
//! not-found fallback.
//!
//! # Record
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `id` | correlation id, if any |
//! | `method` | request method |
//! | `url` | request target as received (path and query) |
//! | `status` | final response status |
//! | `duration` | milliseconds since the stage ran |
//!
//! Place it first in the pipeline so the duration covers every other stage.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderName;
use serde::Serialize;
use tracing::info;

use crate::error::ConfigError;
use crate::metrics::record_request;
use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::pipeline::{Outcome, RequestContext, Stage, StageFuture};

/// Message tag attached to every access record.
pub const ACCESS_LOG_MESSAGE: &str = "request";

/// One completed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRecord {
    pub id: Option<String>,
    pub method: String,
    pub url: String,
    pub status: u16,
    /// Milliseconds.
    pub duration: u64,
}

/// Sink for access records.
///
/// The default body discards the record, so a logger that only cares about
/// some records can implement nothing at all.
pub trait AccessLogger: Send + Sync {
    fn info(&self, record: &AccessRecord, message: &str) {
        let _ = (record, message);
    }
}

/// Emits records as `tracing` events at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl AccessLogger for TracingLogger {
    fn info(&self, record: &AccessRecord, message: &str) {
        info!(
            id = record.id.as_deref().unwrap_or("-"),
            method = %record.method,
            url = %record.url,
            status = record.status,
            duration_ms = record.duration,
            "{message}"
        );
    }
}

/// Configuration for [`AccessLog`].
#[derive(Clone)]
pub struct AccessLogConfig {
    /// Header read when no stage recorded a correlation id.
    pub header: HeaderName,
    pub logger: Arc<dyn AccessLogger>,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(REQUEST_ID_HEADER),
            logger: Arc::new(TracingLogger),
        }
    }
}

impl AccessLogConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHeaderName`] if `name` is not a valid
    /// HTTP header name.
    pub fn header(mut self, name: &str) -> Result<Self, ConfigError> {
        self.header = HeaderName::try_from(name)
            .map_err(|_| ConfigError::InvalidHeaderName(name.to_string()))?;
        Ok(self)
    }

    pub fn logger(mut self, logger: impl AccessLogger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }
}

impl fmt::Debug for AccessLogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogConfig")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

/// Stage writing one [`AccessRecord`] per request.
#[derive(Clone, Debug, Default)]
pub struct AccessLog {
    config: AccessLogConfig,
}

impl AccessLog {
    pub fn new(config: AccessLogConfig) -> Self {
        Self { config }
    }

    fn register(&self, ctx: &mut RequestContext) {
        let start = Instant::now();
        let header = self.config.header.clone();
        let logger = self.config.logger.clone();

        ctx.on_complete(move |ctx, response| {
            let duration = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let id = ctx.correlation_id.clone().or_else(|| {
                response
                    .headers()
                    .get(&header)
                    .or_else(|| ctx.headers.get(&header))
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            });

            let record = AccessRecord {
                id,
                method: ctx.method.to_string(),
                url: ctx
                    .uri
                    .path_and_query()
                    .map_or_else(|| ctx.path().to_string(), |pq| pq.as_str().to_string()),
                status: response.status().as_u16(),
                duration,
            };

            record_request(
                &record.method,
                record.status,
                start.elapsed().as_secs_f64(),
            );
            logger.info(&record, ACCESS_LOG_MESSAGE);
        });
    }
}

impl Stage for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> StageFuture<'a> {
        Box::pin(async move {
            self.register(ctx);
            Outcome::Continue
        })
    }
}
