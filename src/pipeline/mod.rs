//! Ordered interceptor chain with a single fault sink.
//!
//! # Model
//!
//! A [`Pipeline`] holds an ordered list of [`Stage`]s. For each request the
//! driver builds one [`RequestContext`] and asks every stage in turn what to
//! do with it:
//!
//! ```text
//! Request → Stage 1 → Stage 2 → ... → wrapped service → Response
//!             │          │
//!             │          └─ Outcome::Fail(fault) ──→ render_fault ──┐
//!             └─ Outcome::Respond(response) ───────────────────────┤
//!                                                                  ▼
//!                                           completion callbacks (once)
//! ```
//!
//! The first non-[`Outcome::Continue`] result ends the chain. Faults always
//! go to [`render_fault`](crate::terminal::render_fault), so every failure
//! reaches the client in the same envelope. Errors returned by the wrapped
//! service take the same route through
//! [`to_http_fault`](crate::error::to_http_fault).
//!
//! # Request Body
//!
//! The body is buffered only when a stage asks for it
//! ([`Stage::reads_body`]). Requests nobody inspects stream straight through.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use tollgate::middleware::{AccessLog, RequestId};
//! use tollgate::pipeline::Pipeline;
//!
//! let pipeline = Pipeline::new()
//!     .stage(AccessLog::default())
//!     .stage(RequestId::default());
//!
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "hi" }))
//!     .layer(pipeline);
//! ```

mod context;

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tower::{BoxError, Layer, Service, ServiceExt};
use tracing::debug;

pub use context::{CorrelationId, Identity, RequestContext, Sections};

use crate::error::{AppError, to_http_fault};
use crate::terminal::render_fault;

/// Default cap on buffered request bodies (10MB).
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// What a stage decided for the current request.
pub enum Outcome {
    /// Hand the context to the next stage.
    Continue,
    /// Stop and send this response.
    Respond(Response),
    /// Stop and render this fault.
    Fail(AppError),
}

impl From<Result<(), AppError>> for Outcome {
    fn from(result: Result<(), AppError>) -> Self {
        match result {
            Ok(()) => Outcome::Continue,
            Err(fault) => Outcome::Fail(fault),
        }
    }
}

/// Boxed future returned by [`Stage::handle`].
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Outcome> + Send + 'a>>;

/// One interceptor in a [`Pipeline`].
///
/// Stages close over their own configuration only. Anything per-request
/// lives in the [`RequestContext`].
pub trait Stage: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the body must be buffered and parsed before this stage runs.
    fn reads_body(&self) -> bool {
        false
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> StageFuture<'a>;
}

/// Tower layer running an ordered list of stages in front of a service.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<Vec<Arc<dyn Stage>>>,
    body_limit: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages: Arc::new(Vec::new()),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Append a stage. Stages run in the order they are added.
    pub fn stage<T: Stage>(mut self, stage: T) -> Self {
        Arc::make_mut(&mut self.stages).push(Arc::new(stage));
        self
    }

    /// Cap on buffered request bodies, in bytes.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Names of the configured stages, in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl<S> Layer<S> for Pipeline {
    type Service = PipelineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PipelineService {
            inner,
            stages: self.stages.clone(),
            body_limit: self.body_limit,
        }
    }
}

/// Service produced by [`Pipeline`].
#[derive(Clone)]
pub struct PipelineService<S> {
    inner: S,
    stages: Arc<Vec<Arc<dyn Stage>>>,
    body_limit: usize,
}

impl<S> Service<Request<Body>> for PipelineService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness of the inner service is awaited per call via `oneshot`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let stages = self.stages.clone();
        let body_limit = self.body_limit;
        let inner = self.inner.clone();

        Box::pin(async move { Ok(drive(&stages, body_limit, inner, req).await) })
    }
}

async fn drive<S>(
    stages: &[Arc<dyn Stage>],
    body_limit: usize,
    inner: S,
    req: Request<Body>,
) -> Response
where
    S: Service<Request<Body>, Response = Response> + Send,
    S::Future: Send,
    S::Error: Into<BoxError>,
{
    let mut ctx = RequestContext::from_request(req).await;
    let mut answered = None;

    for stage in stages {
        if stage.reads_body()
            && let Err(fault) = ctx.load_body(body_limit).await
        {
            answered = Some(render_fault(fault));
            break;
        }

        match stage.handle(&mut ctx).await {
            Outcome::Continue => {}
            Outcome::Respond(response) => {
                debug!(stage = stage.name(), "Stage answered the request");
                answered = Some(response);
                break;
            }
            Outcome::Fail(fault) => {
                debug!(
                    stage = stage.name(),
                    status = fault.status.as_u16(),
                    code = fault.code.as_deref().unwrap_or(""),
                    "Stage failed the request"
                );
                answered = Some(render_fault(fault));
                break;
            }
        }
    }

    let mut response = match answered {
        Some(response) => response,
        None => match inner.oneshot(ctx.forward_request()).await {
            Ok(response) => response,
            Err(err) => render_fault(to_http_fault(err.into())),
        },
    };

    ctx.complete(&mut response);
    response
}
