//! Per-request state shared by pipeline stages.

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, Query, RawPathParams};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{Extensions, HeaderMap, HeaderValue, Method, Request, Uri, Version};
use axum::response::Response;
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AppError;

/// Request sections as seen by the handler after the pipeline ran.
///
/// Inserted into request extensions when the chain reaches the wrapped
/// service. Sections replaced by the validation stage carry their coerced
/// values; untouched ones carry what the client sent. `body` is `Null` when
/// no stage read the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Sections {
    pub body: Value,
    pub query: Value,
    pub params: Value,
}

/// Decoded claims of the verified token, for `Extension<Identity>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity(pub Value);

/// Correlation id of the request, for `Extension<CorrelationId>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

type Completion = Box<dyn FnOnce(&RequestContext, &mut Response) + Send>;

enum BodyState {
    /// Not buffered yet; forwarded as a stream if nobody asks for it.
    Pending(Body),
    Loaded(Bytes),
    Replaced,
}

/// The exchange being processed, owned by one request for its whole life.
///
/// Stages read and mutate it in order. `body`, `query` and `params` can each
/// be replaced wholesale; there is no partial merge.
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    /// Decoded token claims written by the auth gate.
    pub identity: Option<Value>,
    /// Correlation id written by the request id stage.
    pub correlation_id: Option<String>,
    body: Value,
    query: Value,
    params: Value,
    body_state: BodyState,
    extensions: Extensions,
    completions: Vec<Completion>,
}

impl RequestContext {
    /// Build a context directly, without a request. Mostly useful in tests.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let query = parse_query(&uri);
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers,
            identity: None,
            correlation_id: None,
            body: Value::Null,
            query,
            params: Value::Object(Map::new()),
            body_state: BodyState::Pending(Body::empty()),
            extensions: Extensions::new(),
            completions: Vec::new(),
        }
    }

    /// Take over an incoming request.
    ///
    /// Path parameters are available when the pipeline is mounted inside an
    /// axum router (`Router::layer`, `route_layer` or a per-route layer).
    /// Values left by an enclosing pipeline (sections, identity, correlation
    /// id) are picked up from the request extensions.
    pub async fn from_request(req: Request<Body>) -> Self {
        let (mut parts, body) = req.into_parts();

        let params = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(raw) => Value::Object(
                raw.iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect(),
            ),
            Err(_) => Value::Object(Map::new()),
        };

        let mut ctx = Self::new(parts.method, parts.uri, parts.headers);
        ctx.version = parts.version;
        ctx.params = params;
        ctx.body_state = BodyState::Pending(body);
        ctx.extensions = parts.extensions;

        if let Some(sections) = ctx.extensions.remove::<Sections>() {
            ctx.query = sections.query;
            ctx.params = sections.params;
        }
        if let Some(Identity(claims)) = ctx.extensions.get::<Identity>() {
            ctx.identity = Some(claims.clone());
        }
        if let Some(CorrelationId(id)) = ctx.extensions.get::<CorrelationId>() {
            ctx.correlation_id = Some(id.clone());
        }

        ctx
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.replace_body(body);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn query(&self) -> &Value {
        &self.query
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Replace the body. The handler receives it re-serialized as JSON.
    pub fn replace_body(&mut self, body: Value) {
        self.body = body;
        self.body_state = BodyState::Replaced;
    }

    pub fn replace_query(&mut self, query: Value) {
        self.query = query;
    }

    pub fn replace_params(&mut self, params: Value) {
        self.params = params;
    }

    /// Register a callback to run once the final response is known.
    ///
    /// Callbacks run exactly once, whatever produced the response (handler,
    /// a stage, or the fault renderer), last registered first. They do not
    /// run if the request future is dropped before completion.
    pub fn on_complete<F>(&mut self, callback: F)
    where
        F: FnOnce(&RequestContext, &mut Response) + Send + 'static,
    {
        self.completions.push(Box::new(callback));
    }

    /// Buffer and parse the body, at most once.
    ///
    /// Empty bodies parse to `Null`. Bodies with a non-JSON content type are
    /// kept as bytes and parse to `Null`.
    ///
    /// # Errors
    ///
    /// `413 ERR_PAYLOAD_TOO_LARGE` past `limit` bytes, `400 ERR_BAD_REQUEST`
    /// for unreadable bodies or malformed JSON.
    pub(crate) async fn load_body(&mut self, limit: usize) -> Result<(), AppError> {
        let body = match std::mem::replace(&mut self.body_state, BodyState::Replaced) {
            BodyState::Pending(body) => body,
            other => {
                self.body_state = other;
                return Ok(());
            }
        };

        let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
            let inner = e.into_inner();
            if inner.is::<LengthLimitError>() {
                AppError::payload_too_large()
            } else {
                debug!(error = %inner, "Failed to read request body");
                AppError::bad_request("Failed to read request body")
            }
        })?;

        if !bytes.is_empty() && self.is_json() {
            self.body = serde_json::from_slice(&bytes).map_err(|e| {
                debug!(error = %e, "Malformed JSON body");
                AppError::bad_request("Malformed JSON in request body")
            })?;
        }
        self.body_state = BodyState::Loaded(bytes);
        Ok(())
    }

    fn is_json(&self) -> bool {
        match self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            Some(content_type) => content_type.to_ascii_lowercase().contains("json"),
            None => true,
        }
    }

    /// Rebuild the request for the wrapped service.
    ///
    /// Extensions move to the new request; everything else is copied so
    /// completion callbacks can still read the request line and headers.
    pub(crate) fn forward_request(&mut self) -> Request<Body> {
        let mut headers = self.headers.clone();
        let body = match std::mem::replace(&mut self.body_state, BodyState::Replaced) {
            BodyState::Pending(body) => {
                self.body_state = BodyState::Pending(Body::empty());
                body
            }
            BodyState::Loaded(bytes) => {
                self.body_state = BodyState::Loaded(bytes.clone());
                Body::from(bytes)
            }
            BodyState::Replaced => {
                let bytes = serde_json::to_vec(&self.body).unwrap_or_default();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                Body::from(bytes)
            }
        };

        let mut req = Request::new(body);
        *req.method_mut() = self.method.clone();
        *req.uri_mut() = self.uri.clone();
        *req.version_mut() = self.version;
        *req.headers_mut() = headers;
        *req.extensions_mut() = std::mem::take(&mut self.extensions);

        let extensions = req.extensions_mut();
        extensions.insert(Sections {
            body: self.body.clone(),
            query: self.query.clone(),
            params: self.params.clone(),
        });
        if let Some(claims) = &self.identity {
            extensions.insert(Identity(claims.clone()));
        }
        if let Some(id) = &self.correlation_id {
            extensions.insert(CorrelationId(id.clone()));
        }

        req
    }

    /// Run completion callbacks against the final response.
    pub(crate) fn complete(&mut self, response: &mut Response) {
        let completions = std::mem::take(&mut self.completions);
        for callback in completions.into_iter().rev() {
            callback(self, response);
        }
    }
}

fn parse_query(uri: &Uri) -> Value {
    match Query::<Map<String, Value>>::try_from_uri(uri) {
        Ok(Query(map)) => Value::Object(map),
        Err(e) => {
            debug!(error = %e, "Unparseable query string, treating as empty");
            Value::Object(Map::new())
        }
    }
}
