//! Schema validation stage for body, query and path parameters.
//!
//! Each configured section is parsed with its schema, in the fixed order
//! body, query, params. Successful sections are replaced by the coerced
//! value. Failures do not short-circuit: every section is attempted and all
//! issues are reported together as
//!
//! ```json
//! {"body": [{"path": ["message"], "message": "..."}], "params": [...]}
//! ```
//!
//! under a `400 ERR_VALIDATION` fault. A schema that panics is treated as a
//! validation failure without details.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::AppError;
use crate::pipeline::{Outcome, RequestContext, Stage, StageFuture};
use crate::schema::Schema;

/// Which part of the request a schema applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Body,
    Query,
    Params,
}

impl Section {
    pub const fn as_str(self) -> &'static str {
        match self {
            Section::Body => "body",
            Section::Query => "query",
            Section::Params => "params",
        }
    }

    fn current(self, ctx: &RequestContext) -> &Value {
        match self {
            Section::Body => ctx.body(),
            Section::Query => ctx.query(),
            Section::Params => ctx.params(),
        }
    }

    fn replace(self, ctx: &mut RequestContext, value: Value) {
        match self {
            Section::Body => ctx.replace_body(value),
            Section::Query => ctx.replace_query(value),
            Section::Params => ctx.replace_params(value),
        }
    }
}

/// Schemas per section. Omitted sections are left untouched.
#[derive(Clone, Default)]
pub struct ValidationConfig {
    pub body: Option<Arc<dyn Schema>>,
    pub query: Option<Arc<dyn Schema>>,
    pub params: Option<Arc<dyn Schema>>,
}

impl ValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, schema: impl Schema + 'static) -> Self {
        self.body = Some(Arc::new(schema));
        self
    }

    pub fn query(mut self, schema: impl Schema + 'static) -> Self {
        self.query = Some(Arc::new(schema));
        self
    }

    pub fn params(mut self, schema: impl Schema + 'static) -> Self {
        self.params = Some(Arc::new(schema));
        self
    }

    fn sections(&self) -> [(Section, Option<&Arc<dyn Schema>>); 3] {
        [
            (Section::Body, self.body.as_ref()),
            (Section::Query, self.query.as_ref()),
            (Section::Params, self.params.as_ref()),
        ]
    }
}

/// Stage applying a [`ValidationConfig`].
#[derive(Clone, Default)]
pub struct Validate {
    config: ValidationConfig,
}

impl Validate {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    fn validate(&self, ctx: &mut RequestContext) -> Result<(), AppError> {
        let mut details = Map::new();

        for (section, schema) in self.config.sections() {
            let Some(schema) = schema else { continue };

            let parsed = catch_unwind(AssertUnwindSafe(|| {
                schema.safe_parse(section.current(ctx))
            }))
            .map_err(|payload| {
                let fault = AppError::from_panic(payload);
                error!(
                    section = section.as_str(),
                    cause = fault.cause.as_deref().unwrap_or(""),
                    "Schema panicked during validation"
                );
                AppError::validation(None)
            })?;

            match parsed {
                Ok(value) => section.replace(ctx, value),
                Err(issues) => {
                    debug!(
                        section = section.as_str(),
                        issues = issues.len(),
                        "Validation failed"
                    );
                    let issues = serde_json::to_value(issues).unwrap_or(Value::Null);
                    details.insert(section.as_str().to_string(), issues);
                }
            }
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(Some(Value::Object(details))))
        }
    }
}

impl Stage for Validate {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn reads_body(&self) -> bool {
        self.config.body.is_some()
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> StageFuture<'a> {
        Box::pin(async move { Outcome::from(self.validate(ctx)) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::{FieldRule, Issue, ObjectSchema};
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use serde_json::json;

    fn ctx(uri: &'static str, body: Value, params: Value) -> RequestContext {
        RequestContext::new(Method::POST, Uri::from_static(uri), HeaderMap::new())
            .with_body(body)
            .with_params(params)
    }

    fn message_body() -> ObjectSchema {
        ObjectSchema::new().field("message", FieldRule::string().min_len(3))
    }

    #[test]
    fn test_body_too_short_reports_length() {
        let stage = Validate::new(ValidationConfig::new().body(message_body()));
        let mut ctx = ctx("/", json!({"message": "x"}), json!({}));

        let fault = stage.validate(&mut ctx).unwrap_err();
        assert_eq!(fault.status, StatusCode::BAD_REQUEST);
        assert_eq!(fault.code.as_deref(), Some("ERR_VALIDATION"));

        let details = fault.details.unwrap();
        let message = details["body"][0]["message"].as_str().unwrap();
        assert!(message.contains("at least 3"));
        assert_eq!(details["body"][0]["path"], json!(["message"]));
    }

    #[test]
    fn test_all_sections_coerced() {
        let stage = Validate::new(
            ValidationConfig::new()
                .body(message_body())
                .query(ObjectSchema::new().field("flag", FieldRule::string().default(json!("yes"))))
                .params(ObjectSchema::new().field("id", FieldRule::integer())),
        );
        let mut ctx = ctx("/items/42", json!({"message": "hello"}), json!({"id": "42"}));

        stage.validate(&mut ctx).unwrap();

        assert_eq!(ctx.body(), &json!({"message": "hello"}));
        assert_eq!(ctx.query(), &json!({"flag": "yes"}));
        assert_eq!(ctx.params()["id"], json!(42));
        assert!(ctx.params()["id"].is_number());
    }

    #[test]
    fn test_failures_accumulate_across_sections() {
        let stage = Validate::new(
            ValidationConfig::new()
                .body(message_body())
                .query(ObjectSchema::new().field("page", FieldRule::integer()))
                .params(ObjectSchema::new().field("id", FieldRule::integer())),
        );
        let mut ctx = ctx("/?page=two", json!({"message": "x"}), json!({"id": "abc"}));

        let details = stage.validate(&mut ctx).unwrap_err().details.unwrap();
        let keys: Vec<_> = details.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        assert!(details.get("body").is_some());
        assert!(details.get("query").is_some());
        assert!(details.get("params").is_some());
    }

    #[test]
    fn test_failed_section_keeps_original_value() {
        let stage = Validate::new(
            ValidationConfig::new()
                .query(ObjectSchema::new().field("flag", FieldRule::string().default(json!("yes"))))
                .params(ObjectSchema::new().field("id", FieldRule::integer())),
        );
        let mut ctx = ctx("/", Value::Null, json!({"id": "abc"}));

        assert!(stage.validate(&mut ctx).is_err());
        assert_eq!(ctx.query(), &json!({"flag": "yes"}));
        assert_eq!(ctx.params(), &json!({"id": "abc"}));
    }

    #[test]
    fn test_omitted_sections_untouched() {
        let stage = Validate::new(ValidationConfig::new());
        let mut ctx = ctx("/?a=1", json!({"raw": true}), json!({"id": "7"}));

        stage.validate(&mut ctx).unwrap();
        assert_eq!(ctx.query(), &json!({"a": "1"}));
        assert_eq!(ctx.params(), &json!({"id": "7"}));
        assert!(!stage.reads_body());
    }

    #[test]
    fn test_panicking_schema_is_validation_fault() {
        let exploding = |_: &Value| -> Result<Value, Vec<Issue>> { panic!("schema bug") };
        let stage = Validate::new(ValidationConfig::new().query(exploding));
        let mut ctx = ctx("/", Value::Null, json!({}));

        let fault = stage.validate(&mut ctx).unwrap_err();
        assert_eq!(fault.code.as_deref(), Some("ERR_VALIDATION"));
        assert!(fault.details.is_none());
    }
}
