//! Bearer token authentication stage.
//!
//! # Behavior
//!
//! ```text
//! no token ──┬─ credentials required ──→ 401 ERR_UNAUTHORIZED
//!            └─ optional ──────────────→ continue anonymously
//! token ─────┬─ verifies ──────────────→ ctx.identity = claims, continue
//!            └─ fails ─────────────────→ 401 ERR_INVALID_TOKEN
//! ```
//!
//! Verification failures are never retried within a request. The reason a
//! token was rejected is logged at debug level and kept out of the response.
//!
//! # Usage
//!
//! ```rust
//! use tollgate::middleware::{AuthConfig, AuthGate};
//! use tollgate::pipeline::Pipeline;
//!
//! let pipeline = Pipeline::new().stage(AuthGate::new(AuthConfig::new("secret")));
//! ```
//!
//! Clients then send:
//!
//! ```bash
//! curl -H "Authorization: Bearer <jwt>" http://localhost:3000/me
//! ```

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::Algorithm;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, ConfigError};
use crate::pipeline::{Outcome, RequestContext, Stage, StageFuture};
use crate::token::{VerifyOptions, default_get_token, verify};

/// Pulls the raw token out of a request.
pub type TokenGetter = Arc<dyn Fn(&RequestContext) -> Option<String> + Send + Sync>;

/// Configuration for [`AuthGate`].
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret used to verify tokens.
    pub secret: Arc<String>,
    /// Accepted signing algorithms (default: HS256).
    pub algorithms: Vec<Algorithm>,
    /// When false, requests without a token pass through anonymously.
    pub credentials_required: bool,
    /// Token source (default: `Authorization` header).
    pub get_token: TokenGetter,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            algorithms: vec![Algorithm::HS256],
            credentials_required: true,
            get_token: Arc::new(default_get_token),
        }
    }

    pub fn algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn credentials_required(mut self, required: bool) -> Self {
        self.credentials_required = required;
        self
    }

    pub fn get_token<F>(mut self, getter: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.get_token = Arc::new(getter);
        self
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"[redacted]")
            .field("algorithms", &self.algorithms)
            .field("credentials_required", &self.credentials_required)
            .finish_non_exhaustive()
    }
}

/// Stage that verifies bearer tokens and records the decoded claims.
#[derive(Clone, Debug)]
pub struct AuthGate {
    config: AuthConfig,
    verify_options: VerifyOptions,
}

impl AuthGate {
    pub fn new(config: AuthConfig) -> Self {
        let verify_options = VerifyOptions {
            algorithms: config.algorithms.clone(),
            ..VerifyOptions::default()
        };
        Self {
            config,
            verify_options,
        }
    }

    /// Build from application config.
    ///
    /// Returns `Ok(None)` when no `JWT_SECRET` is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptySecret`] for a blank secret.
    pub fn from_config(config: &Config) -> Result<Option<Self>, ConfigError> {
        let Some(secret) = &config.jwt_secret else {
            return Ok(None);
        };
        if secret.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        let auth = AuthConfig::new(secret.clone())
            .algorithms(config.jwt_algorithms.clone())
            .credentials_required(config.auth_credentials_required);
        Ok(Some(Self::new(auth)))
    }

    /// Same gate, but requests without a token pass through anonymously.
    pub fn optional(&self) -> Self {
        Self {
            config: self.config.clone().credentials_required(false),
            verify_options: self.verify_options.clone(),
        }
    }

    fn authenticate(&self, ctx: &mut RequestContext) -> Result<(), AppError> {
        let Some(token) = (self.config.get_token)(ctx) else {
            if self.config.credentials_required {
                warn!(path = %ctx.path(), "Missing bearer token");
                return Err(AppError::unauthorized());
            }
            debug!(path = %ctx.path(), "No token, continuing anonymously");
            return Ok(());
        };

        match verify(&token, &self.config.secret, &self.verify_options) {
            Ok(claims) => {
                debug!(path = %ctx.path(), "Token verified");
                ctx.identity = Some(claims);
                Ok(())
            }
            Err(e) => {
                debug!(path = %ctx.path(), reason = %e, "Token rejected");
                Err(AppError::invalid_token())
            }
        }
    }
}

impl Stage for AuthGate {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> StageFuture<'a> {
        Box::pin(async move { Outcome::from(self.authenticate(ctx)) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::token::{SignOptions, sign};
    use axum::http::header::AUTHORIZATION;
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
    use serde_json::json;

    const SECRET: &str = "auth-test-secret";

    fn ctx_with(auth: Option<&str>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(value) = auth {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        RequestContext::new(Method::GET, Uri::from_static("/me"), headers)
    }

    fn token(claims: serde_json::Value) -> String {
        sign(&claims, SECRET, &SignOptions::default()).unwrap()
    }

    #[test]
    fn test_missing_token_required() {
        let gate = AuthGate::new(AuthConfig::new(SECRET));
        let fault = gate.authenticate(&mut ctx_with(None)).unwrap_err();

        assert_eq!(fault.status, StatusCode::UNAUTHORIZED);
        assert_eq!(fault.code.as_deref(), Some("ERR_UNAUTHORIZED"));
    }

    #[test]
    fn test_missing_token_optional_passes() {
        let gate = AuthGate::new(AuthConfig::new(SECRET).credentials_required(false));
        let mut ctx = ctx_with(None);

        assert!(gate.authenticate(&mut ctx).is_ok());
        assert!(ctx.identity.is_none());
    }

    #[test]
    fn test_valid_token_sets_identity() {
        let gate = AuthGate::new(AuthConfig::new(SECRET));
        let jwt = token(json!({"sub": "user-1", "role": "admin"}));
        let mut ctx = ctx_with(Some(&format!("Bearer {jwt}")));

        gate.authenticate(&mut ctx).unwrap();

        let expected = verify(&jwt, SECRET, &VerifyOptions::default()).unwrap();
        assert_eq!(ctx.identity, Some(expected));
        assert_eq!(ctx.identity.as_ref().unwrap()["sub"], json!("user-1"));
    }

    #[test]
    fn test_wrong_secret_is_invalid_token() {
        let gate = AuthGate::new(AuthConfig::new("different-secret"));
        let jwt = token(json!({"sub": "user-1"}));
        let fault = gate
            .authenticate(&mut ctx_with(Some(&format!("Bearer {jwt}"))))
            .unwrap_err();

        assert_eq!(fault.code.as_deref(), Some("ERR_INVALID_TOKEN"));
        assert_eq!(fault.message, "Invalid token");
    }

    #[test]
    fn test_invalid_token_rejected_even_when_optional() {
        let gate = AuthGate::new(AuthConfig::new(SECRET)).optional();
        let fault = gate
            .authenticate(&mut ctx_with(Some("Bearer garbage")))
            .unwrap_err();

        assert_eq!(fault.code.as_deref(), Some("ERR_INVALID_TOKEN"));
    }

    #[test]
    fn test_raw_token_without_scheme_is_accepted() {
        let gate = AuthGate::new(AuthConfig::new(SECRET));
        let jwt = token(json!({"sub": "user-2"}));
        let mut ctx = ctx_with(Some(&jwt));

        gate.authenticate(&mut ctx).unwrap();
        assert_eq!(ctx.identity.as_ref().unwrap()["sub"], json!("user-2"));
    }

    #[test]
    fn test_custom_token_getter() {
        let gate = AuthGate::new(AuthConfig::new(SECRET).get_token(|ctx| {
            ctx.headers
                .get("x-token")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        }));
        let jwt = token(json!({"sub": "user-3"}));
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_str(&jwt).unwrap());
        let mut ctx = RequestContext::new(Method::GET, Uri::from_static("/"), headers);

        gate.authenticate(&mut ctx).unwrap();
        assert!(ctx.identity.is_some());
    }

    #[test]
    fn test_from_config_without_secret() {
        let config = Config::default();
        assert!(AuthGate::from_config(&config).unwrap().is_none());

        let config = Config {
            jwt_secret: Some("  ".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            AuthGate::from_config(&config),
            Err(ConfigError::EmptySecret)
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", AuthConfig::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }
}
