//! Bearer token extraction and signed-claims helpers.
//!
//! Tokens are HMAC-signed JWTs (`HS256`, `HS384`, `HS512`) handled by the
//! `jsonwebtoken` crate. Claims are kept as raw JSON so the auth gate can
//! hand the exact decoded claim set to handlers.
//!
//! # Extraction Rules
//!
//! [`extract_bearer_token`] accepts `Authorization: Bearer <token>` with a
//! case-insensitive scheme. Any other non-empty header value is taken as the
//! token itself, for clients that send the raw token without a scheme.

use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::pipeline::RequestContext;

const BEARER_PREFIX: &str = "bearer ";

/// Why a token could not be issued or verified.
///
/// The auth gate does not distinguish these; they exist for logs and for
/// callers using [`verify`] directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token expired")]
    Expired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("algorithm not allowed")]
    InvalidAlgorithm,

    #[error("claims rejected: {0}")]
    InvalidClaims(String),

    #[error("payload must be a JSON object to carry timestamp claims")]
    InvalidPayload,

    #[error("token error: {0}")]
    Other(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::MissingAlgorithm
            | ErrorKind::InvalidAlgorithmName => TokenError::InvalidAlgorithm,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed(err.to_string()),
            ErrorKind::ImmatureSignature
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims(err.to_string()),
            _ => TokenError::Other(err.to_string()),
        }
    }
}

/// Options for [`sign`].
#[derive(Debug, Clone)]
pub struct SignOptions {
    pub algorithm: Algorithm,
    /// Adds an `exp` claim this far in the future.
    pub expires_in: Option<Duration>,
    /// Adds an `iat` claim with the current time.
    pub issued_at: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            expires_in: None,
            issued_at: true,
        }
    }
}

/// Options for [`verify`].
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Accepted algorithms. A token signed with anything else is rejected.
    pub algorithms: Vec<Algorithm>,
    /// Clock skew tolerance for `exp` and `nbf`, in seconds.
    pub leeway_secs: u64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            algorithms: vec![Algorithm::HS256],
            leeway_secs: 0,
            issuer: None,
            audience: None,
        }
    }
}

/// Extract a token from a raw `Authorization` header value.
///
/// Returns `None` when the header is missing, blank, or carries a bare
/// `Bearer` scheme with no token.
pub fn extract_bearer_token(header: Option<&str>) -> Option<String> {
    let value = header?.trim();
    if value.is_empty() {
        return None;
    }

    let token = match value.get(..BEARER_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_PREFIX) => {
            value.get(BEARER_PREFIX.len()..).unwrap_or_default().trim()
        }
        _ if value.eq_ignore_ascii_case(BEARER_PREFIX.trim_end()) => "",
        _ => value,
    };

    (!token.is_empty()).then(|| token.to_string())
}

/// Read the first `Authorization` header of a request and extract its token.
///
/// Non-UTF-8 header values are treated as absent.
pub fn default_get_token(ctx: &RequestContext) -> Option<String> {
    let header = ctx
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    extract_bearer_token(header)
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

/// Sign `claims` with an HMAC secret.
///
/// # Errors
///
/// Returns [`TokenError::InvalidPayload`] when timestamp claims are
/// requested for a payload that is not a JSON object, and
/// [`TokenError::InvalidAlgorithm`] for non-HMAC algorithms.
pub fn sign<T: Serialize>(
    claims: &T,
    secret: &str,
    options: &SignOptions,
) -> Result<String, TokenError> {
    if !is_hmac(options.algorithm) {
        return Err(TokenError::InvalidAlgorithm);
    }

    let mut payload =
        serde_json::to_value(claims).map_err(|e| TokenError::Other(e.to_string()))?;

    if options.issued_at || options.expires_in.is_some() {
        let object = payload.as_object_mut().ok_or(TokenError::InvalidPayload)?;
        let now = Utc::now().timestamp();

        if options.issued_at {
            object.insert("iat".to_string(), Value::from(now));
        }
        if let Some(ttl) = options.expires_in {
            let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
            object.insert("exp".to_string(), Value::from(now.saturating_add(ttl)));
        }
    }

    let header = Header::new(options.algorithm);
    let key = EncodingKey::from_secret(secret.as_bytes());
    Ok(jsonwebtoken::encode(&header, &payload, &key)?)
}

/// Verify a token and return its decoded claims.
///
/// No claim is mandatory. `exp` and `nbf` are enforced when present, `iss`
/// and `aud` only when the options name an expected value.
///
/// # Errors
///
/// Any signature, expiry, algorithm or structural problem yields a
/// [`TokenError`].
pub fn verify(token: &str, secret: &str, options: &VerifyOptions) -> Result<Value, TokenError> {
    if options.algorithms.is_empty() || !options.algorithms.iter().copied().all(is_hmac) {
        return Err(TokenError::InvalidAlgorithm);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = options.algorithms.clone();
    validation.required_spec_claims.clear();
    validation.leeway = options.leeway_secs;
    validation.validate_exp = true;
    validation.validate_nbf = true;

    match &options.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
    if let Some(issuer) = &options.issuer {
        validation.set_issuer(&[issuer]);
    }

    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = jsonwebtoken::decode::<Value>(token, &key, &validation)?;
    Ok(data.claims)
}
