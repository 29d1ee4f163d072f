//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Security Configuration
//!
//! - `JWT_SECRET`: When set, installs the bearer token gate on protected routes
//! - `JWT_ALGORITHMS`: Comma-separated HMAC algorithms accepted (default: `HS256`)
//! - `AUTH_CREDENTIALS_REQUIRED`: Reject requests without a token (default: `true`)
//! - `TRUST_REQUEST_ID`: Reuse client-supplied request ids (default: `true`)
//! - `CORS_ALLOWED_ORIGINS`: Comma-separated list of allowed origins (default: `*` for dev)
//!
//! # Observability
//!
//! - `RUST_LOG`: Log filter directives (default: `info`)
//! - `LOG_FORMAT`: `text` or `json` (default: `text`)
//! - `METRICS_PORT`: Prometheus listener port (default: 0 = disabled)

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderName;
use jsonwebtoken::Algorithm;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;
use crate::pipeline::DEFAULT_BODY_LIMIT;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Maximum buffered request body size in bytes (default: 10MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// HMAC secret for bearer tokens. Unset disables the auth gate.
    pub jwt_secret: Option<String>,

    /// Accepted signing algorithms (default: HS256)
    pub jwt_algorithms: Vec<Algorithm>,

    /// Reject protected requests that carry no token (default: true)
    pub auth_credentials_required: bool,

    /// Correlation header name (default: "x-request-id")
    pub request_id_header: String,

    /// Reuse an incoming correlation header instead of generating one
    pub trust_request_id: bool,

    /// Comma-separated list of allowed CORS origins
    /// Use "*" to allow all origins (not recommended for production)
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any value fails to parse or validate
    /// (e.g., non-numeric PORT value, unknown algorithm).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", DEFAULT_BODY_LIMIT)?,

            // Security
            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            jwt_algorithms: Self::parse_algorithms(
                &env::var("JWT_ALGORITHMS").unwrap_or_else(|_| "HS256".to_string()),
            )?,
            auth_credentials_required: Self::parse_env("AUTH_CREDENTIALS_REQUIRED", true)?,
            request_id_header: env::var("REQUEST_ID_HEADER")
                .unwrap_or_else(|_| "x-request-id".to_string()),
            trust_request_id: Self::parse_env("TRUST_REQUEST_ID", true)?,
            cors_allowed_origins: Self::parse_list(
                &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            ),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::Text)?,
            metrics_port: Self::parse_env("METRICS_PORT", 0)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_request_body_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_REQUEST_BODY_SIZE".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if HeaderName::from_str(&self.request_id_header).is_err() {
            return Err(ConfigError::InvalidHeaderName(
                self.request_id_header.clone(),
            ));
        }

        if self.jwt_algorithms.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "JWT_ALGORITHMS".to_string(),
                reason: "at least one algorithm is required".to_string(),
            });
        }
        if let Some(algorithm) = self
            .jwt_algorithms
            .iter()
            .find(|a| !matches!(a, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
        {
            return Err(ConfigError::UnsupportedAlgorithm(format!("{algorithm:?}")));
        }

        if let Some(secret) = &self.jwt_secret
            && secret.trim().is_empty()
        {
            return Err(ConfigError::EmptySecret);
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if the bearer token gate is installed.
    pub fn auth_enabled(&self) -> bool {
        self.jwt_secret.is_some()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        if self.metrics_enabled() {
            Some(SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
        } else {
            None
        }
    }

    /// Build the log filter from `log_level`.
    ///
    /// Unparseable directives fall back to `info` so a typo in `RUST_LOG`
    /// never silences startup errors.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                name: name.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Ok(default),
        }
    }

    fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Parse a comma-separated algorithm list such as `HS256,HS512`.
    fn parse_algorithms(raw: &str) -> Result<Vec<Algorithm>, ConfigError> {
        Self::parse_list(raw)
            .into_iter()
            .map(|name| {
                Algorithm::from_str(&name.to_ascii_uppercase())
                    .map_err(|_| ConfigError::UnsupportedAlgorithm(name))
            })
            .collect()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_request_body_size", &self.max_request_body_size)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[redacted]"))
            .field("jwt_algorithms", &self.jwt_algorithms)
            .field("auth_credentials_required", &self.auth_credentials_required)
            .field("request_id_header", &self.request_id_header)
            .field("trust_request_id", &self.trust_request_id)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_request_body_size: DEFAULT_BODY_LIMIT,
            // Security
            jwt_secret: None,
            jwt_algorithms: vec![Algorithm::HS256],
            auth_credentials_required: true,
            request_id_header: "x-request-id".to_string(),
            trust_request_id: true,
            cors_allowed_origins: vec!["*".to_string()],
            // Observability
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_port: 0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_request_body_size, 10 * 1024 * 1024);
        assert_eq!(config.jwt_algorithms, vec![Algorithm::HS256]);
        assert!(config.jwt_secret.is_none());
        assert!(config.auth_credentials_required);
        assert!(!config.metrics_enabled());
        assert!(config.metrics_addr().is_none());
    }

    #[test]
    fn test_log_filter_uses_log_level() {
        let config = Config {
            log_level: "tollgate=debug".to_string(),
            ..Config::default()
        };
        assert_eq!(config.log_filter().to_string(), "tollgate=debug");
    }

    #[test]
    fn test_log_filter_falls_back_on_bad_directive() {
        let config = Config {
            log_level: "tollgate=loud".to_string(),
            ..Config::default()
        };
        assert_eq!(config.log_filter().to_string(), "info");
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "192.168.1.1".to_string(),
            port: 8080,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "192.168.1.1:8080");
    }

    #[test]
    fn test_auth_enabled() {
        let config = Config::default();
        assert!(!config.auth_enabled());

        let config = Config {
            jwt_secret: Some("secret-key".to_string()),
            ..Config::default()
        };
        assert!(config.auth_enabled());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_body_size_zero() {
        let config = Config {
            max_request_body_size: 0,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("MAX_REQUEST_BODY_SIZE"));
    }

    #[test]
    fn test_validate_header_name() {
        let config = Config {
            request_id_header: "not a header".to_string(),
            ..Config::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHeaderName(_))
        ));
    }

    #[test]
    fn test_validate_rejects_asymmetric_algorithm() {
        let config = Config {
            jwt_algorithms: vec![Algorithm::RS256],
            ..Config::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_parse_algorithms() {
        let parsed = Config::parse_algorithms("hs256, HS512").unwrap();
        assert_eq!(parsed, vec![Algorithm::HS256, Algorithm::HS512]);

        assert!(matches!(
            Config::parse_algorithms("HS999"),
            Err(ConfigError::UnsupportedAlgorithm(name)) if name == "HS999"
        ));
    }

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        let origins = Config::parse_list(" https://a.example , ,https://b.example");
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config {
            jwt_secret: Some("hunter2".to_string()),
            ..Config::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_metrics_addr() {
        let config = Config {
            metrics_port: 9090,
            ..Config::default()
        };
        assert_eq!(config.metrics_addr().unwrap().port(), 9090);
    }
}
