//! Shared application state for the demo handlers.
//!
//! Cloned into every handler; everything inside is behind `Arc` or `Copy`.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Shared application state for Axum handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Runtime configuration
    pub config: Arc<Config>,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Get application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
