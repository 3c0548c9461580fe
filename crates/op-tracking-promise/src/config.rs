//! Tracking options and environment configuration
//!
//! Options can be built in code or read from the environment:
//!
//! - `OP_TRACK_DEADLINE_MS`: default deadline in milliseconds (unset or empty disables it)
//! - `OP_TRACK_LABEL`: label attached to every tracker and its log lines
//!
//! ```rust
//! use op_tracking_promise::TrackOptions;
//! use std::time::Duration;
//!
//! let options = TrackOptions::new()
//!     .with_deadline(Duration::from_millis(250))
//!     .with_label("fetch-manifest");
//! assert_eq!(options.deadline, Some(Duration::from_millis(250)));
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TrackError};
use crate::metrics::TrackerMetrics;
use crate::telemetry::TrackTelemetry;

/// Environment variable holding the default deadline
pub const DEADLINE_ENV: &str = "OP_TRACK_DEADLINE_MS";

/// Environment variable holding the default label
pub const LABEL_ENV: &str = "OP_TRACK_LABEL";

/// Options for a single `track_with` call
#[derive(Clone, Default)]
pub struct TrackOptions {
    /// Race the work against this deadline
    pub deadline: Option<Duration>,

    /// Label used in logs, telemetry and reports
    pub label: Option<String>,

    /// Metrics collector to update
    pub metrics: Option<Arc<TrackerMetrics>>,

    /// Telemetry sink notified on settlement
    pub telemetry: Option<Arc<TrackTelemetry>>,
}

impl TrackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read deadline and label from the environment
    pub fn from_env() -> Result<Self> {
        let deadline = match get_config_opt(DEADLINE_ENV) {
            Some(raw) => Some(parse_deadline_ms(&raw)?),
            None => None,
        };
        let label = get_config_opt(LABEL_ENV);
        debug!(deadline = ?deadline, label = ?label, "Loaded tracking options from environment");
        Ok(Self {
            deadline,
            label,
            ..Self::default()
        })
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_deadline_ms(self, deadline_ms: u64) -> Self {
        self.with_deadline(Duration::from_millis(deadline_ms))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<TrackerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<TrackTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

impl std::fmt::Debug for TrackOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackOptions")
            .field("deadline", &self.deadline)
            .field("label", &self.label)
            .field("metrics", &self.metrics.is_some())
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

impl From<Option<Duration>> for TrackOptions {
    fn from(deadline: Option<Duration>) -> Self {
        Self {
            deadline,
            ..Self::default()
        }
    }
}

/// Get an optional configuration value.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a non-negative millisecond count into a deadline.
pub fn parse_deadline_ms(raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| TrackError::invalid_config(format!("{}={:?}: {}", DEADLINE_ENV, raw, e)))
}
