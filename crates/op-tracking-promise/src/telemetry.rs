use tracing::{debug, info, instrument};

use crate::summary::SettlementSummary;

/// Settlement telemetry for distributed tracing
/// Uses tracing spans rather than an OpenTelemetry exporter
#[derive(Debug, Clone)]
pub struct TrackTelemetry {
    /// Service name for tracing
    service_name: String,
}

impl TrackTelemetry {
    /// Create new telemetry service
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Record a finished tracker
    #[instrument(skip(self, summary), fields(
        tracking_id = %summary.tracking_id,
        label = ?summary.label,
        status = %summary.status,
        synchronous = summary.synchronous,
        duration_ms = summary.duration_ms,
        service = %self.service_name
    ))]
    pub fn record_settlement<T, E>(&self, summary: &SettlementSummary<T, E>) {
        if summary.timedout {
            info!("Tracked work missed its deadline");
        } else if summary.is_rejected() {
            info!(failed = ?summary.failed, "Tracked work failed");
        } else {
            debug!("Tracked work fulfilled");
        }
    }
}
