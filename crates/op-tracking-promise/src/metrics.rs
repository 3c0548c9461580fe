use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

use crate::summary::SettleStatus;

/// Tracker metrics collector
#[derive(Clone)]
pub struct TrackerMetrics {
    /// Total trackers created
    tracked: IntCounter,

    /// Trackers that settled before `track` returned
    synchronous: IntCounter,

    /// Trackers still waiting on asynchronous work
    in_flight: IntGauge,

    /// Trackers settled as fulfilled
    fulfilled: IntCounter,

    /// Trackers settled as rejected because the work failed
    rejected: IntCounter,

    /// Trackers settled because the deadline won
    timed_out: IntCounter,

    /// Settlements discarded because the race was already decided
    late_settlements: IntCounter,

    /// Time from `track` to settlement
    settle_duration: Histogram,

    registry: Registry,
}

impl TrackerMetrics {
    /// Create new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let tracked = IntCounter::new(
            "tracking_promise_tracked_total",
            "Total number of trackers created",
        )?;
        registry.register(Box::new(tracked.clone()))?;

        let synchronous = IntCounter::new(
            "tracking_promise_synchronous_total",
            "Total number of trackers settled synchronously",
        )?;
        registry.register(Box::new(synchronous.clone()))?;

        let in_flight = IntGauge::new(
            "tracking_promise_in_flight",
            "Number of trackers waiting on asynchronous work",
        )?;
        registry.register(Box::new(in_flight.clone()))?;

        let fulfilled = IntCounter::new(
            "tracking_promise_fulfilled_total",
            "Total number of trackers settled as fulfilled",
        )?;
        registry.register(Box::new(fulfilled.clone()))?;

        let rejected = IntCounter::new(
            "tracking_promise_rejected_total",
            "Total number of trackers whose work failed",
        )?;
        registry.register(Box::new(rejected.clone()))?;

        let timed_out = IntCounter::new(
            "tracking_promise_timed_out_total",
            "Total number of trackers whose deadline elapsed first",
        )?;
        registry.register(Box::new(timed_out.clone()))?;

        let late_settlements = IntCounter::new(
            "tracking_promise_late_settlements_total",
            "Total number of settlements discarded after the race was decided",
        )?;
        registry.register(Box::new(late_settlements.clone()))?;

        let settle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "tracking_promise_settle_duration_seconds",
                "Time from tracking start to settlement in seconds",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(settle_duration.clone()))?;

        Ok(Self {
            tracked,
            synchronous,
            in_flight,
            fulfilled,
            rejected,
            timed_out,
            late_settlements,
            settle_duration,
            registry,
        })
    }

    pub fn tracking_started(&self, synchronous: bool) {
        self.tracked.inc();
        if synchronous {
            self.synchronous.inc();
        } else {
            self.in_flight.inc();
        }
    }

    pub fn tracking_settled(&self, synchronous: bool, status: SettleStatus, timedout: bool, duration_ms: u64) {
        match (status, timedout) {
            (_, true) => self.timed_out.inc(),
            (SettleStatus::Rejected, false) => self.rejected.inc(),
            (SettleStatus::Fulfilled, false) => self.fulfilled.inc(),
        }
        self.settle_duration.observe(duration_ms as f64 / 1000.0);
        if !synchronous {
            self.in_flight.dec();
        }
    }

    /// Registration failed before the tracker was ever handed out
    pub fn tracking_aborted(&self) {
        self.in_flight.dec();
    }

    pub fn late_settlement(&self) {
        self.late_settlements.inc();
    }

    /// Get metrics registry for scraping
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get metrics as JSON (simplified version)
    pub fn gather_json(&self) -> serde_json::Value {
        let metrics: Vec<_> = self
            .registry
            .gather()
            .into_iter()
            .map(|family| {
                let value = family
                    .get_metric()
                    .first()
                    .map(|m| {
                        if m.has_counter() {
                            m.get_counter().get_value()
                        } else if m.has_gauge() {
                            m.get_gauge().get_value()
                        } else {
                            m.get_histogram().get_sample_count() as f64
                        }
                    })
                    .unwrap_or_default();
                serde_json::json!({
                    "name": family.get_name(),
                    "help": family.get_help(),
                    "value": value,
                })
            })
            .collect();

        serde_json::json!({
            "metrics": metrics
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(metrics: &TrackerMetrics, name: &str) -> f64 {
        let json = metrics.gather_json();
        json["metrics"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["name"] == name)
            .and_then(|m| m["value"].as_f64())
            .unwrap()
    }

    #[test]
    fn test_counters_follow_lifecycle() {
        let metrics = TrackerMetrics::new().unwrap();
        metrics.tracking_started(false);
        assert_eq!(value_of(&metrics, "tracking_promise_in_flight"), 1.0);

        metrics.tracking_settled(false, SettleStatus::Rejected, true, 5);
        assert_eq!(value_of(&metrics, "tracking_promise_in_flight"), 0.0);
        assert_eq!(value_of(&metrics, "tracking_promise_timed_out_total"), 1.0);
        assert_eq!(value_of(&metrics, "tracking_promise_rejected_total"), 0.0);

        metrics.tracking_started(true);
        metrics.tracking_settled(true, SettleStatus::Fulfilled, false, 0);
        assert_eq!(value_of(&metrics, "tracking_promise_synchronous_total"), 1.0);
        assert_eq!(value_of(&metrics, "tracking_promise_fulfilled_total"), 1.0);
        assert_eq!(value_of(&metrics, "tracking_promise_settle_duration_seconds"), 2.0);
    }

    #[test]
    fn test_two_collectors_do_not_collide() {
        let a = TrackerMetrics::new().unwrap();
        let b = TrackerMetrics::new().unwrap();
        a.late_settlement();
        assert_eq!(value_of(&a, "tracking_promise_late_settlements_total"), 1.0);
        assert_eq!(value_of(&b, "tracking_promise_late_settlements_total"), 0.0);
    }
}
