//! OP Tracking Promise - Outcome Tracking for Sync and Async Work
//!
//! Wraps a unit of work (an immediate value, a callable, a future or any
//! [`Thenable`]) in a [`Tracker`] that can be inspected right away and awaited
//! for a [`SettlementSummary`]:
//! - Synchronous results and raised errors are recorded before `track` returns
//! - Asynchronous results are recorded exactly once, when they settle
//! - An optional deadline races the work; the first settlement wins
//! - Malformed thenables are reported as [`TrackError::InvalidThennable`]
//!
//! ```rust
//! use op_tracking_promise::{track, SettleStatus, Work};
//!
//! let tracker = track(Work::<u32, String>::call(|| Ok(7)), None).unwrap();
//! assert!(tracker.finished());
//! assert!(tracker.synchronous());
//! assert_eq!(tracker.status(), Some(SettleStatus::Fulfilled));
//! assert_eq!(tracker.value(), Some(7));
//! ```

pub mod config;
pub mod error;
pub mod metrics;
mod race;
pub mod signal;
pub mod summary;
pub mod telemetry;
pub mod thenable;
pub mod tracker;

pub use config::TrackOptions;
pub use error::{BoxError, Result, TrackError};
pub use metrics::TrackerMetrics;
pub use signal::SettlementSignal;
pub use summary::{SettleStatus, SettlementReport, SettlementSummary, Unsettled};
pub use telemetry::TrackTelemetry;
pub use thenable::{Eventual, FutureThenable, OnFulfilled, OnRejected, Thenable, Work};
pub use tracker::{track, track_with, Tracker};
