use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Final status, aligned with the fulfilled/rejected vocabulary of settled promises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleStatus {
    /// The work produced a value
    Fulfilled,

    /// The work raised, rejected, or missed its deadline
    Rejected,
}

impl SettleStatus {
    /// Derive the status from the failure and timeout flags
    pub fn derive(failed: Option<bool>, timedout: Option<bool>) -> Self {
        if failed == Some(true) || timedout == Some(true) {
            SettleStatus::Rejected
        } else {
            SettleStatus::Fulfilled
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettleStatus::Fulfilled => "fulfilled",
            SettleStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SettleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a tracker taken at the moment it finished
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementSummary<T, E> {
    /// Fulfilled or rejected
    pub status: SettleStatus,

    /// `None` when the deadline won before the work settled
    pub failed: Option<bool>,

    /// Whether the deadline won the race
    pub timedout: bool,

    /// Whether the work settled without an asynchronous continuation
    pub synchronous: bool,

    /// The produced value, only when `failed == Some(false)`
    pub value: Option<T>,

    /// The raised or rejected error, only when `failed == Some(true)`
    pub error: Option<E>,

    /// Tracking ID of the tracker this was taken from
    pub tracking_id: Uuid,

    /// Optional caller-supplied label
    pub label: Option<String>,

    /// Time between `track` being called and the tracker finishing
    pub duration_ms: u64,

    /// Timestamp when the tracker finished
    pub finished_at: DateTime<Utc>,
}

impl<T, E> SettlementSummary<T, E> {
    /// Same error as [`error`](Self::error), under the settled-promise name
    pub fn reason(&self) -> Option<&E> {
        self.error.as_ref()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status == SettleStatus::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.status == SettleStatus::Rejected
    }
}

impl<T: Clone, E: Clone> SettlementSummary<T, E> {
    /// Turn the summary back into a plain result
    pub fn unpack(&self) -> Result<T, Unsettled<E>> {
        match (self.timedout, &self.value, &self.error) {
            (true, _, _) => Err(Unsettled::TimedOut),
            (false, _, Some(error)) => Err(Unsettled::Failed(error.clone())),
            (false, Some(value), None) => Ok(value.clone()),
            (false, None, None) => Err(Unsettled::Empty),
        }
    }
}

impl<T, E: fmt::Display> SettlementSummary<T, E> {
    /// Serializable report for logs and dashboards
    pub fn report(&self) -> SettlementReport {
        SettlementReport {
            tracking_id: self.tracking_id.to_string(),
            label: self.label.clone(),
            status: self.status,
            failed: self.failed,
            timedout: self.timedout,
            synchronous: self.synchronous,
            error: self.error.as_ref().map(|e| e.to_string()),
            duration_ms: self.duration_ms,
            finished_at: self.finished_at,
        }
    }
}

/// Why an unpacked summary carries no value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Unsettled<E> {
    #[error("tracked work failed: {0}")]
    Failed(E),

    #[error("tracked work missed its deadline")]
    TimedOut,

    #[error("summary carries neither a value nor an error")]
    Empty,
}

impl<E> Unsettled<E> {
    /// The underlying error, unless the deadline won
    pub fn into_error(self) -> Option<E> {
        match self {
            Unsettled::Failed(e) => Some(e),
            Unsettled::TimedOut | Unsettled::Empty => None,
        }
    }
}

/// Serializable settlement record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    /// Tracking ID
    pub tracking_id: String,

    /// Caller-supplied label
    pub label: Option<String>,

    /// Final status
    pub status: SettleStatus,

    /// Whether the work failed (absent on timeout)
    pub failed: Option<bool>,

    /// Whether the deadline won
    pub timedout: bool,

    /// Whether the work settled synchronously
    pub synchronous: bool,

    /// Error message (if failed)
    pub error: Option<String>,

    /// Duration in milliseconds
    pub duration_ms: u64,

    /// Timestamp when tracking finished
    pub finished_at: DateTime<Utc>,
}
