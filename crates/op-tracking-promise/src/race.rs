//! Deadline race between the tracked operation and a timer
//!
//! Both sides report into the same [`RaceArbiter`]. Only the first claim
//! wins; everything after it is dropped on the floor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// How the race was decided
///
/// `TimedOut` is the timer's sentinel. It never leaves this crate.
#[derive(Debug)]
pub(crate) enum Settlement<T, E> {
    Fulfilled(T),
    Rejected(E),
    TimedOut,
}

impl<T, E> Settlement<T, E> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Settlement::Fulfilled(_) => "fulfilled",
            Settlement::Rejected(_) => "rejected",
            Settlement::TimedOut => "timedout",
        }
    }
}

/// Guarded-once claim shared by every settlement source
#[derive(Debug, Default)]
pub(crate) struct RaceArbiter {
    settled: AtomicBool,
}

impl RaceArbiter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim the race. True for the first caller only.
    pub(crate) fn claim(&self) -> bool {
        self.settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Deadline fixed before the unit of work is evaluated
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    pub(crate) duration: Duration,
    pub(crate) at: Instant,
}

impl Deadline {
    pub(crate) fn start(duration: Duration) -> Self {
        Self {
            duration,
            at: Instant::now() + duration,
        }
    }

    /// Spawn the timer task. `on_elapsed` runs once the deadline passes,
    /// unless the returned handle is aborted first.
    pub(crate) fn arm<F>(&self, on_elapsed: F) -> Result<AbortHandle, tokio::runtime::TryCurrentError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = Handle::try_current()?;
        let at = self.at;
        let task = handle.spawn(async move {
            tokio::time::sleep_until(at).await;
            on_elapsed();
        });
        Ok(task.abort_handle())
    }
}
