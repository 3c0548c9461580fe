use std::convert::Infallible;
use std::fmt;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::TrackOptions;
use crate::error::{Result, TrackError};
use crate::metrics::TrackerMetrics;
use crate::race::{Deadline, RaceArbiter, Settlement};
use crate::signal::SettlementSignal;
use crate::summary::{SettleStatus, SettlementSummary, Unsettled};
use crate::telemetry::TrackTelemetry;
use crate::thenable::{Eventual, Thenable, Work};

/// Track a unit of work, optionally racing it against a deadline
///
/// The returned tracker is already finished if the work settled
/// synchronously. Errors raised by the work are captured in the tracker;
/// only structural failures come back as `Err`.
pub fn track<T, E>(work: impl Into<Work<T, E>>, deadline: Option<Duration>) -> Result<Tracker<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    track_with(work, TrackOptions::from(deadline))
}

/// Track a unit of work with full options
#[instrument(skip_all, fields(label = ?options.label, deadline = ?options.deadline))]
pub fn track_with<T, E>(work: impl Into<Work<T, E>>, options: TrackOptions) -> Result<Tracker<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let started = Instant::now();
    let deadline = options.deadline.map(Deadline::start);

    match work.into().evaluate() {
        Err(error) => Ok(Tracker::settle_now(Settlement::Rejected(error), &options, deadline, started)),
        Ok(Eventual::Ready(value)) => {
            Ok(Tracker::settle_now(Settlement::Fulfilled(value), &options, deadline, started))
        }
        Ok(Eventual::Pending(thenable)) => Tracker::settle_later(thenable, &options, deadline, started),
    }
}

/// Mutable fields, written only by settlement
struct TrackerState<T, E> {
    finished: bool,
    failed: Option<bool>,
    timedout: Option<bool>,
    status: Option<SettleStatus>,
    value: Option<T>,
    error: Option<E>,
}

impl<T, E> TrackerState<T, E> {
    fn pending() -> Self {
        Self {
            finished: false,
            failed: None,
            timedout: None,
            status: None,
            value: None,
            error: None,
        }
    }
}

/// Whether settlements may reach the arbiter yet
///
/// Asynchronous trackers start out `Registering`: the first settlement that
/// arrives while the thenable's `then` is still running is held back, and is
/// applied only once registration succeeds.
enum Gate<T, E> {
    Registering(Option<Settlement<T, E>>),
    Open,
    Closed,
}

struct Shared<T, E> {
    id: Uuid,
    label: Option<String>,
    synchronous: bool,
    deadline: Option<Deadline>,
    started: Instant,
    state: Mutex<TrackerState<T, E>>,
    gate: Mutex<Gate<T, E>>,
    arbiter: RaceArbiter,
    signal: SettlementSignal<Arc<SettlementSummary<T, E>>>,
    timer: Mutex<Option<AbortHandle>>,
    metrics: Option<Arc<TrackerMetrics>>,
    telemetry: Option<Arc<TrackTelemetry>>,
}

fn lock<S>(mutex: &Mutex<S>) -> MutexGuard<'_, S> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, E> Shared<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn new(options: &TrackOptions, synchronous: bool, deadline: Option<Deadline>, started: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: options.label.clone(),
            synchronous,
            deadline,
            started,
            state: Mutex::new(TrackerState::pending()),
            gate: Mutex::new(if synchronous {
                Gate::Open
            } else {
                Gate::Registering(None)
            }),
            arbiter: RaceArbiter::new(),
            signal: SettlementSignal::new(),
            timer: Mutex::new(None),
            metrics: options.metrics.clone(),
            telemetry: options.telemetry.clone(),
        }
    }

    /// Settle through the gate. While registering, the first settlement is
    /// held back; once closed, everything is discarded.
    fn settle(&self, settlement: Settlement<T, E>) {
        let routed = {
            let mut gate = lock(&self.gate);
            match &mut *gate {
                Gate::Registering(held @ None) => {
                    *held = Some(settlement);
                    return;
                }
                Gate::Open => Ok(settlement),
                Gate::Registering(Some(_)) | Gate::Closed => Err(settlement),
            }
        };
        match routed {
            Ok(settlement) => self.finalize(settlement),
            Err(settlement) => self.discard(settlement),
        }
    }

    fn discard(&self, settlement: Settlement<T, E>) {
        debug!(
            tracking_id = %self.id,
            label = ?self.label,
            late = settlement.kind(),
            "Discarding settlement for finished tracker"
        );
        if let Some(metrics) = &self.metrics {
            metrics.late_settlement();
        }
    }

    /// Registration succeeded: open the gate and apply any held settlement
    fn release(&self) {
        let mut gate = lock(&self.gate);
        let previous = std::mem::replace(&mut *gate, Gate::Open);
        // Finalize under the gate lock so the held settlement beats any racer.
        if let Gate::Registering(Some(settlement)) = previous {
            self.finalize(settlement);
        }
    }

    /// Apply the first settlement and finalize. Later ones are discarded.
    fn finalize(&self, settlement: Settlement<T, E>) {
        if !self.arbiter.claim() {
            self.discard(settlement);
            return;
        }

        let timed_out = matches!(settlement, Settlement::TimedOut);
        let summary = {
            let mut state = lock(&self.state);
            match settlement {
                Settlement::Fulfilled(value) => {
                    state.failed = Some(false);
                    state.timedout = Some(false);
                    state.value = Some(value);
                }
                Settlement::Rejected(error) => {
                    state.failed = Some(true);
                    state.timedout = Some(false);
                    state.error = Some(error);
                }
                Settlement::TimedOut => {
                    state.failed = None;
                    state.timedout = Some(true);
                }
            }
            let status = SettleStatus::derive(state.failed, state.timedout);
            state.status = Some(status);
            state.finished = true;

            Arc::new(SettlementSummary {
                status,
                failed: state.failed,
                timedout: timed_out,
                synchronous: self.synchronous,
                value: state.value.clone(),
                error: state.error.clone(),
                tracking_id: self.id,
                label: self.label.clone(),
                duration_ms: self.started.elapsed().as_millis() as u64,
                finished_at: Utc::now(),
            })
        };

        // The timer is cleared here unless it is the one settling us.
        if let Some(timer) = lock(&self.timer).take() {
            if !timed_out {
                timer.abort();
            }
        }

        debug!(
            tracking_id = %self.id,
            label = ?self.label,
            status = %summary.status,
            failed = ?summary.failed,
            timedout = summary.timedout,
            synchronous = summary.synchronous,
            duration_ms = summary.duration_ms,
            "Tracker settled"
        );
        if let Some(metrics) = &self.metrics {
            metrics.tracking_settled(self.synchronous, summary.status, summary.timedout, summary.duration_ms);
        }
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_settlement(&*summary);
        }

        self.signal.resolve(Arc::clone(&summary));
    }

    /// Give up on an asynchronous tracker that was never handed out.
    /// Held and future settlements are dropped without finalizing.
    fn abandon(&self) {
        *lock(&self.gate) = Gate::Closed;
        if self.arbiter.claim() {
            if let Some(metrics) = &self.metrics {
                metrics.tracking_aborted();
            }
        }
        if let Some(timer) = lock(&self.timer).take() {
            timer.abort();
        }
    }
}

/// Observable record of a tracked unit of work
///
/// Fields can be read at any time. Awaiting the tracker (or calling
/// [`settled`](Tracker::settled)) yields the settlement summary; every await
/// gets the same `Arc`.
pub struct Tracker<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Tracker<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Tracker<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn settle_now(
        settlement: Settlement<T, E>,
        options: &TrackOptions,
        deadline: Option<Deadline>,
        started: Instant,
    ) -> Self {
        let shared = Arc::new(Shared::new(options, true, deadline, started));
        debug!(tracking_id = %shared.id, label = ?shared.label, "Tracking synchronous work");
        if let Some(metrics) = &shared.metrics {
            metrics.tracking_started(true);
        }
        shared.settle(settlement);
        Self { shared }
    }

    fn settle_later(
        thenable: Box<dyn Thenable<T, E>>,
        options: &TrackOptions,
        deadline: Option<Deadline>,
        started: Instant,
    ) -> Result<Self> {
        let shared = Arc::new(Shared::new(options, false, deadline, started));
        debug!(tracking_id = %shared.id, label = ?shared.label, "Tracking asynchronous work");
        if let Some(metrics) = &shared.metrics {
            metrics.tracking_started(false);
        }

        if let Some(deadline) = deadline {
            let timer_side = Arc::clone(&shared);
            match deadline.arm(move || timer_side.settle(Settlement::TimedOut)) {
                Ok(handle) => *lock(&shared.timer) = Some(handle),
                Err(e) => {
                    shared.abandon();
                    return Err(TrackError::RuntimeUnavailable(e));
                }
            }
        }

        let fulfilled_side = Arc::clone(&shared);
        let rejected_side = Arc::clone(&shared);
        let registration = thenable.then(
            Box::new(move |value| fulfilled_side.settle(Settlement::Fulfilled(value))),
            Box::new(move |error| rejected_side.settle(Settlement::Rejected(error))),
        );
        if let Err(cause) = registration {
            warn!(
                tracking_id = %shared.id,
                label = ?shared.label,
                error = %cause,
                "Thenable failed while registering continuations"
            );
            shared.abandon();
            return Err(TrackError::invalid_thennable(cause));
        }

        shared.release();
        Ok(Self { shared })
    }

    /// Unique ID of this tracker
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn label(&self) -> Option<&str> {
        self.shared.label.as_deref()
    }

    /// Configured deadline, if any
    pub fn deadline(&self) -> Option<Duration> {
        self.shared.deadline.map(|d| d.duration)
    }

    /// True once settled; never goes back
    pub fn finished(&self) -> bool {
        lock(&self.shared.state).finished
    }

    /// True if the work settled without an asynchronous continuation
    pub fn synchronous(&self) -> bool {
        self.shared.synchronous
    }

    /// `None` while pending, and after a timeout
    pub fn failed(&self) -> Option<bool> {
        lock(&self.shared.state).failed
    }

    /// `None` while pending
    pub fn timedout(&self) -> Option<bool> {
        lock(&self.shared.state).timedout
    }

    /// `None` while pending
    pub fn status(&self) -> Option<SettleStatus> {
        lock(&self.shared.state).status
    }

    pub fn value(&self) -> Option<T> {
        lock(&self.shared.state).value.clone()
    }

    pub fn error(&self) -> Option<E> {
        lock(&self.shared.state).error.clone()
    }

    /// Same as [`error`](Tracker::error)
    pub fn reason(&self) -> Option<E> {
        self.error()
    }

    /// The settlement summary, if already finished
    pub fn summary(&self) -> Option<Arc<SettlementSummary<T, E>>> {
        self.shared.signal.peek()
    }

    /// Wait for settlement. Never fails: failures are part of the summary.
    pub async fn settled(&self) -> Arc<SettlementSummary<T, E>> {
        self.shared.signal.wait().await
    }

    /// Pass-through: the tracker's own awaitable never rejects, so the
    /// handler cannot run.
    pub async fn catch<F>(&self, _on_rejected: F) -> Arc<SettlementSummary<T, E>>
    where
        F: FnOnce(Infallible),
    {
        self.settled().await
    }

    /// Run `f` after settlement, propagating its failure
    pub async fn finally<F, Er>(&self, f: F) -> std::result::Result<Arc<SettlementSummary<T, E>>, Er>
    where
        F: FnOnce() -> std::result::Result<(), Er>,
    {
        let summary = self.settled().await;
        f()?;
        Ok(summary)
    }

    /// Wait for settlement and turn it back into a plain result
    pub async fn unpack(&self) -> std::result::Result<T, Unsettled<E>> {
        self.settled().await.unpack()
    }
}

impl<'a, T, E> IntoFuture for &'a Tracker<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Output = Arc<SettlementSummary<T, E>>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.settled())
    }
}

impl<T, E> IntoFuture for Tracker<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Output = Arc<SettlementSummary<T, E>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.settled().await })
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Tracker<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("Tracker")
            .field("id", &self.shared.id)
            .field("label", &self.shared.label)
            .field("finished", &state.finished)
            .field("synchronous", &self.shared.synchronous)
            .field("failed", &state.failed)
            .field("timedout", &state.timedout)
            .field("status", &state.status)
            .field("value", &state.value)
            .field("error", &state.error)
            .finish()
    }
}
