//! Status poller — fetches the status resource on a fixed interval.
//!
//! Every tick dispatches one request as its own task and the next tick is
//! armed right away, so the cadence is measured from the scheduling point,
//! never from request completion. Slow answers can overlap. Failures of any
//! kind are counted and absorbed; they never stop the loop. Only
//! `PollerHandle::stop` (or dropping the handle) does.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{error, info, trace};

use crate::error::PollError;
use crate::reporter::Reporter;
use crate::source::StatusSource;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// Tokio intervals reject a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

// ── Stats ───────────────────────────────────────────────────────────

/// Live counters shared between the loop, its request tasks and the handle.
#[derive(Debug, Default)]
pub struct PollStats {
    cycles: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of `PollStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests scheduled so far.
    pub cycles: u64,
    pub successes: u64,
    /// All failed cycles, timeouts included.
    pub failures: u64,
    pub timeouts: u64,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl PollStats {
    /// Returns the 1-based number of the cycle just scheduled.
    fn record_scheduled(&self) -> u64 {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_success_at.lock() {
            *last = Some(Utc::now());
        }
    }

    fn record_failure(&self, err: &PollError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if err.is_timeout() {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            last_success_at: self.last_success_at.lock().ok().and_then(|g| *g),
        }
    }
}

// ── Poller ──────────────────────────────────────────────────────────

/// The poll loop's configuration and collaborators.
///
/// Built once at startup; `spawn` moves it onto the runtime.
#[derive(Clone)]
pub struct Poller {
    source: Arc<dyn StatusSource>,
    reporter: Arc<dyn Reporter>,
    interval: Duration,
    timeout: Duration,
    stats: Arc<PollStats>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        reporter: Arc<dyn Reporter>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            reporter,
            interval: interval.max(MIN_INTERVAL),
            timeout,
            stats: Arc::new(PollStats::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One request: fetch, bound by the timeout, then report or absorb.
    pub async fn poll_once(&self) {
        let outcome = match time::timeout(self.timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(PollError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(payload) => {
                self.stats.record_success();
                self.reporter.report(&payload);
            }
            Err(err) => {
                self.stats.record_failure(&err);
                self.reporter.absorb(&err);
            }
        }
    }

    /// Start polling in the background. The first request goes out on the
    /// first tick, i.e. immediately.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::clone(&self.stats);
        let task = tokio::spawn(self.run(shutdown_rx));

        PollerHandle {
            shutdown: shutdown_tx,
            task,
            stats,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            target_url = %self.source.describe(),
            interval_ms = self.interval.as_millis() as u64,
            timeout_ms = self.timeout.as_millis() as u64,
            "🚦 Poller starting"
        );

        let mut ticker = time::interval(self.interval);
        // A late tick must not trigger a catch-up burst.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                // Fires on `stop` and when the handle is dropped.
                _ = shutdown.changed() => break,

                _ = ticker.tick() => {
                    let cycle = self.stats.record_scheduled();
                    trace!(cycle, in_flight = in_flight.len(), "Dispatching poll");
                    let this = self.clone();
                    in_flight.spawn(async move { this.poll_once().await });
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Poll request task panicked: {}", e);
                        }
                    }
                }
            }
        }

        in_flight.shutdown().await;

        let stats = self.stats.snapshot();
        info!(
            cycles = stats.cycles,
            successes = stats.successes,
            failures = stats.failures,
            timeouts = stats.timeouts,
            "🚦 Poller stopped"
        );
    }
}

// ── Handle ──────────────────────────────────────────────────────────

/// Owner-side control of a running poller.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    stats: Arc<PollStats>,
}

impl PollerHandle {
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop scheduling, abort requests still in flight and wait for the
    /// loop to exit. Returns the final counters.
    pub async fn stop(self) -> StatsSnapshot {
        // Err only means the loop is already gone.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            if e.is_panic() {
                error!("Poller task panicked: {}", e);
            }
        }
        self.stats.snapshot()
    }
}
