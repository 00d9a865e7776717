//! Run orchestration: the run state machine, worker supervision and
//! coordinated shutdown.

use crate::config::RunConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::RunError;
use crate::point::Point;
use crate::stats::{RunReport, RunStatus, SentCounters, StatsCollector, StopReason};
use crate::transport::Transport;
use crate::worker::PublishWorker;
use loadgen_payload::PayloadGenerator;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle state of the controller's current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run has been started yet.
    Idle,
    /// Waiting for the broker to acknowledge the connection.
    Connecting,
    /// Connected; workers are about to be spawned.
    Connected,
    /// Workers are publishing.
    Running,
    /// Workers have been told to stop and are being joined.
    Stopping,
    /// The run finished; a report is available.
    Stopped,
    /// The run could not connect.
    Failed,
}

impl RunState {
    /// Whether a run is in progress (a new one cannot be started).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Connecting | RunState::Connected | RunState::Running | RunState::Stopping
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Connecting => "connecting",
            RunState::Connected => "connected",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
            RunState::Stopped => "stopped",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Drives runs of the publishing engine.
///
/// One run at a time: `start_run` connects, spawns one worker per point and
/// hands the run to a supervisor task that stops it when the maximum duration
/// elapses, `stop_run` is called, or `interrupt` is called (the CLI routes
/// Ctrl-C there). Shutdown is a join barrier: every worker is joined before
/// the connection is torn down and the report is published.
#[derive(Clone)]
pub struct RunController {
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
}

struct Shared {
    state_tx: watch::Sender<RunState>,
    slot: Mutex<RunSlot>,
}

/// Everything belonging to the current (or last) run. State transitions
/// happen while this lock is held.
#[derive(Default)]
struct RunSlot {
    signals: Option<RunSignals>,
    connection: Option<Arc<ConnectionManager>>,
    stats: Option<StatsCollector>,
    report: Option<RunReport>,
}

/// External requests to end the active run.
#[derive(Clone, Default)]
struct RunSignals {
    stop: CancellationToken,
    interrupt: CancellationToken,
}

impl RunSignals {
    fn raised(&self) -> bool {
        self.stop.is_cancelled() || self.interrupt.is_cancelled()
    }
}

/// What the supervisor task needs to watch and tear down a run.
struct Supervision {
    signals: RunSignals,
    worker_stop: CancellationToken,
    deadline: Instant,
    join_timeout: Duration,
    workers: Vec<(Point, JoinHandle<u64>)>,
    connection: Arc<ConnectionManager>,
    stats: StatsCollector,
}

impl RunController {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (state_tx, _) = watch::channel(RunState::Idle);
        Self {
            transport,
            shared: Arc::new(Shared {
                state_tx,
                slot: Mutex::new(RunSlot::default()),
            }),
        }
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        *self.shared.state_tx.borrow()
    }

    /// Subscribe to run state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.shared.state_tx.subscribe()
    }

    /// Start a run.
    ///
    /// Returns once the run is `Running`, or `Stopped` if `stop_run` or
    /// `interrupt` was called while connecting. Fails with `RunError::Config`
    /// before any connection attempt if the point set or configuration is
    /// unusable, and with `RunError::Connect` (leaving the state `Failed`) if
    /// the broker cannot be reached.
    ///
    /// The connect phase runs in its own task, so dropping this future does
    /// not strand the controller: the run still ends up `Running`, `Stopped`
    /// or `Failed`, and `stop_run` works as usual.
    pub async fn start_run(&self, config: RunConfig, points: Vec<Point>) -> Result<RunState, RunError> {
        let points = prepare_points(points)?;
        config.validate()?;

        let signals = RunSignals::default();
        let connection = Arc::new(ConnectionManager::new(
            self.transport.clone(),
            config.connect_options(),
            config.reconnect_delay,
        ));

        {
            let mut slot = self.shared.slot.lock().await;
            let state = self.state();
            if state.is_active() {
                return Err(RunError::AlreadyActive(state));
            }
            *slot = RunSlot {
                signals: Some(signals.clone()),
                connection: Some(connection.clone()),
                ..RunSlot::default()
            };
            self.shared.set_state(RunState::Connecting);
        }

        let launch = tokio::spawn(launch(
            self.shared.clone(),
            config,
            points,
            signals,
            connection,
        ));

        match launch.await {
            Ok(result) => result,
            Err(e) => {
                error!("Run launch task ended abnormally: {}", e);
                let mut slot = self.shared.slot.lock().await;
                if matches!(self.state(), RunState::Connecting | RunState::Connected) {
                    slot.signals = None;
                    slot.connection = None;
                    self.shared.set_state(RunState::Failed);
                }
                Err(RunError::Launch(e.to_string()))
            }
        }
    }

    /// Stop the current run.
    ///
    /// While connecting, the run ends in `Stopped` without spawning workers.
    /// While running, returns only after every worker has exited and the
    /// connection is closed. A no-op when no run is active.
    pub async fn stop_run(&self) {
        let mut state_rx = self.shared.state_tx.subscribe();

        {
            let slot = self.shared.slot.lock().await;
            let state = self.state();
            if !state.is_active() {
                debug!("Stop requested in state {}; nothing to do", state);
                return;
            }
            if let Some(signals) = &slot.signals {
                signals.stop.cancel();
            }
        }

        info!("Stop requested; waiting for workers to finish");
        let _ = state_rx.wait_for(|state| !state.is_active()).await;
    }

    /// End the current run because the process was interrupted.
    ///
    /// Same shutdown as `stop_run`, reported as `StopReason::Interrupted`,
    /// but returns without waiting; use `wait` for the report. A no-op when
    /// no run is active.
    pub async fn interrupt(&self) {
        let slot = self.shared.slot.lock().await;
        let state = self.state();
        match &slot.signals {
            Some(signals) if state.is_active() => {
                info!("Interrupt received in state {}; stopping run", state);
                signals.interrupt.cancel();
            }
            _ => debug!("Interrupt received in state {}; nothing to do", state),
        }
    }

    /// Wait until the current run is no longer active and return its report.
    ///
    /// `None` if no run has completed (never started, or failed to connect).
    pub async fn wait(&self) -> Option<RunReport> {
        let mut state_rx = self.shared.state_tx.subscribe();
        let _ = state_rx.wait_for(|state| !state.is_active()).await;
        self.report().await
    }

    /// Report of the last completed run.
    pub async fn report(&self) -> Option<RunReport> {
        self.shared.slot.lock().await.report.clone()
    }

    /// Live status: state, elapsed time and per-point counts.
    pub async fn status(&self) -> RunStatus {
        let slot = self.shared.slot.lock().await;
        let state = self.state();
        let connection = slot
            .connection
            .as_ref()
            .map(|c| c.state())
            .unwrap_or(ConnectionState::Disconnected);

        match (&slot.stats, &slot.report) {
            (Some(stats), _) => RunStatus {
                state,
                connection,
                started_at: Some(stats.started_at()),
                elapsed: Some(stats.elapsed()),
                counts: stats.counters().snapshot(),
            },
            (None, Some(report)) => RunStatus {
                state,
                connection,
                started_at: Some(report.started_at),
                elapsed: Some(report.duration),
                counts: report.counts.clone(),
            },
            (None, None) => RunStatus {
                state,
                connection,
                started_at: None,
                elapsed: None,
                counts: Vec::new(),
            },
        }
    }
}

impl Shared {
    fn set_state(&self, state: RunState) {
        let previous = self.state_tx.send_replace(state);
        debug!("Run state: {} -> {}", previous, state);
    }
}

/// Reject empty point sets and identifiers; drop duplicates keeping the
/// first occurrence.
fn prepare_points(points: Vec<Point>) -> Result<Vec<Point>, RunError> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(points.len());

    for point in points {
        if point.as_str().trim().is_empty() {
            return Err(RunError::Config("empty point identifier".to_string()));
        }
        if seen.insert(point.clone()) {
            unique.push(point);
        } else {
            warn!("Duplicate point '{}' ignored", point);
        }
    }

    if unique.is_empty() {
        return Err(RunError::Config("no points configured".to_string()));
    }
    Ok(unique)
}

/// Connect, spawn the workers and hand the run to the supervisor. Owns every
/// transition out of `Connecting`.
async fn launch(
    shared: Arc<Shared>,
    config: RunConfig,
    points: Vec<Point>,
    signals: RunSignals,
    connection: Arc<ConnectionManager>,
) -> Result<RunState, RunError> {
    // Armed before the monitor starts, so a session lost right after the
    // acknowledgement is restored.
    connection.set_reconnect_armed(true);

    let connected = tokio::select! {
        biased;
        _ = signals.stop.cancelled() => None,
        _ = signals.interrupt.cancelled() => None,
        result = connection.connect() => Some(result),
    };

    let mut slot = shared.slot.lock().await;

    match connected {
        Some(Ok(())) if !signals.raised() => {}
        Some(Err(e)) => {
            error!("Failed to connect to broker: {}", e);
            slot.signals = None;
            slot.connection = None;
            shared.set_state(RunState::Failed);
            return Err(e.into());
        }
        _ => {
            connection.disconnect().await;
            slot.signals = None;
            slot.connection = None;
            shared.set_state(RunState::Stopped);
            info!("Run stopped before any worker was spawned");
            return Ok(RunState::Stopped);
        }
    }

    shared.set_state(RunState::Connected);

    let counters = SentCounters::new(&points);
    let topic: Arc<str> = Arc::from(config.topic.as_str());
    let worker_stop = CancellationToken::new();

    let workers: Vec<_> = counters
        .iter()
        .enumerate()
        .map(|(index, (point, counter))| {
            let worker = PublishWorker::new(
                point.clone(),
                topic.clone(),
                connection.clone(),
                PayloadGenerator::for_worker(config.seed, index),
                counter.clone(),
                config.cadence,
            );
            (point.clone(), tokio::spawn(worker.run(worker_stop.clone())))
        })
        .collect();

    let deadline = Instant::now() + config.max_duration;
    let stats = StatsCollector::start(counters);

    slot.stats = Some(stats.clone());
    shared.set_state(RunState::Running);

    info!(
        "Run started: {} points publishing to '{}' every {:?} for at most {:?}",
        points.len(),
        config.topic,
        config.cadence,
        config.max_duration
    );

    tokio::spawn(supervise(
        shared.clone(),
        Supervision {
            signals,
            worker_stop,
            deadline,
            join_timeout: config.join_timeout,
            workers,
            connection,
            stats,
        },
    ));

    Ok(RunState::Running)
}

/// Wait for the end of the run, then shut it down.
async fn supervise(shared: Arc<Shared>, run: Supervision) {
    let Supervision {
        signals,
        worker_stop,
        deadline,
        join_timeout,
        workers,
        connection,
        stats,
    } = run;

    let reason = tokio::select! {
        biased;
        _ = signals.stop.cancelled() => StopReason::StopRequested,
        _ = signals.interrupt.cancelled() => StopReason::Interrupted,
        _ = tokio::time::sleep_until(deadline) => StopReason::DurationElapsed,
    };

    info!("Stopping run: {}", reason);
    {
        let _slot = shared.slot.lock().await;
        shared.set_state(RunState::Stopping);
    }

    connection.set_reconnect_armed(false);
    worker_stop.cancel();
    let unclean_workers = join_workers(workers, join_timeout).await;
    connection.disconnect().await;

    let report = stats.finish(reason, unclean_workers);
    info!(
        "Run finished: {} messages from {} points in {:?}",
        report.total_sent(),
        report.counts.len(),
        report.duration
    );

    let mut slot = shared.slot.lock().await;
    slot.signals = None;
    slot.connection = None;
    slot.stats = None;
    slot.report = Some(report);
    shared.set_state(RunState::Stopped);
}

/// Join every worker within one overall timeout. Returns the points whose
/// worker did not finish cleanly.
async fn join_workers(workers: Vec<(Point, JoinHandle<u64>)>, join_timeout: Duration) -> Vec<Point> {
    let deadline = Instant::now() + join_timeout;
    let mut unclean = Vec::new();

    for (point, mut handle) in workers {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(sent)) => debug!("Worker for point '{}' joined after {} attempts", point, sent),
            Ok(Err(e)) => {
                warn!("Worker for point '{}' ended abnormally: {}", point, e);
                unclean.push(point);
            }
            Err(_) => {
                warn!(
                    "Worker for point '{}' did not stop within {:?}; aborting it",
                    point, join_timeout
                );
                handle.abort();
                unclean.push(point);
            }
        }
    }

    unclean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_points_rejects_empty() {
        assert!(matches!(prepare_points(vec![]), Err(RunError::Config(_))));
        assert!(matches!(
            prepare_points(vec![Point::new("  ")]),
            Err(RunError::Config(_))
        ));
    }

    #[test]
    fn test_prepare_points_drops_duplicates() {
        let points = prepare_points(vec![
            Point::new("P1"),
            Point::new("P2"),
            Point::new("P1"),
        ])
        .unwrap();

        assert_eq!(points, vec![Point::new("P1"), Point::new("P2")]);
    }

    #[test]
    fn test_run_state_is_active() {
        assert!(!RunState::Idle.is_active());
        assert!(RunState::Connecting.is_active());
        assert!(RunState::Running.is_active());
        assert!(RunState::Stopping.is_active());
        assert!(!RunState::Stopped.is_active());
        assert!(!RunState::Failed.is_active());
    }
}
