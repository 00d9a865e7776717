//! Per-point counters and run reports.

use crate::connection::ConnectionState;
use crate::controller::RunState;
use crate::point::Point;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One counter per point, each written by exactly one worker.
#[derive(Debug, Clone)]
pub struct SentCounters {
    entries: Vec<(Point, Arc<AtomicU64>)>,
}

impl SentCounters {
    /// Create zeroed counters for the given points.
    pub fn new(points: &[Point]) -> Self {
        Self {
            entries: points
                .iter()
                .map(|point| (point.clone(), Arc::new(AtomicU64::new(0))))
                .collect(),
        }
    }

    /// The counter owned by the worker for `point`.
    pub fn counter(&self, point: &Point) -> Option<Arc<AtomicU64>> {
        self.entries
            .iter()
            .find(|(p, _)| p == point)
            .map(|(_, counter)| counter.clone())
    }

    /// Points and their counters in configured order.
    pub fn iter(&self) -> impl Iterator<Item = (&Point, &Arc<AtomicU64>)> {
        self.entries.iter().map(|(point, counter)| (point, counter))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current values. Concurrent readers may observe a count one behind.
    pub fn snapshot(&self) -> Vec<PointCount> {
        self.entries
            .iter()
            .map(|(point, counter)| PointCount {
                point: point.clone(),
                sent: counter.load(Ordering::Relaxed),
            })
            .collect()
    }
}

/// Number of publish attempts made for a point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointCount {
    pub point: Point,
    pub sent: u64,
}

/// Why a run left the Running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The maximum run duration elapsed.
    DurationElapsed,
    /// `stop_run` was called.
    StopRequested,
    /// The process received an interrupt.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopReason::DurationElapsed => "maximum duration elapsed",
            StopReason::StopRequested => "stop requested",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// Builds the final report of a run.
///
/// Created at the Running transition; `finish` must only be called once every
/// worker has been joined, so the counters it reads have no writers left.
/// Clones share the same counters; the controller keeps one for live status.
#[derive(Debug, Clone)]
pub struct StatsCollector {
    counters: SentCounters,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl StatsCollector {
    pub fn start(counters: SentCounters) -> Self {
        Self {
            counters,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn counters(&self) -> &SentCounters {
        &self.counters
    }

    /// Produce the final report.
    pub fn finish(self, stop_reason: StopReason, unclean_workers: Vec<Point>) -> RunReport {
        RunReport {
            started_at: self.started_at,
            ended_at: Utc::now(),
            duration: self.started.elapsed(),
            counts: self.counters.snapshot(),
            stop_reason,
            unclean_workers,
        }
    }
}

/// Final result of a stopped run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Wall-clock start of the Running state.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of shutdown.
    pub ended_at: DateTime<Utc>,
    /// Total running time.
    pub duration: Duration,
    /// Per-point attempt counts in configured order.
    pub counts: Vec<PointCount>,
    /// Why the run stopped.
    pub stop_reason: StopReason,
    /// Points whose worker did not stop within the join timeout.
    pub unclean_workers: Vec<Point>,
}

impl RunReport {
    /// Sum of all per-point counts.
    pub fn total_sent(&self) -> u64 {
        self.counts.iter().map(|c| c.sent).sum()
    }

    /// Count for a single point.
    pub fn count_for(&self, point: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|c| c.point.as_str() == point)
            .map(|c| c.sent)
    }

    /// Overall publish attempts per second.
    pub fn messages_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total_sent() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Generate a summary string.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Run Report\n\
             ==========\n\
             Start time: {}\n\
             End time: {}\n\
             Total running time: {:?}\n\
             Stopped because: {}\n\
             Total sent: {} ({:.2} msg/sec)\n\n\
             Data sent count:\n",
            self.started_at,
            self.ended_at,
            self.duration,
            self.stop_reason,
            self.total_sent(),
            self.messages_per_second()
        );

        for count in &self.counts {
            summary.push_str(&format!("- {}: {}\n", count.point, count.sent));
        }

        if !self.unclean_workers.is_empty() {
            summary.push_str("\nWorkers that did not stop cleanly:\n");
            for point in &self.unclean_workers {
                summary.push_str(&format!("- {point}\n"));
            }
        }

        summary
    }
}

/// Live view of the controller.
#[derive(Debug, Clone)]
pub struct RunStatus {
    pub state: RunState,
    pub connection: ConnectionState,
    /// Wall-clock start of the current or last run.
    pub started_at: Option<DateTime<Utc>>,
    /// Time since the run started (final duration once stopped).
    pub elapsed: Option<Duration>,
    pub counts: Vec<PointCount>,
}

impl RunStatus {
    pub fn total_sent(&self) -> u64 {
        self.counts.iter().map(|c| c.sent).sum()
    }
}
