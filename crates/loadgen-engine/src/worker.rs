//! Periodic publisher for a single point.

use crate::connection::ConnectionManager;
use crate::point::Point;
use loadgen_payload::PayloadGenerator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Publishes one synthetic record for its point every cadence period.
///
/// The worker is the only writer of its counter. Every attempt is counted,
/// whether or not the publish succeeded: the transport is fire-and-forget and
/// offers no delivery confirmation.
pub struct PublishWorker {
    point: Point,
    topic: Arc<str>,
    connection: Arc<ConnectionManager>,
    generator: PayloadGenerator,
    counter: Arc<AtomicU64>,
    cadence: Duration,
}

impl PublishWorker {
    pub fn new(
        point: Point,
        topic: Arc<str>,
        connection: Arc<ConnectionManager>,
        generator: PayloadGenerator,
        counter: Arc<AtomicU64>,
        cadence: Duration,
    ) -> Self {
        Self {
            point,
            topic,
            connection,
            generator,
            counter,
            cadence,
        }
    }

    /// Run until `stop` is cancelled. Returns the final attempt count.
    ///
    /// The first cycle fires immediately. The stop signal is checked before
    /// every cycle and interrupts the wait between cycles, so a stopped worker
    /// exits within one period.
    pub async fn run(mut self, stop: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(self.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut failing = false;

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.publish_once(&mut failing).await;
        }

        let sent = self.counter.load(Ordering::Relaxed);
        debug!("Worker for point '{}' stopped after {} attempts", self.point, sent);
        sent
    }

    /// One cycle: generate, publish, count.
    async fn publish_once(&mut self, failing: &mut bool) {
        let record = self.generator.generate(self.point.as_str());

        let result = match record.to_json_bytes() {
            Ok(payload) => self
                .connection
                .publish(&self.topic, payload)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(format!("payload encoding failed: {e}")),
        };

        match result {
            Ok(()) => {
                if *failing {
                    debug!("Publishing for point '{}' recovered", self.point);
                }
                *failing = false;
            }
            Err(e) if !*failing => {
                warn!("Publish for point '{}' failed: {}", self.point, e);
                *failing = true;
            }
            Err(e) => debug!("Publish for point '{}' failed: {}", self.point, e),
        }

        self.counter.fetch_add(1, Ordering::Relaxed);
    }
}
