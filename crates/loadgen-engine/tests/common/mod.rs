//! In-memory broker transport for driving the engine in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use loadgen_engine::{
    ConnectOptions, Point, RunConfig, Transport, TransportError, TransportEvent, CONNACK_ACCEPTED,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// How the fake broker answers a connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Accept,
    Refuse(u8),
    /// Never acknowledge.
    Silent,
    /// Acknowledge, then drop the session straight away.
    AcceptThenDrop,
}

#[derive(Default)]
struct MockState {
    default_ack: Option<Ack>,
    queued_acks: VecDeque<Ack>,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    connected: bool,
    connect_calls: usize,
    disconnect_calls: usize,
    hang_publishes: bool,
    published: Vec<(String, Vec<u8>)>,
    failed_publishes: usize,
}

/// A transport that records everything and lets tests inject failures.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Self::with_ack(Ack::Accept)
    }

    pub fn with_ack(ack: Ack) -> Arc<Self> {
        let transport = Self::default();
        transport.state.lock().unwrap().default_ack = Some(ack);
        Arc::new(transport)
    }

    /// Answer the next connects with `acks`, in order, before falling back
    /// to the default.
    pub fn queue_acks(&self, acks: impl IntoIterator<Item = Ack>) {
        self.state.lock().unwrap().queued_acks.extend(acks);
    }

    /// Make every publish hang forever.
    pub fn hang_publishes(&self) {
        self.state.lock().unwrap().hang_publishes = true;
    }

    /// Simulate the broker dropping the session.
    pub fn drop_connection(&self, reason: &str) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        if let Some(events) = state.events.take() {
            let _ = events.send(TransportEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().unwrap().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().unwrap().disconnect_calls
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    pub fn published_count(&self) -> usize {
        self.state.lock().unwrap().published.len()
    }

    pub fn failed_publishes(&self) -> usize {
        self.state.lock().unwrap().failed_publishes
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().unwrap().published.clone()
    }

    /// Payloads published for `point`, parsed as JSON.
    pub fn payloads_for(&self, point: &str) -> Vec<serde_json::Value> {
        self.published()
            .into_iter()
            .map(|(_, payload)| serde_json::from_slice::<serde_json::Value>(&payload).unwrap())
            .filter(|value| value.get(point).is_some())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        _options: &ConnectOptions,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.connect_calls += 1;

        let ack = state
            .queued_acks
            .pop_front()
            .or(state.default_ack)
            .unwrap_or(Ack::Accept);

        let (tx, rx) = mpsc::unbounded_channel();
        match ack {
            Ack::Accept => {
                state.connected = true;
                let _ = tx.send(TransportEvent::ConnAck {
                    code: CONNACK_ACCEPTED,
                });
            }
            Ack::Refuse(code) => {
                state.connected = false;
                let _ = tx.send(TransportEvent::ConnAck { code });
            }
            Ack::Silent => state.connected = false,
            Ack::AcceptThenDrop => {
                state.connected = false;
                let _ = tx.send(TransportEvent::ConnAck {
                    code: CONNACK_ACCEPTED,
                });
                let _ = tx.send(TransportEvent::Disconnected {
                    reason: "connection reset".to_string(),
                });
                return Ok(rx);
            }
        }
        state.events = Some(tx);

        Ok(rx)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.hang_publishes {
                if !state.connected {
                    state.failed_publishes += 1;
                    return Err(TransportError::NotConnected);
                }
                state.published.push((topic.to_string(), payload));
                return Ok(());
            }
        }

        std::future::pending::<()>().await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.disconnect_calls += 1;
        state.connected = false;
        state.events = None;
        Ok(())
    }
}

pub fn points(ids: &[&str]) -> Vec<Point> {
    ids.iter().map(|id| Point::new(*id)).collect()
}

/// A configuration with a one-second cadence and a fixed seed.
pub fn test_config(max_duration: Duration) -> RunConfig {
    RunConfig::new("broker.test", 1883, "loadtest/points")
        .with_client_id("client_1000")
        .with_max_duration(max_duration)
        .with_cadence(Duration::from_secs(1))
        .with_reconnect_delay(Duration::from_secs(1))
        .with_seed(Some(42))
}
