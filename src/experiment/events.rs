//! Events emitted by the driver for the display layer.
//!
//! The driver knows nothing about rendering; it pushes [`SimulationEvent`]s
//! into an [`EventSink`]. Live ticks emit per-impression events, turbo
//! chunks only report progress.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::Arm;

/// Notification for the display layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationEvent {
    /// An impression was served to `arm`
    Impression { arm: Arm },
    /// `arm` received a click; `count` is its new click total
    Click { arm: Arm, count: u64 },
    /// Click probability computed for the latest impression of `arm`
    ProbabilityChange { arm: Arm, probability: f64 },
    /// Turbo completion after a chunk
    Progress { percent: u8 },
    /// Required population reached, run stopped
    SampleReached { total_impressions: u64 },
    /// Run started or stopped
    RunStateChanged { running: bool },
    /// Counters zeroed
    Reset,
}

/// Receiver of driver events.
pub trait EventSink {
    fn emit(&mut self, event: SimulationEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: SimulationEvent) {}
}

/// Records events in order.
impl EventSink for Vec<SimulationEvent> {
    fn emit(&mut self, event: SimulationEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: SimulationEvent) {
        (**self).emit(event);
    }
}

/// Fans events out to every subscriber of a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<SimulationEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<SimulationEvent> {
        self.tx.clone()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&mut self, event: SimulationEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_records_in_order() {
        let mut events: Vec<SimulationEvent> = Vec::new();
        events.emit(SimulationEvent::Impression { arm: Arm::A });
        events.emit(SimulationEvent::Progress { percent: 10 });
        assert_eq!(
            events,
            vec![
                SimulationEvent::Impression { arm: Arm::A },
                SimulationEvent::Progress { percent: 10 },
            ]
        );
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&SimulationEvent::Click {
            arm: Arm::B,
            count: 3,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"click","arm":"B","count":3}"#);
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers() {
        let mut sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        sink.emit(SimulationEvent::Reset);
        assert_eq!(rx.recv().await.unwrap(), SimulationEvent::Reset);
    }

    #[test]
    fn test_broadcast_sink_without_subscribers() {
        let mut sink = BroadcastSink::new(1);
        // Must not panic
        sink.emit(SimulationEvent::Progress { percent: 50 });
        sink.emit(SimulationEvent::Progress { percent: 100 });
    }
}
