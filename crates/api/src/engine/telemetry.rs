//! Per-session telemetry feed.
//!
//! While subscribed, a session receives a `metrics_update` snapshot
//! immediately and then on every tick of a fixed cadence. Snapshots are
//! sampled independently and stamped with a strictly increasing wall-clock
//! time.

use std::sync::Arc;
use std::time::Duration;

use pulse_core::messages::ServerEvent;
use pulse_core::metrics::{MetricsSource, MonotonicClock};
use pulse_events::EventSender;
use tokio::time::MissedTickBehavior;

use super::producer::ProducerHandle;

/// Starts telemetry feeds; shared by every session.
#[derive(Clone)]
pub struct TelemetryPublisher {
    source: Arc<dyn MetricsSource>,
    interval: Duration,
}

/// An active subscription. Stop it with [`TelemetryPublisher::unsubscribe`]
/// or [`TelemetryHandle::cancel`].
#[derive(Debug)]
pub struct TelemetryHandle {
    producer: ProducerHandle,
}

impl TelemetryHandle {
    /// Stop the feed. No snapshot is delivered after this returns.
    pub fn cancel(&self) {
        self.producer.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.producer.is_cancelled() && !self.producer.is_finished()
    }
}

impl TelemetryPublisher {
    pub fn new(source: Arc<dyn MetricsSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start a feed into `sender`.
    pub fn subscribe(&self, sender: EventSender) -> TelemetryHandle {
        let source = Arc::clone(&self.source);
        let interval = self.interval;

        let producer = ProducerHandle::spawn(sender, move |sink| async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut clock = MonotonicClock::default();

            loop {
                tokio::select! {
                    biased;
                    _ = sink.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = source.sample(clock.now());
                        if !sink.emit(ServerEvent::metrics(snapshot)) {
                            break;
                        }
                    }
                }
            }
        });

        TelemetryHandle { producer }
    }

    /// Stop a feed.
    pub fn unsubscribe(&self, handle: TelemetryHandle) {
        handle.cancel();
    }
}
