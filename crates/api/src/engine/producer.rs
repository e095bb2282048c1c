//! Cancellable event producers.
//!
//! Every job runner and telemetry feed runs as a producer: a spawned task
//! that emits through a [`ProducerSink`] and is stopped through its
//! [`ProducerHandle`]. Emission and cancellation share a gate, so once
//! [`ProducerHandle::cancel`] returns no further event from that producer
//! can reach the session channel, even if its timer had already fired.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pulse_core::messages::ServerEvent;
use pulse_events::EventSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Emitting half of a producer, moved into its task.
pub struct ProducerSink {
    sender: EventSender,
    token: CancellationToken,
    gate: Arc<Mutex<()>>,
}

impl ProducerSink {
    /// Push an event to the session channel.
    ///
    /// Returns `false` if the producer was cancelled or the session channel
    /// is closed; the caller should stop producing.
    pub fn emit(&self, event: ServerEvent) -> bool {
        let _gate = self.gate.lock();
        if self.token.is_cancelled() {
            return false;
        }
        self.sender.send(event).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the producer is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` on
    /// cancellation.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

/// Owning half of a producer, held by the session.
///
/// Dropping a handle does not stop the producer; sessions cancel explicitly.
#[derive(Debug)]
pub struct ProducerHandle {
    token: CancellationToken,
    gate: Arc<Mutex<()>>,
    task: JoinHandle<()>,
}

impl ProducerHandle {
    /// Build a sink over `sender`, run `start` with it, and spawn the
    /// returned future.
    ///
    /// `start` runs synchronously before this returns, so anything it emits
    /// is enqueued before the caller regains control.
    pub fn spawn<F, Fut>(sender: EventSender, start: F) -> Self
    where
        F: FnOnce(ProducerSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let gate = Arc::new(Mutex::new(()));
        let sink = ProducerSink {
            sender,
            token: token.clone(),
            gate: Arc::clone(&gate),
        };
        let task = tokio::spawn(start(sink));
        Self { token, gate, task }
    }

    /// Stop the producer. Idempotent.
    pub fn cancel(&self) {
        {
            let _gate = self.gate.lock();
            self.token.cancel();
        }
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the producer task has exited (finished or cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn emits_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ProducerHandle::spawn(tx, |sink| {
            sink.emit(ServerEvent::welcome("sync"));
            async move {
                sink.cancelled().await;
                assert!(!sink.emit(ServerEvent::welcome("late")));
            }
        });

        // Emitted synchronously inside spawn.
        assert!(rx.try_recv().is_ok());

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_reports_cancellation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let handle = ProducerHandle::spawn(tx, |sink| async move {
            let completed = sink.sleep(Duration::from_secs(3600)).await;
            let _ = done_tx.send(completed);
        });

        tokio::task::yield_now().await;
        {
            let _gate = handle.gate.lock();
            handle.token.cancel();
        }

        assert_eq!(done_rx.await.ok(), Some(false));
        assert!(handle.is_cancelled());
    }
}
