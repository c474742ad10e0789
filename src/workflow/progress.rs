//! Progress reporting
//!
//! The orchestrator publishes [`ProgressEvent`]s fire-and-forget into a
//! bounded channel; a caller-supplied consumer drains it. Workers never
//! block on a slow consumer — when the channel is full the event is
//! dropped, which is acceptable for a notification stream that carries no
//! state the final result does not.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Phase of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Idle,
    Scanning,
    Analyzing,
    Matching,
    Organizing,
    Completed,
    Failed,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Analyzing => "analyzing",
            Self::Matching => "matching",
            Self::Organizing => "organizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Current phase
    pub phase: WorkflowPhase,

    /// Human-readable step description, e.g. "Analyzing clip.mp4"
    pub step: String,

    /// Percentage of files fully processed (0.0-100.0)
    pub percent: f32,

    /// Files fully processed so far
    pub processed: usize,

    /// Total files in the run
    pub total: usize,
}

/// Simple callback signature for callers who do not want to drain a
/// channel themselves: `(phase, step, percent, processed, total)`.
pub type ProgressCallback = Box<dyn Fn(&str, &str, f32, usize, usize) + Send + Sync>;

/// Publishing half of the progress channel. Cheap to clone into workers.
#[derive(Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSender {
    /// A sender that drops every event. Used when the caller did not ask
    /// for progress.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a bounded progress channel. The receiver is handed to the
    /// caller to drain however it likes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// Adapter for plain callbacks: spawns a drain task that invokes the
    /// callback per event. Must be called from within a tokio runtime.
    pub fn from_callback(capacity: usize, callback: ProgressCallback) -> Self {
        let (sender, mut rx) = Self::channel(capacity);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                callback(
                    event.phase.as_str(),
                    &event.step,
                    event.percent,
                    event.processed,
                    event.total,
                );
            }
        });
        sender
    }

    /// Publish an event. Never blocks; drops the event if the consumer is
    /// behind or absent.
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event) {
                tracing::trace!("Progress consumer behind, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn event(step: &str) -> ProgressEvent {
        ProgressEvent {
            phase: WorkflowPhase::Analyzing,
            step: step.to_string(),
            percent: 50.0,
            processed: 1,
            total: 2,
        }
    }

    #[tokio::test]
    async fn channel_delivers_events_in_order() {
        let (sender, mut rx) = ProgressSender::channel(8);
        sender.emit(event("first"));
        sender.emit(event("second"));
        drop(sender);

        assert_eq!(rx.recv().await.unwrap().step, "first");
        assert_eq!(rx.recv().await.unwrap().step, "second");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (sender, mut rx) = ProgressSender::channel(1);
        sender.emit(event("kept"));
        sender.emit(event("dropped"));

        assert_eq!(rx.recv().await.unwrap().step, "kept");
        drop(sender);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn disabled_sender_is_a_no_op() {
        let sender = ProgressSender::disabled();
        sender.emit(event("ignored"));
    }

    #[tokio::test]
    async fn callback_adapter_invokes_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let sender = ProgressSender::from_callback(
            8,
            Box::new(move |phase, _step, _pct, _done, _total| {
                assert_eq!(phase, "analyzing");
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        sender.emit(event("one"));
        sender.emit(event("two"));
        drop(sender);

        // Give the drain task a beat to run.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
