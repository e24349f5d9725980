use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::ledger::{HistoryLedger, MutationOrigin, RecordOutcome};
use crate::models::Document;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug)]
struct TrackedMutation {
    document: Document,
    description: String,
    action: String,
    origin: MutationOrigin,
}

#[derive(Debug)]
enum Message {
    Track(TrackedMutation),
    Flush(oneshot::Sender<()>),
}

/// Debounced front-end to a shared `HistoryLedger`.
///
/// Every `track` call restarts the quiet window; when the window elapses only
/// the last tracked mutation is handed to the ledger. `flush`, `shutdown` and
/// dropping the tracker hand a pending mutation over immediately.
pub struct HistoryTracker {
    tx: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

impl HistoryTracker {
    pub fn spawn(ledger: Arc<Mutex<HistoryLedger>>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_tracker(ledger, rx, debounce));
        Self { tx, task }
    }

    pub fn track(
        &self,
        document: Document,
        description: impl Into<String>,
        action: impl Into<String>,
        origin: MutationOrigin,
    ) {
        let mutation = TrackedMutation {
            document,
            description: description.into(),
            action: action.into(),
            origin,
        };
        // The receiver only goes away after shutdown has consumed `self`.
        let _ = self.tx.send(Message::Track(mutation));
    }

    /// Hands any pending mutation to the ledger now and waits until it has
    /// been applied.
    pub async fn flush(&self) {
        let (done, applied) = oneshot::channel();
        if self.tx.send(Message::Flush(done)).is_ok() {
            let _ = applied.await;
        }
    }

    /// Flushes any pending mutation and stops the debounce task.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::error!("History tracker task failed: {e}");
        }
    }
}

async fn run_tracker(
    ledger: Arc<Mutex<HistoryLedger>>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    debounce: Duration,
) {
    let mut pending: Option<TrackedMutation> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        // `None` means the quiet window elapsed.
        let next = match deadline {
            Some(at) => tokio::select! {
                message = rx.recv() => Some(message),
                _ = tokio::time::sleep_until(at) => None,
            },
            None => Some(rx.recv().await),
        };

        match next {
            None => {
                deadline = None;
                commit(&ledger, pending.take()).await;
            }
            Some(Some(Message::Track(mutation))) => {
                pending = Some(mutation);
                deadline = Some(Instant::now() + debounce);
            }
            Some(Some(Message::Flush(done))) => {
                deadline = None;
                commit(&ledger, pending.take()).await;
                let _ = done.send(());
            }
            Some(None) => {
                commit(&ledger, pending.take()).await;
                break;
            }
        }
    }
}

async fn commit(ledger: &Mutex<HistoryLedger>, mutation: Option<TrackedMutation>) {
    let Some(mutation) = mutation else {
        return;
    };
    let outcome = ledger.lock().await.record_mutation(
        &mutation.document,
        &mutation.description,
        &mutation.action,
        mutation.origin,
    );
    match outcome {
        RecordOutcome::Recorded => debug!("History entry recorded: {}", mutation.description),
        RecordOutcome::Suppressed => debug!("Skipped history echo of undo/redo"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shared_ledger() -> Arc<Mutex<HistoryLedger>> {
        Arc::new(Mutex::new(HistoryLedger::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_mutations_collapse_into_one_entry() {
        let ledger = shared_ledger();
        let tracker = HistoryTracker::spawn(ledger.clone(), DEFAULT_DEBOUNCE);

        for i in 0..5 {
            tracker.track(json!({"summary": i}), "typing", "edit", MutationOrigin::User);
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(ledger.lock().await.len(), 0, "still inside the quiet window");

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let ledger = ledger.lock().await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.current_entry().unwrap().document, json!({"summary": 4}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separated_mutations_record_separately() {
        let ledger = shared_ledger();
        let tracker = HistoryTracker::spawn(ledger.clone(), Duration::from_millis(500));

        tracker.track(json!({"v": 1}), "first", "edit", MutationOrigin::User);
        tokio::time::sleep(Duration::from_millis(600)).await;
        tracker.track(json!({"v": 2}), "second", "edit", MutationOrigin::User);
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(ledger.lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_mutation() {
        let ledger = shared_ledger();
        let tracker = HistoryTracker::spawn(ledger.clone(), Duration::from_secs(60));
        tracker.track(json!({"v": 1}), "pending", "edit", MutationOrigin::User);
        tracker.shutdown().await;
        assert_eq!(ledger.lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_records_pending_mutation_immediately() {
        let ledger = shared_ledger();
        let tracker = HistoryTracker::spawn(ledger.clone(), Duration::from_secs(60));

        tracker.flush().await;
        assert_eq!(ledger.lock().await.len(), 0, "nothing pending");

        tracker.track(json!({"v": 1}), "pending", "edit", MutationOrigin::User);
        tracker.flush().await;
        assert_eq!(ledger.lock().await.len(), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ledger.lock().await.len(), 1, "flushed mutation is not recorded twice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_echo_is_not_recorded() {
        let ledger = shared_ledger();
        {
            let mut l = ledger.lock().await;
            l.record(&json!({"v": 1}), "init", "init");
            l.record(&json!({"v": 2}), "edit", "edit");
        }
        let tracker = HistoryTracker::spawn(ledger.clone(), Duration::from_millis(100));

        let restored = ledger.lock().await.undo().unwrap();
        tracker.track(restored, "Resume updated", "edit", MutationOrigin::HistoryRestore);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let l = ledger.lock().await;
        assert_eq!(l.len(), 2);
        assert!(l.can_redo());
    }
}
