use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{AutoSaveConfig, AutoSaveState};
use crate::document::{ChangeDetector, Fingerprint};
use crate::models::Document;
use crate::persistence::{ResumeStore, SaveError};

const PROGRESS_TICK: Duration = Duration::from_millis(100);
const PROGRESS_STEP: u8 = 10;
const PROGRESS_CAP: u8 = 90;

pub enum Command {
    ForceSave(oneshot::Sender<Result<(), SaveError>>),
    ClearError,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Idle,
    Debounce(Instant),
    Retry(Instant),
}

impl Timer {
    fn deadline(self) -> Option<Instant> {
        match self {
            Timer::Idle => None,
            Timer::Debounce(at) | Timer::Retry(at) => Some(at),
        }
    }
}

pub struct Scheduler {
    resume_id: Uuid,
    store: Arc<dyn ResumeStore>,
    documents: watch::Receiver<Document>,
    state: watch::Sender<AutoSaveState>,
    config: AutoSaveConfig,
    detector: ChangeDetector,
    timer: Timer,
    retries: u32,
}

impl Scheduler {
    pub fn new(
        resume_id: Uuid,
        store: Arc<dyn ResumeStore>,
        mut documents: watch::Receiver<Document>,
        state: watch::Sender<AutoSaveState>,
        config: AutoSaveConfig,
    ) -> Self {
        let detector = ChangeDetector::seeded(&documents.borrow_and_update());
        Self {
            resume_id,
            store,
            documents,
            state,
            config,
            detector,
            timer: Timer::Idle,
            retries: 0,
        }
    }

    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = self.timer.deadline();
            let wake_at = deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                changed = self.documents.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.on_document_changed();
                }
                command = commands.recv() => match command {
                    None => break,
                    Some(Command::ForceSave(reply)) => {
                        self.timer = Timer::Idle;
                        let result = self.save().await;
                        let _ = reply.send(result);
                    }
                    Some(Command::ClearError) => {
                        self.state.send_modify(|s| s.save_error = None);
                    }
                    Some(Command::Reset) => {
                        self.timer = Timer::Idle;
                        self.retries = 0;
                        self.state.send_replace(AutoSaveState::default());
                    }
                },
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    self.timer = Timer::Idle;
                    // Failures are recorded in the state and rescheduled by `save`.
                    let _ = self.save().await;
                }
            }
        }
        debug!("Auto-save scheduler for resume {} stopped", self.resume_id);
    }

    fn on_document_changed(&mut self) {
        let document = self.documents.borrow_and_update().clone();
        if !self.detector.observe(&document) || !self.config.enabled {
            return;
        }
        self.state.send_modify(|s| {
            s.has_unsaved_changes = true;
            s.save_error = None;
        });
        self.retries = 0;
        self.timer = Timer::Debounce(Instant::now() + self.config.debounce);
    }

    async fn save(&mut self) -> Result<(), SaveError> {
        if !self.config.enabled {
            debug!("Auto-save disabled; skipping save of resume {}", self.resume_id);
            return Ok(());
        }

        let document = self.documents.borrow_and_update().clone();
        self.detector.observe(&document);
        let saved = Fingerprint::of(&document);

        self.state.send_modify(|s| {
            s.is_saving = true;
            s.save_progress = 0;
            s.last_save_attempt = Some(Utc::now());
        });

        let result = {
            let save = self.store.save(self.resume_id, &document);
            tokio::pin!(save);
            let mut ticker = tokio::time::interval(PROGRESS_TICK);
            ticker.tick().await;
            loop {
                tokio::select! {
                    result = &mut save => break result,
                    _ = ticker.tick() => self.state.send_modify(|s| {
                        s.save_progress = (s.save_progress + PROGRESS_STEP).min(PROGRESS_CAP);
                    }),
                }
            }
        };

        match result {
            Ok(()) => {
                self.retries = 0;
                let dirty = Fingerprint::of(&self.documents.borrow()) != saved;
                self.state.send_modify(|s| {
                    s.is_saving = false;
                    s.has_unsaved_changes = dirty;
                    s.last_saved = Some(Utc::now());
                    s.save_progress = 100;
                    s.save_error = None;
                    s.save_count += 1;
                });
                info!("Resume {} saved successfully", self.resume_id);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.is_saving = false;
                    s.save_error = Some(message.clone());
                    s.save_progress = 0;
                });
                if self.retries < self.config.max_retries {
                    self.retries += 1;
                    let delay = self.config.retry_delay * self.retries;
                    warn!(
                        "Auto-save of resume {} failed (attempt {}), retrying after {}ms: \
                         {message}",
                        self.resume_id,
                        self.retries,
                        delay.as_millis()
                    );
                    self.timer = Timer::Retry(Instant::now() + delay);
                } else {
                    error!(
                        "Failed to save resume {} after {} retries: {message}",
                        self.resume_id, self.config.max_retries
                    );
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Semaphore;

    use crate::autosave::{AutoSaveConfig, AutoSaveError, AutoSaveHandle, AutoSaveState};
    use crate::document::DocumentStore;
    use crate::models::Document;
    use crate::persistence::{ResumeStore, SaveError};
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingStore {
        saves: Mutex<Vec<Document>>,
        failures_left: AtomicU32,
        gate: Option<Arc<Semaphore>>,
    }

    impl RecordingStore {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(times),
                ..Default::default()
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Default::default()
            }
        }

        fn saves(&self) -> Vec<Document> {
            self.saves.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResumeStore for RecordingStore {
        async fn load(&self, _resume_id: Uuid) -> Result<Option<Document>, SaveError> {
            Ok(None)
        }

        async fn save(&self, _resume_id: Uuid, document: &Document) -> Result<(), SaveError> {
            self.saves.lock().unwrap().push(document.clone());
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(SaveError::Api {
                    status: 503,
                    message: "Server error. Please try again later.".to_string(),
                });
            }
            Ok(())
        }
    }

    fn config() -> AutoSaveConfig {
        AutoSaveConfig {
            enabled: true,
            debounce: Duration::from_millis(2000),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }

    fn spawn(store: Arc<RecordingStore>, documents: &DocumentStore) -> AutoSaveHandle {
        AutoSaveHandle::spawn(Uuid::new_v4(), store, documents.subscribe(), config())
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_document_is_not_saved() {
        let store = Arc::new(RecordingStore::default());
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = spawn(store.clone(), &documents);
        advance(10_000).await;
        assert!(store.saves().is_empty());
        assert!(!handle.before_unload());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_saves_once_with_final_state() {
        let store = Arc::new(RecordingStore::default());
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = spawn(store.clone(), &documents);

        for i in 1..=5 {
            documents.replace(json!({"v": i}));
            advance(300).await;
        }
        assert!(handle.state().has_unsaved_changes);
        assert!(handle.before_unload());

        advance(2500).await;
        assert_eq!(store.saves(), vec![json!({"v": 5})]);

        let state = handle.state();
        assert_eq!(state.save_count, 1);
        assert!(!state.has_unsaved_changes);
        assert!(state.last_saved.is_some());
        assert_eq!(state.save_progress, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_snapshot_does_not_arm_debounce() {
        let store = Arc::new(RecordingStore::default());
        let documents = DocumentStore::new(json!({"v": 0}));
        let _handle = spawn(store.clone(), &documents);
        documents.replace(json!({"v": 0}));
        advance(5000).await;
        assert!(store.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_second_save_while_one_is_in_flight() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(RecordingStore::gated(gate.clone()));
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = spawn(store.clone(), &documents);

        documents.replace(json!({"v": 1}));
        advance(2100).await;
        assert_eq!(store.saves().len(), 1);
        assert!(handle.state().is_saving);

        documents.replace(json!({"v": 2}));
        documents.replace(json!({"v": 3}));
        advance(10_000).await;
        assert_eq!(store.saves().len(), 1, "save gate holds while in flight");
        assert_eq!(handle.state().save_progress, 90);

        gate.add_permits(1);
        advance(100).await;
        let state = handle.state();
        assert!(!state.is_saving);
        assert!(state.has_unsaved_changes, "newer edit is still unsaved");
        assert_eq!(store.saves().len(), 1, "next save waits for the debounce");

        gate.add_permits(1);
        advance(2100).await;
        assert_eq!(store.saves(), vec![json!({"v": 1}), json!({"v": 3})]);
        assert!(!handle.state().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_linear_backoff_then_succeeds() {
        let store = Arc::new(RecordingStore::failing(2));
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = spawn(store.clone(), &documents);

        documents.replace(json!({"v": 1}));
        advance(2100).await;
        assert_eq!(store.saves().len(), 1);
        assert!(handle.state().save_error.is_some());

        // first retry after 1 x 1000ms
        advance(1000).await;
        assert_eq!(store.saves().len(), 2);

        // second retry after 2 x 1000ms
        advance(1000).await;
        assert_eq!(store.saves().len(), 2);
        advance(1000).await;
        assert_eq!(store.saves().len(), 3);

        let state = handle.state();
        assert_eq!(state.save_error, None);
        assert_eq!(state.save_count, 1);
        assert!(!state.has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_stop_until_next_change() {
        let store = Arc::new(RecordingStore::failing(100));
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = spawn(store.clone(), &documents);

        documents.replace(json!({"v": 1}));
        advance(60_000).await;
        assert_eq!(store.saves().len(), 4, "initial attempt plus three retries");
        let state = handle.state();
        assert_eq!(
            state.save_error.as_deref(),
            Some("Server error. Please try again later.")
        );
        assert!(state.has_unsaved_changes);

        documents.replace(json!({"v": 2}));
        advance(2100).await;
        assert_eq!(store.saves().len(), 5, "new edit re-arms the scheduler");
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_save_skips_debounce() {
        let store = Arc::new(RecordingStore::default());
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = spawn(store.clone(), &documents);

        documents.replace(json!({"v": 1}));
        advance(10).await;
        handle.force_save().await.unwrap();
        assert_eq!(store.saves(), vec![json!({"v": 1})]);

        advance(5000).await;
        assert_eq!(store.saves().len(), 1, "cancelled debounce never fires");
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_save_reports_failure() {
        let store = Arc::new(RecordingStore::failing(1));
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = spawn(store.clone(), &documents);

        let err = handle.force_save().await.unwrap_err();
        assert!(matches!(err, AutoSaveError::Save(SaveError::Api { status: 503, .. })));
        handle.clear_error();
        advance(10).await;
        assert_eq!(handle.state().save_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_state_and_pending_timer() {
        let store = Arc::new(RecordingStore::default());
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = spawn(store.clone(), &documents);

        documents.replace(json!({"v": 1}));
        advance(10).await;
        handle.reset();
        advance(5000).await;
        assert!(store.saves().is_empty());
        assert_eq!(handle.state(), AutoSaveState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_scheduler_ignores_changes() {
        let store = Arc::new(RecordingStore::default());
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = AutoSaveHandle::spawn(
            Uuid::new_v4(),
            store.clone(),
            documents.subscribe(),
            AutoSaveConfig {
                enabled: false,
                ..config()
            },
        );
        documents.replace(json!({"v": 1}));
        advance(5000).await;
        handle.force_save().await.unwrap();
        assert!(store.saves().is_empty());
        assert!(!handle.before_unload());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_actor() {
        let store = Arc::new(RecordingStore::default());
        let documents = DocumentStore::new(json!({"v": 0}));
        let handle = spawn(store.clone(), &documents);
        handle.shutdown().await;
        documents.replace(json!({"v": 1}));
        advance(5000).await;
        assert!(store.saves().is_empty());
    }
}
