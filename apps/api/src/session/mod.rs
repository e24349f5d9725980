//! Editing sessions: the composition root that wires one resume's document
//! store, undo/redo history, version ledger and auto-save scheduler together.

pub mod handlers;
mod registry;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::autosave::{AutoSaveConfig, AutoSaveError, AutoSaveHandle, AutoSaveState};
use crate::document::{ChangeDetector, DocumentStore};
use crate::history::{HistoryLedger, HistorySummary, HistoryTracker, MutationOrigin};
use crate::models::Document;
use crate::persistence::ResumeStore;
use crate::versions::{
    Author, Version, VersionDiff, VersionError, VersionLedger, VersionLedgerConfig,
};
pub use registry::SessionRegistry;

const RESTORE_DESCRIPTION: &str = "Resume updated";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub history_max_entries: usize,
    pub history_debounce: Duration,
    pub autosave: AutoSaveConfig,
    pub versions: VersionLedgerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_max_entries: 30,
            history_debounce: Duration::from_millis(1500),
            autosave: AutoSaveConfig::default(),
            versions: VersionLedgerConfig::default(),
        }
    }
}

/// History entry as listed to clients, without its document snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryOverview {
    #[serde(flatten)]
    pub summary: HistorySummary,
    pub undo_description: Option<String>,
    pub redo_description: Option<String>,
    pub entries: Vec<HistoryItem>,
}

pub struct EditingSession {
    resume_id: Uuid,
    documents: DocumentStore,
    /// Held for the whole of every document mutation so the detector, the
    /// working document and the history tracker see edits in one order.
    detector: Mutex<ChangeDetector>,
    history: Arc<Mutex<HistoryLedger>>,
    tracker: HistoryTracker,
    versions: Mutex<VersionLedger>,
    autosave: AutoSaveHandle,
}

impl EditingSession {
    /// Starts a session on `initial`. Must be called inside a tokio runtime:
    /// the history tracker and auto-save scheduler run as tasks.
    pub fn start(
        resume_id: Uuid,
        initial: Document,
        store: Arc<dyn ResumeStore>,
        config: &SessionConfig,
    ) -> Self {
        let mut ledger = HistoryLedger::new(config.history_max_entries);
        ledger.initialize(&initial);
        let history = Arc::new(Mutex::new(ledger));

        let detector = ChangeDetector::seeded(&initial);
        let documents = DocumentStore::new(initial);
        let tracker = HistoryTracker::spawn(history.clone(), config.history_debounce);
        let autosave = AutoSaveHandle::spawn(
            resume_id,
            store,
            documents.subscribe(),
            config.autosave.clone(),
        );
        let versions = VersionLedger::new(resume_id, Author::default(), config.versions.clone());

        info!("Editing session started for resume {resume_id}");
        Self {
            resume_id,
            documents,
            detector: Mutex::new(detector),
            history,
            tracker,
            versions: Mutex::new(versions),
            autosave,
        }
    }

    pub fn resume_id(&self) -> Uuid {
        self.resume_id
    }

    pub fn document(&self) -> Document {
        self.documents.current()
    }

    /// Applies a user edit: replaces the working document, feeds the
    /// debounced history, and takes a periodic version when one is due.
    /// A structurally identical document is ignored.
    pub async fn update(
        &self,
        document: Document,
        description: &str,
        action: &str,
    ) -> Option<Version> {
        let mut detector = self.detector.lock().await;
        if !detector.observe(&document) {
            return None;
        }
        self.documents.replace(document.clone());
        self.tracker
            .track(document.clone(), description, action, MutationOrigin::User);
        self.versions.lock().await.auto_save(&document, Utc::now())
    }

    /// Steps back one history entry. An edit still inside the debounce
    /// window is recorded first, so it stays reachable through redo.
    pub async fn undo(&self) -> Option<Document> {
        let mut detector = self.detector.lock().await;
        self.tracker.flush().await;
        let document = self.history.lock().await.undo()?;
        self.apply_restored(&mut detector, document.clone());
        Some(document)
    }

    pub async fn redo(&self) -> Option<Document> {
        let mut detector = self.detector.lock().await;
        self.tracker.flush().await;
        let document = self.history.lock().await.redo()?;
        self.apply_restored(&mut detector, document.clone());
        Some(document)
    }

    fn apply_restored(&self, detector: &mut ChangeDetector, document: Document) {
        detector.observe(&document);
        self.documents.replace(document.clone());
        self.tracker.track(
            document,
            RESTORE_DESCRIPTION,
            "edit",
            MutationOrigin::HistoryRestore,
        );
    }

    pub async fn history(&self) -> HistoryOverview {
        let ledger = self.history.lock().await;
        HistoryOverview {
            summary: ledger.summary(),
            undo_description: ledger.undo_description().map(str::to_string),
            redo_description: ledger.redo_description().map(str::to_string),
            entries: ledger
                .entries()
                .map(|e| HistoryItem {
                    id: e.id,
                    timestamp: e.timestamp,
                    description: e.description.clone(),
                    action: e.action.clone(),
                })
                .collect(),
        }
    }

    pub async fn clear_history(&self) {
        let _detector = self.detector.lock().await;
        self.tracker.flush().await;
        let mut ledger = self.history.lock().await;
        ledger.clear();
        ledger.initialize(&self.documents.current());
    }

    /// Snapshots the working document as a named version.
    pub async fn create_version(
        &self,
        name: &str,
        description: &str,
        parent_version_id: Option<Uuid>,
        branch_name: Option<&str>,
    ) -> Version {
        let document = self.documents.current();
        self.versions.lock().await.create_version(
            &document,
            name,
            description,
            parent_version_id,
            branch_name,
        )
    }

    /// All versions, newest first.
    pub async fn versions(&self) -> Vec<Version> {
        self.versions
            .lock()
            .await
            .history()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn versions_by_branch(&self, branch_name: &str) -> Vec<Version> {
        self.versions
            .lock()
            .await
            .versions_by_branch(branch_name)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn current_version(&self) -> Option<Version> {
        self.versions.lock().await.current_version().cloned()
    }

    pub async fn branches(&self) -> Vec<String> {
        self.versions.lock().await.branches()
    }

    pub async fn compare_versions(&self, a: Uuid, b: Uuid) -> Option<VersionDiff> {
        self.versions.lock().await.compare_versions(a, b)
    }

    /// Restores a version into the ledger and the working document. The
    /// restore is a user edit, so it is undoable.
    pub async fn restore_version(&self, version_id: Uuid) -> Result<Version, VersionError> {
        let mut detector = self.detector.lock().await;
        let version = self.versions.lock().await.restore_version(version_id)?;
        detector.observe(&version.document);
        self.documents.replace(version.document.clone());
        self.tracker.track(
            version.document.clone(),
            version.name.clone(),
            "restore",
            MutationOrigin::User,
        );
        Ok(version)
    }

    pub async fn create_branch(
        &self,
        version_id: Uuid,
        branch_name: &str,
        initial_document: Option<&Document>,
    ) -> Result<Version, VersionError> {
        self.versions
            .lock()
            .await
            .create_branch(version_id, branch_name, initial_document)
    }

    pub async fn publish_version(&self, version_id: Uuid) -> Result<Version, VersionError> {
        self.versions
            .lock()
            .await
            .publish_version(version_id)
            .cloned()
    }

    pub fn autosave_state(&self) -> AutoSaveState {
        self.autosave.state()
    }

    pub async fn force_save(&self) -> Result<(), AutoSaveError> {
        self.autosave.force_save().await
    }

    pub fn clear_save_error(&self) {
        self.autosave.clear_error();
    }

    pub fn reset_autosave(&self) {
        self.autosave.reset();
    }

    pub fn before_unload(&self) -> bool {
        self.autosave.before_unload()
    }

    /// Best-effort save of unsaved edits before the session goes away.
    pub async fn flush(&self) {
        if !self.before_unload() {
            return;
        }
        warn!("Resume {} has unsaved changes; saving before close", self.resume_id);
        if let Err(e) = self.force_save().await {
            warn!("Final save of resume {} failed: {e}", self.resume_id);
        }
    }

    /// Flushes unsaved edits and stops the background tasks.
    pub async fn shutdown(self) {
        self.flush().await;
        self.tracker.shutdown().await;
        self.autosave.shutdown().await;
        info!("Editing session closed for resume {}", self.resume_id);
    }
}
