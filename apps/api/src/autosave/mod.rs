//! Auto-save scheduler.
//!
//! One actor task per editing session. It watches the session's
//! `DocumentStore`, debounces structural changes, and pushes the latest
//! snapshot to the `ResumeStore`. A save in flight blocks the actor loop, so
//! at most one save per document is ever outstanding; edits made meanwhile
//! coalesce in the watch channel and re-arm the debounce once it settles.

mod scheduler;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::Document;
use crate::persistence::{ResumeStore, SaveError};
use scheduler::{Command, Scheduler};
pub use state::{AutoSaveState, SaveStatus};

#[derive(Debug, Clone)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    pub debounce: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: Duration::from_millis(2000),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Error)]
pub enum AutoSaveError {
    #[error(transparent)]
    Save(#[from] SaveError),

    #[error("Auto-save scheduler is not running")]
    Stopped,
}

/// Handle to a running auto-save scheduler.
pub struct AutoSaveHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<AutoSaveState>,
    task: JoinHandle<()>,
}

impl AutoSaveHandle {
    pub fn spawn(
        resume_id: Uuid,
        store: Arc<dyn ResumeStore>,
        documents: watch::Receiver<Document>,
        config: AutoSaveConfig,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(AutoSaveState::default());
        let scheduler = Scheduler::new(resume_id, store, documents, state_tx, config);
        let task = tokio::spawn(scheduler.run(command_rx));
        Self {
            commands,
            state,
            task,
        }
    }

    pub fn state(&self) -> AutoSaveState {
        self.state.borrow().clone()
    }

    /// Cancels a pending debounce and saves the latest snapshot now.
    pub async fn force_save(&self) -> Result<(), AutoSaveError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ForceSave(reply))
            .map_err(|_| AutoSaveError::Stopped)?;
        rx.await.map_err(|_| AutoSaveError::Stopped)??;
        Ok(())
    }

    pub fn clear_error(&self) {
        let _ = self.commands.send(Command::ClearError);
    }

    pub fn reset(&self) {
        let _ = self.commands.send(Command::Reset);
    }

    /// Whether leaving now would lose edits; callers use it to ask for
    /// confirmation or make a last best-effort save.
    pub fn before_unload(&self) -> bool {
        self.state.borrow().has_unsaved_changes
    }

    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            tracing::error!("Auto-save task failed: {e}");
        }
    }
}
