use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{EditingSession, SessionConfig};
use crate::models::{Document, Resume};
use crate::persistence::{ResumeStore, SaveError};

/// Open editing sessions, keyed by resume id.
pub struct SessionRegistry {
    store: Arc<dyn ResumeStore>,
    config: SessionConfig,
    sessions: RwLock<HashMap<Uuid, Arc<EditingSession>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn ResumeStore>, config: SessionConfig) -> Self {
        Self {
            store,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the open session for `resume_id`, starting one if needed.
    ///
    /// A new session starts from `initial` when given, otherwise from the
    /// stored resume, otherwise from an empty resume.
    pub async fn open(
        &self,
        resume_id: Uuid,
        initial: Option<Document>,
    ) -> Result<Arc<EditingSession>, SaveError> {
        if let Some(existing) = self.get(resume_id).await {
            return Ok(existing);
        }

        let document = match initial {
            Some(document) => document,
            None => match self.store.load(resume_id).await? {
                Some(stored) => stored,
                None => {
                    info!("Resume {resume_id} not found in resume API, starting empty");
                    Resume::empty().into_document()
                }
            },
        };

        let mut sessions = self.sessions.write().await;
        // Another request may have opened it while we were loading.
        if let Some(existing) = sessions.get(&resume_id) {
            return Ok(existing.clone());
        }
        let session = Arc::new(EditingSession::start(
            resume_id,
            document,
            self.store.clone(),
            &self.config,
        ));
        sessions.insert(resume_id, session.clone());
        Ok(session)
    }

    pub async fn get(&self, resume_id: Uuid) -> Option<Arc<EditingSession>> {
        self.sessions.read().await.get(&resume_id).cloned()
    }

    /// Removes the session. Returns false if it was not open.
    pub async fn close(&self, resume_id: Uuid) -> bool {
        let Some(session) = self.sessions.write().await.remove(&resume_id) else {
            return false;
        };
        match Arc::try_unwrap(session) {
            Ok(session) => session.shutdown().await,
            // Still referenced by an in-flight request; its tasks stop when
            // the last reference drops.
            Err(shared) => shared.flush().await,
        }
        true
    }

    /// Sessions holding edits that have not reached the resume API.
    pub async fn dirty_sessions(&self) -> Vec<Arc<EditingSession>> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.before_unload())
            .cloned()
            .collect()
    }

    /// Closes every session, saving unsaved edits first.
    pub async fn close_all(&self) {
        let ids: Vec<Uuid> = self.sessions.read().await.keys().copied().collect();
        for id in ids {
            self.close(id).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
