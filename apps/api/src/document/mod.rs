//! Document snapshot store and change detection.
//!
//! The store is constructed explicitly by the session that owns it; observers
//! (the auto-save scheduler) subscribe to a `watch` channel and always see the
//! latest snapshot, never a backlog.

use tokio::sync::watch;

use crate::models::Document;

/// Holds the current working document for one editing session.
#[derive(Debug)]
pub struct DocumentStore {
    tx: watch::Sender<Document>,
}

impl DocumentStore {
    pub fn new(initial: Document) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Deep copy of the current snapshot.
    pub fn current(&self) -> Document {
        self.tx.borrow().clone()
    }

    /// Replaces the snapshot and wakes every subscriber.
    pub fn replace(&self, document: Document) {
        self.tx.send_replace(document);
    }

    pub fn subscribe(&self) -> watch::Receiver<Document> {
        self.tx.subscribe()
    }
}

/// Full serialization of a document, used for change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(document: &Document) -> Self {
        // Value -> String cannot fail: keys are always strings.
        Fingerprint(serde_json::to_string(document).unwrap_or_default())
    }
}

/// Remembers the last observed snapshot and reports structural changes.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<Fingerprint>,
}

impl ChangeDetector {
    /// Detector that treats `document` as already seen.
    pub fn seeded(document: &Document) -> Self {
        Self {
            last: Some(Fingerprint::of(document)),
        }
    }

    /// Records `document` as observed and returns whether it changed.
    pub fn observe(&mut self, document: &Document) -> bool {
        let fingerprint = Fingerprint::of(document);
        if self.last.as_ref() == Some(&fingerprint) {
            return false;
        }
        self.last = Some(fingerprint);
        true
    }
}
