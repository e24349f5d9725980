use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Document;

pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// One immutable snapshot in the undo/redo window.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub document: Document,
    pub description: String,
    pub action: String,
}

/// Who produced a document mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOrigin {
    /// An edit made by the user.
    User,
    /// The working document being reset to a ledger entry by undo/redo.
    HistoryRestore,
}

/// Whether the ledger is waiting for the echo of an undo/redo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordGate {
    Open,
    SuppressEcho,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Suppressed,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub total_entries: usize,
    pub current_index: Option<usize>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub last_action: String,
    pub max_entries: usize,
    pub gate: RecordGate,
}

/// Bounded undo/redo window with a movable cursor.
///
/// Invariants: `cursor` is `Some(i)` with `i < entries.len()` whenever the
/// ledger is non-empty, `None` otherwise. New records drop everything after
/// the cursor and evict from the front once `max_entries` is reached.
#[derive(Debug)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
    cursor: Option<usize>,
    max_entries: usize,
    gate: RecordGate,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl HistoryLedger {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            max_entries: max_entries.max(1),
            gate: RecordGate::Open,
        }
    }

    /// Appends a user edit. Never suppressed.
    pub fn record(&mut self, document: &Document, description: &str, action: &str) {
        self.gate = RecordGate::Open;
        self.push(document, description, action);
    }

    /// Feeds a mutation observed on the working document into the ledger.
    /// The echo of an undo/redo (`HistoryRestore`) is dropped instead of being
    /// re-recorded as a new edit.
    pub fn record_mutation(
        &mut self,
        document: &Document,
        description: &str,
        action: &str,
        origin: MutationOrigin,
    ) -> RecordOutcome {
        match origin {
            MutationOrigin::User => {
                self.record(document, description, action);
                RecordOutcome::Recorded
            }
            MutationOrigin::HistoryRestore => {
                self.gate = RecordGate::Open;
                RecordOutcome::Suppressed
            }
        }
    }

    fn push(&mut self, document: &Document, description: &str, action: &str) {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
        }
        while self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            document: document.clone(),
            description: description.to_string(),
            action: action.to_string(),
        });
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Records the initial snapshot if nothing has been recorded yet.
    pub fn initialize(&mut self, document: &Document) {
        if self.is_empty() {
            self.record(document, "Initial state", "init");
        }
    }

    pub fn undo(&mut self) -> Option<Document> {
        let cursor = self.cursor.filter(|&c| c > 0)? - 1;
        self.move_to(cursor)
    }

    pub fn redo(&mut self) -> Option<Document> {
        let cursor = self.cursor.filter(|&c| c + 1 < self.entries.len())? + 1;
        self.move_to(cursor)
    }

    fn move_to(&mut self, cursor: usize) -> Option<Document> {
        let document = self.entries.get(cursor)?.document.clone();
        self.cursor = Some(cursor);
        self.gate = RecordGate::SuppressEcho;
        Some(document)
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.gate = RecordGate::Open;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor?)
    }

    pub fn undo_description(&self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.entries
            .get(self.cursor? - 1)
            .map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        if !self.can_redo() {
            return None;
        }
        self.entries
            .get(self.cursor? + 1)
            .map(|e| e.description.as_str())
    }

    pub fn summary(&self) -> HistorySummary {
        HistorySummary {
            total_entries: self.len(),
            current_index: self.cursor(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            last_action: self
                .current_entry()
                .map(|e| e.description.clone())
                .unwrap_or_else(|| "No actions yet".to_string()),
            max_entries: self.max_entries,
            gate: self.gate,
        }
    }
}
