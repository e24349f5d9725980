use chrono::{DateTime, Utc};
use serde::Serialize;

/// Observable auto-save status for one editing session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutoSaveState {
    pub is_saving: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub has_unsaved_changes: bool,
    pub save_error: Option<String>,
    pub save_progress: u8,
    pub last_save_attempt: Option<DateTime<Utc>>,
    pub save_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Saving,
    Error,
    Unsaved,
    Saved,
    Idle,
}

impl AutoSaveState {
    pub fn status(&self) -> SaveStatus {
        if self.is_saving {
            SaveStatus::Saving
        } else if self.save_error.is_some() {
            SaveStatus::Error
        } else if self.has_unsaved_changes {
            SaveStatus::Unsaved
        } else if self.last_saved.is_some() {
            SaveStatus::Saved
        } else {
            SaveStatus::Idle
        }
    }

    pub fn status_text(&self) -> String {
        match self.status() {
            SaveStatus::Saving => format!("Saving... {}%", self.save_progress),
            SaveStatus::Error => format!(
                "Save failed: {}",
                self.save_error.as_deref().unwrap_or_default()
            ),
            SaveStatus::Unsaved => "Unsaved changes".to_string(),
            SaveStatus::Saved => match self.last_saved {
                Some(at) => format!("Saved {}", at.format("%H:%M:%S")),
                None => "Saved".to_string(),
            },
            SaveStatus::Idle => "All changes saved".to_string(),
        }
    }
}
