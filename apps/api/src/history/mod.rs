//! Undo/redo history: a bounded snapshot ledger and its debounced tracker.

pub mod ledger;
pub mod tracker;

pub use ledger::{HistoryLedger, HistorySummary, MutationOrigin};
pub use tracker::HistoryTracker;
