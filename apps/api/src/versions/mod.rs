//! Named, branchable resume versions and the structural diff between them.

pub mod diff;
pub mod ledger;

pub use ledger::{Author, Version, VersionDiff, VersionError, VersionLedger, VersionLedgerConfig};
