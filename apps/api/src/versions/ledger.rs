use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::diff::{calculate_diff_stats, diff_sections, DiffStats, SectionDiff};
use crate::models::Document;

pub const DEFAULT_MAX_VERSIONS: usize = 50;
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(300);
const MAIN_BRANCH: &str = "main";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("Version {0} not found")]
    NotFound(Uuid),
}

/// A named, immutable snapshot of a resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub version_number: u64,
    pub name: String,
    pub description: String,
    pub document: Document,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub created_by_name: String,
    pub is_published: bool,
    pub is_current: bool,
    pub parent_version_id: Option<Uuid>,
    pub branch_name: String,
    pub tags: Vec<String>,
    pub change_summary: String,
    pub diff_stats: DiffStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionDiff {
    pub version_a: Version,
    pub version_b: Version,
    pub changes: Vec<SectionDiff>,
    pub summary: DiffStats,
}

#[derive(Debug, Clone)]
pub struct Author {
    pub id: String,
    pub name: String,
}

impl Default for Author {
    fn default() -> Self {
        Self {
            id: "current-user".to_string(),
            name: "Current User".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionLedgerConfig {
    pub max_versions: usize,
    pub auto_save: bool,
    pub save_interval: Duration,
}

impl Default for VersionLedgerConfig {
    fn default() -> Self {
        Self {
            max_versions: DEFAULT_MAX_VERSIONS,
            auto_save: true,
            save_interval: DEFAULT_SAVE_INTERVAL,
        }
    }
}

/// Append-only list of named versions for one resume.
///
/// `is_current` is exclusive across the whole ledger. `is_published` is not:
/// publishing one version leaves every other version's flag untouched.
#[derive(Debug)]
pub struct VersionLedger {
    resume_id: Uuid,
    author: Author,
    config: VersionLedgerConfig,
    versions: Vec<Version>,
    last_version_number: u64,
    last_created_at: Option<DateTime<Utc>>,
}

impl VersionLedger {
    pub fn new(resume_id: Uuid, author: Author, mut config: VersionLedgerConfig) -> Self {
        config.max_versions = config.max_versions.max(1);
        Self {
            resume_id,
            author,
            config,
            versions: Vec::new(),
            last_version_number: 0,
            last_created_at: None,
        }
    }

    pub fn create_version(
        &mut self,
        document: &Document,
        name: &str,
        description: &str,
        parent_version_id: Option<Uuid>,
        branch_name: Option<&str>,
    ) -> Version {
        self.create_version_at(
            document,
            name,
            description,
            parent_version_id,
            branch_name,
            Utc::now(),
        )
    }

    fn create_version_at(
        &mut self,
        document: &Document,
        name: &str,
        description: &str,
        parent_version_id: Option<Uuid>,
        branch_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Version {
        let parent = parent_version_id.and_then(|id| self.get(id));
        let diff_stats = parent
            .map(|p| calculate_diff_stats(&p.document, document))
            .unwrap_or_default();
        let branch_name = match (branch_name, parent) {
            (Some(name), _) => name.to_string(),
            (None, Some(p)) => format!("{}_branch", p.branch_name),
            (None, None) => MAIN_BRANCH.to_string(),
        };

        self.last_version_number += 1;
        let version = Version {
            id: Uuid::new_v4(),
            resume_id: self.resume_id,
            version_number: self.last_version_number,
            name: name.to_string(),
            description: description.to_string(),
            document: document.clone(),
            created_at: now,
            created_by: self.author.id.clone(),
            created_by_name: self.author.name.clone(),
            is_published: false,
            is_current: true,
            parent_version_id,
            branch_name,
            tags: Vec::new(),
            change_summary: description.to_string(),
            diff_stats,
        };

        for existing in &mut self.versions {
            existing.is_current = false;
        }
        self.versions.push(version.clone());
        if self.versions.len() > self.config.max_versions {
            let excess = self.versions.len() - self.config.max_versions;
            self.versions.drain(..excess);
        }
        self.last_created_at = Some(now);

        info!(
            "Created version {} '{}' for resume {} on branch {}",
            version.version_number, version.name, self.resume_id, version.branch_name
        );
        version
    }

    /// Diffs two versions. `None` when either id is unknown.
    pub fn compare_versions(&self, version_a_id: Uuid, version_b_id: Uuid) -> Option<VersionDiff> {
        let version_a = self.get(version_a_id)?;
        let version_b = self.get(version_b_id)?;
        Some(VersionDiff {
            changes: diff_sections(&version_a.document, &version_b.document),
            summary: calculate_diff_stats(&version_a.document, &version_b.document),
            version_a: version_a.clone(),
            version_b: version_b.clone(),
        })
    }

    /// Appends a copy of the target version as the new current version.
    pub fn restore_version(&mut self, version_id: Uuid) -> Result<Version, VersionError> {
        let target = self
            .get(version_id)
            .cloned()
            .ok_or(VersionError::NotFound(version_id))?;
        Ok(self.create_version(
            &target.document,
            &format!("Restored: {}", target.name),
            &format!("Restored from version {}", target.version_number),
            Some(version_id),
            None,
        ))
    }

    pub fn create_branch(
        &mut self,
        version_id: Uuid,
        branch_name: &str,
        initial_document: Option<&Document>,
    ) -> Result<Version, VersionError> {
        let source = self
            .get(version_id)
            .cloned()
            .ok_or(VersionError::NotFound(version_id))?;
        let document = initial_document.unwrap_or(&source.document);
        Ok(self.create_version(
            document,
            &format!("Branch: {branch_name}"),
            &format!("Created branch from version {}", source.version_number),
            Some(version_id),
            Some(branch_name),
        ))
    }

    pub fn publish_version(&mut self, version_id: Uuid) -> Result<&Version, VersionError> {
        let version = self
            .versions
            .iter_mut()
            .find(|v| v.id == version_id)
            .ok_or(VersionError::NotFound(version_id))?;
        version.is_published = true;
        info!("Published version {} of resume {}", version.version_number, version.resume_id);
        Ok(version)
    }

    /// Creates an automatic version when the save interval has elapsed since
    /// the last version was created.
    pub fn auto_save(&mut self, document: &Document, now: DateTime<Utc>) -> Option<Version> {
        if !self.config.auto_save {
            return None;
        }
        if let Some(last) = self.last_created_at {
            let elapsed = (now - last).to_std().unwrap_or_default();
            if elapsed < self.config.save_interval {
                return None;
            }
        }
        let parent = self.current_version().map(|v| v.id);
        Some(self.create_version_at(
            document,
            &format!("Auto-save {}", now.format("%H:%M:%S")),
            "Automatic save",
            parent,
            None,
            now,
        ))
    }

    pub fn get(&self, version_id: Uuid) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == version_id)
    }

    pub fn current_version(&self) -> Option<&Version> {
        self.versions.iter().find(|v| v.is_current)
    }

    pub fn versions_by_branch(&self, branch_name: &str) -> Vec<&Version> {
        self.versions
            .iter()
            .filter(|v| v.branch_name == branch_name)
            .collect()
    }

    /// Distinct branch names in order of first appearance.
    pub fn branches(&self) -> Vec<String> {
        let mut branches: Vec<String> = Vec::new();
        for v in &self.versions {
            if !branches.contains(&v.branch_name) {
                branches.push(v.branch_name.clone());
            }
        }
        branches
    }

    /// All versions, newest first.
    pub fn history(&self) -> Vec<&Version> {
        let mut versions: Vec<&Version> = self.versions.iter().collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        versions
    }
}
