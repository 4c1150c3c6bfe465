//! Change statistics for a diff and for a revision.

use changelens_core::{Change, ChangeKind, DiffResult, Revision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

/// Metadata about the commit a set of statistics belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitStatistics {
    pub id: String,
    pub message: String,
    pub author: String,
    pub author_email: String,
    pub date: DateTime<Utc>,
    /// Size of the tracked file at this revision, in bytes.
    pub size: usize,
}

impl CommitStatistics {
    pub fn of(revision: &Revision) -> Self {
        Self {
            id: revision.id.clone(),
            message: revision.message.clone(),
            author: revision.author.clone(),
            author_email: revision.author_email.clone(),
            date: revision.timestamp,
            size: revision.content.len(),
        }
    }
}

/// Counts of changes by direction, with breaking-qualified counterparts.
///
/// # Examples
///
/// ```
/// use changelens_core::{Change, ChangeKind};
/// use changelens_tree::ChangeStatistics;
///
/// let mut stats = ChangeStatistics::default();
/// stats.record(&Change::new("email", ChangeKind::PropertyRemoved).breaking());
/// stats.record(&Change::new("title", ChangeKind::Modified));
/// assert_eq!(stats.total, 2);
/// assert_eq!(stats.total_breaking, 1);
/// assert_eq!(stats.breaking_removed, 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatistics {
    pub total: usize,
    pub total_breaking: usize,
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub breaking_added: usize,
    pub breaking_modified: usize,
    pub breaking_removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitStatistics>,
}

impl ChangeStatistics {
    /// Count one leaf change.
    pub fn record(&mut self, change: &Change) {
        self.total += 1;
        if change.breaking {
            self.total_breaking += 1;
        }
        match change.kind {
            ChangeKind::Modified => {
                self.modified += 1;
                if change.breaking {
                    self.breaking_modified += 1;
                }
            }
            ChangeKind::PropertyAdded | ChangeKind::ObjectAdded => {
                self.added += 1;
                if change.breaking {
                    self.breaking_added += 1;
                }
            }
            ChangeKind::PropertyRemoved | ChangeKind::ObjectRemoved => {
                self.removed += 1;
                if change.breaking {
                    self.breaking_removed += 1;
                }
            }
        }
    }

    /// Add another set of counts to this one. Commit metadata is kept.
    pub fn merge(&mut self, other: &ChangeStatistics) {
        self.total += other.total;
        self.total_breaking += other.total_breaking;
        self.added += other.added;
        self.modified += other.modified;
        self.removed += other.removed;
        self.breaking_added += other.breaking_added;
        self.breaking_modified += other.breaking_modified;
        self.breaking_removed += other.breaking_removed;
    }

    /// Count every leaf change that [`normalize`] keeps in `diff`.
    pub fn from_diff(diff: &DiffResult) -> Self {
        normalize(diff).statistics
    }
}

/// Statistics for one revision, with its commit metadata attached.
///
/// A revision without a diff has zero counts.
pub fn aggregate(revision: &Revision) -> ChangeStatistics {
    let mut stats = revision
        .diff
        .as_ref()
        .map(ChangeStatistics::from_diff)
        .unwrap_or_default();
    stats.commit = Some(CommitStatistics::of(revision));
    stats
}
