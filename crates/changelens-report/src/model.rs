//! The report model shared by every output format.

use changelens_core::{Change, ChangeKind, ChangelensError, ReportConfig, Revision};
use changelens_tree::{normalize, ChangeGraph, ChangeStatistics, CommitStatistics, TreeNode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::diff::unified_diff;

const COMMIT_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S UTC";
const GENERATED_DATE_FORMAT: &str = "%a, %-d %b %Y %H:%M:%S UTC";

/// Options controlling report generation.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub title: String,
    /// Omit the generation date so output is reproducible.
    pub disable_timestamp: bool,
    pub generated: DateTime<Utc>,
    /// Attach a unified text diff of the document to each item.
    pub include_diff: bool,
}

impl ReportOptions {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            title: config.title.clone(),
            disable_timestamp: config.disable_timestamp,
            generated: Utc::now(),
            include_diff: true,
        }
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}

/// A change with a stable content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashedChange {
    #[serde(flatten)]
    pub change: Change,
    pub hash: String,
}

impl HashedChange {
    pub fn new(change: Change) -> Self {
        let hash = change_hash(&change);
        Self { change, hash }
    }
}

/// SHA-256 of a change's kind, property and values, as lowercase hex.
///
/// Locations and the breaking flag are not part of the hash, so the same
/// edit reported at a different line hashes identically.
///
/// # Examples
///
/// ```
/// use changelens_core::{Change, ChangeKind};
/// use changelens_report::change_hash;
///
/// let a = Change::new("title", ChangeKind::Modified).with_values(Some("a"), Some("b"));
/// let b = a.clone().breaking();
/// assert_eq!(change_hash(&a), change_hash(&b));
/// assert_eq!(change_hash(&a).len(), 64);
/// ```
pub fn change_hash(change: &Change) -> String {
    let mut hasher = Sha256::new();
    hasher.update([change.kind.code()]);
    for part in [
        change.property.as_str(),
        change.original.as_deref().unwrap_or(""),
        change.new.as_deref().unwrap_or(""),
    ] {
        hasher.update(b"\0");
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// One revision in a report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    pub commit: CommitStatistics,
    /// Formatted commit date.
    pub date: String,
    pub statistics: ChangeStatistics,
    /// Absent for a revision that was not compared with anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<TreeNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<ChangeGraph>,
    pub changes: Vec<HashedChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_diff: Option<String>,
}

impl ReportItem {
    fn build(revision: &Revision, include_diff: bool) -> Self {
        let commit = CommitStatistics::of(revision);

        let (statistics, tree, graph, changes) = match &revision.diff {
            Some(diff) => {
                let normalized = normalize(diff);
                let changes = normalized
                    .tree
                    .leaves()
                    .into_iter()
                    .filter_map(|leaf| leaf.change.clone())
                    .map(HashedChange::new)
                    .collect();
                (
                    normalized.statistics,
                    Some(normalized.tree),
                    Some(normalized.graph),
                    changes,
                )
            }
            None => (ChangeStatistics::default(), None, None, Vec::new()),
        };

        let visual_diff = match (&revision.previous_content, include_diff) {
            (Some(previous), true) => unified_diff(previous, &revision.content),
            _ => None,
        };

        Self {
            date: commit.date.format(COMMIT_DATE_FORMAT).to_string(),
            commit,
            statistics,
            tree,
            graph,
            changes,
            visual_diff,
        }
    }

    /// One-line description of the item's counts.
    pub fn summary_line(&self) -> String {
        let stats = &self.statistics;
        match (stats.total, stats.total_breaking) {
            (0, _) => "No changes detected".to_string(),
            (total, 0) => format!("{total} total changes"),
            (total, breaking) => format!("{total} total changes ({breaking} breaking)"),
        }
    }

    /// Changes of one kind, sorted by property name.
    pub fn changes_of(&self, kind: ChangeKind) -> Vec<&Change> {
        let mut changes: Vec<&Change> = self
            .changes
            .iter()
            .map(|c| &c.change)
            .filter(|c| c.kind == kind)
            .collect();
        changes.sort_by(|a, b| a.property.cmp(&b.property));
        changes
    }

    /// Top-level document elements with their change counts.
    pub fn elements(&self) -> Vec<ElementSummary> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };
        tree.children
            .iter()
            .map(|child| ElementSummary {
                element: child.title.clone(),
                total: child.total_changes,
                breaking: child.breaking_changes,
            })
            .collect()
    }
}

/// Change counts for one top-level document element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSummary {
    pub element: String,
    pub total: usize,
    pub breaking: usize,
}

/// A report over the history of one file, newest revision first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReport {
    pub title: String,
    pub source: String,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_generated: Option<String>,
    pub summary: ChangeStatistics,
    pub items: Vec<ReportItem>,
}

impl HistoryReport {
    /// Build a report from pipeline output.
    ///
    /// Every revision becomes an item; revisions without a diff have zero
    /// counts and no tree. The summary merges every item's statistics.
    ///
    /// # Examples
    ///
    /// ```
    /// use changelens_report::{HistoryReport, ReportOptions};
    ///
    /// let report = HistoryReport::build("repo", "openapi.json", &[], &ReportOptions::default());
    /// assert!(report.items.is_empty());
    /// assert_eq!(report.summary.total, 0);
    /// ```
    pub fn build(
        source: impl Into<String>,
        file_path: impl Into<String>,
        revisions: &[Revision],
        options: &ReportOptions,
    ) -> Self {
        let items: Vec<ReportItem> = revisions
            .iter()
            .map(|rev| ReportItem::build(rev, options.include_diff))
            .collect();

        let mut summary = ChangeStatistics::default();
        for item in &items {
            summary.merge(&item.statistics);
        }
        tracing::debug!(
            items = items.len(),
            total = summary.total,
            breaking = summary.total_breaking,
            "built history report"
        );

        Self {
            title: options.title.clone(),
            source: source.into(),
            file_path: file_path.into(),
            date_generated: (!options.disable_timestamp)
                .then(|| options.generated.format(GENERATED_DATE_FORMAT).to_string()),
            summary,
            items,
        }
    }

    /// True when any revision carries a breaking change.
    pub fn has_breaking(&self) -> bool {
        self.summary.total_breaking > 0
    }

    /// The full report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelensError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, ChangelensError> {
        serde_json::to_string_pretty(self).map_err(ChangelensError::from)
    }

    /// A flattened report: per revision, commit details, statistics and a
    /// list of hashed changes, without the tree and graph.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelensError::Serialization`] if encoding fails.
    pub fn to_flat_json(&self) -> Result<String, ChangelensError> {
        let flat = FlatReport {
            title: &self.title,
            source: &self.source,
            file_path: &self.file_path,
            date_generated: self.date_generated.as_deref(),
            summary: &self.summary,
            reports: self
                .items
                .iter()
                .map(|item| FlatItem {
                    commit: &item.commit,
                    statistics: &item.statistics,
                    changes: &item.changes,
                })
                .collect(),
        };
        serde_json::to_string_pretty(&flat).map_err(ChangelensError::from)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FlatReport<'a> {
    title: &'a str,
    source: &'a str,
    file_path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_generated: Option<&'a str>,
    summary: &'a ChangeStatistics,
    reports: Vec<FlatItem<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FlatItem<'a> {
    commit: &'a CommitStatistics,
    statistics: &'a ChangeStatistics,
    changes: &'a [HashedChange],
}
