use std::collections::BTreeMap;
use std::fmt::Write;

use changelens_core::{Change, ChangeKind, Direction};
use changelens_tree::ChangeStatistics;

use crate::model::{HistoryReport, ReportItem};

/// Order in which change groups appear under each commit.
const KIND_ORDER: [ChangeKind; 5] = [
    ChangeKind::PropertyAdded,
    ChangeKind::ObjectAdded,
    ChangeKind::Modified,
    ChangeKind::ObjectRemoved,
    ChangeKind::PropertyRemoved,
];

impl HistoryReport {
    /// Render the report as a Markdown document.
    ///
    /// # Examples
    ///
    /// ```
    /// use changelens_report::{HistoryReport, ReportOptions};
    ///
    /// let options = ReportOptions { disable_timestamp: true, ..ReportOptions::default() };
    /// let md = HistoryReport::build("repo", "api.yaml", &[], &options).to_markdown();
    /// assert!(md.starts_with("# API Changes Report\n"));
    /// assert!(!md.contains("Generated at"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        if let Some(date) = &self.date_generated {
            let _ = writeln!(out, "**Generated at:** {date}\n");
        }
        let _ = writeln!(out, "**File:** `{}` ({})\n", self.file_path, self.source);

        out.push_str("## General Summary\n\n");
        write_statistics(&mut out, &self.summary, "Total changes", "Breaking changes");

        out.push_str("## Details by Commit\n\n");
        for (idx, item) in self.items.iter().enumerate() {
            write_item(&mut out, idx + 1, item);
        }
        out
    }
}

fn write_statistics(out: &mut String, stats: &ChangeStatistics, total: &str, breaking: &str) {
    let _ = writeln!(out, "- **{total}:** {}", stats.total);
    let _ = writeln!(out, "- **{breaking}:** {}", stats.total_breaking);
    let _ = writeln!(out, "- **Additions:** {}", stats.added);
    let _ = writeln!(out, "- **Modifications:** {}", stats.modified);
    let _ = writeln!(out, "- **Removals:** {}\n", stats.removed);
}

fn write_item(out: &mut String, number: usize, item: &ReportItem) {
    let commit = &item.commit;
    let _ = writeln!(out, "### Commit {number}: {}\n", commit.message);
    out.push_str("**Commit Information:**\n");
    let _ = writeln!(out, "- **Hash:** `{}`", commit.id);
    let _ = writeln!(out, "- **Author:** {} ({})", commit.author, commit.author_email);
    let _ = writeln!(out, "- **Date:** {}\n", item.date);

    out.push_str("**Statistics:**\n");
    write_statistics(out, &item.statistics, "Total", "Breaking");

    if let Some(diff) = &item.visual_diff {
        out.push_str("**Visual Diff:**\n\n");
        out.push_str("<details>\n<summary>Click to expand diff</summary>\n\n");
        out.push_str("```diff\n");
        out.push_str(&diff.replace("```", "` ` `"));
        if !diff.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n</details>\n\n");
    }

    if item.changes.is_empty() {
        out.push_str("**No changes detected in this commit.**\n\n");
    } else {
        let _ = writeln!(out, "**Detailed Changes:** {}\n", item.summary_line());
        for kind in KIND_ORDER {
            let changes = item.changes_of(kind);
            if changes.is_empty() {
                continue;
            }
            let _ = writeln!(out, "#### {kind}\n");
            write_group(out, &changes);
        }
    }
    out.push_str("---\n\n");
}

/// Write one kind's changes, consolidating repeats of the same property.
fn write_group(out: &mut String, changes: &[&Change]) {
    let mut by_property: BTreeMap<&str, Vec<&Change>> = BTreeMap::new();
    for &change in changes {
        by_property.entry(change.property.as_str()).or_default().push(change);
    }

    for (property, group) in by_property {
        let description = description(group[0].kind);
        let breaking = if group.iter().any(|c| c.breaking) {
            " **(breaking)**"
        } else {
            ""
        };

        if let [change] = group.as_slice() {
            let _ = writeln!(out, "- **{property}** {description}{breaking}");
            match (non_empty(&change.original), non_empty(&change.new)) {
                (Some(before), Some(after)) => {
                    let _ = writeln!(out, "  - **Before:** `{before}`");
                    let _ = writeln!(out, "  - **After:** `{after}`");
                }
                (Some(before), None) => {
                    let _ = writeln!(out, "  - **Removed value:** `{before}`");
                }
                (None, Some(after)) => {
                    let _ = writeln!(out, "  - **Added value:** `{after}`");
                }
                (None, None) => {}
            }
            out.push('\n');
            continue;
        }

        let _ = writeln!(
            out,
            "- **{property}** {description}{breaking} ({} items)",
            group.len()
        );
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut modified = Vec::new();
        for change in &group {
            match (non_empty(&change.original), non_empty(&change.new)) {
                (Some(before), Some(after)) => modified.push(format!("`{before}` \u{2192} `{after}`")),
                (Some(before), None) => removed.push(format!("`{before}`")),
                (None, Some(after)) => added.push(format!("`{after}`")),
                (None, None) => {}
            }
        }
        for (heading, values) in [
            ("Added values", added),
            ("Removed values", removed),
            ("Modified values", modified),
        ] {
            if values.is_empty() {
                continue;
            }
            let _ = writeln!(out, "  - **{heading}:**");
            for value in values {
                let _ = writeln!(out, "    - {value}");
            }
        }
        out.push('\n');
    }
}

fn description(kind: ChangeKind) -> &'static str {
    match kind.direction() {
        Direction::Added => "was added",
        Direction::Removed => "was removed",
        Direction::Modified => "was modified",
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
