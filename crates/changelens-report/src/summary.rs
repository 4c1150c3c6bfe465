use std::fmt;

use changelens_tree::ChangeStatistics;

use crate::model::{HistoryReport, ReportItem};

const ELEMENT_WIDTH: usize = 32;

impl fmt::Display for HistoryReport {
    /// The plain-text summary: per revision, a table of top-level document
    /// elements with their counts, followed by the non-zero statistics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, item) in self.items.iter().enumerate() {
            if item.tree.is_none() {
                if self.summary.total == 0 {
                    if let Some(next) = self.items.get(idx + 1) {
                        writeln!(
                            f,
                            "No changes detected between {} and {}",
                            item.commit.id, next.commit.id
                        )?;
                    }
                }
                continue;
            }
            writeln!(
                f,
                "Date: {} | Commit: {}",
                item.commit.date.format("%m/%d/%y"),
                item.commit.message
            )?;
            let elements = item.elements();
            if !elements.is_empty() {
                writeln!(
                    f,
                    "{:<ELEMENT_WIDTH$} {:>13} {:>16}",
                    "Document Element", "Total Changes", "Breaking Changes"
                )?;
                writeln!(f, "{}", "-".repeat(ELEMENT_WIDTH + 31))?;
                for el in &elements {
                    writeln!(
                        f,
                        "{:<ELEMENT_WIDTH$} {:>13} {:>16}",
                        el.element, el.total, el.breaking
                    )?;
                }
            }
            write_counts(f, item, false)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl HistoryReport {
    /// The summary as Markdown tables.
    ///
    /// # Examples
    ///
    /// ```
    /// use changelens_report::{HistoryReport, ReportOptions};
    ///
    /// let report = HistoryReport::build("repo", "api.json", &[], &ReportOptions::default());
    /// assert!(report.to_summary_markdown().is_empty());
    /// ```
    pub fn to_summary_markdown(&self) -> String {
        let mut out = String::new();
        for item in self.items.iter().filter(|i| i.tree.is_some()) {
            out.push_str(&format!(
                "Date: {} | Commit: {}\n\n",
                item.commit.date.format("%m/%d/%y"),
                item.commit.message
            ));
            out.push_str("| Document Element | Total Changes | Breaking Changes |\n");
            out.push_str("|------------------|---------------|------------------|\n");
            for el in item.elements() {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    el.element, el.total, el.breaking
                ));
            }
            out.push('\n');
            let mut counts = String::new();
            let _ = write_counts(&mut counts, item, true);
            out.push_str(&counts);
            out.push('\n');
        }
        out
    }
}

fn write_counts(out: &mut impl fmt::Write, item: &ReportItem, markdown: bool) -> fmt::Result {
    let s: &ChangeStatistics = &item.statistics;
    if s.total_breaking == 0 {
        if markdown {
            writeln!(out, "**Total Changes**: _{}_", s.total)?;
        } else {
            writeln!(out, "Total Changes: {}", s.total)?;
        }
    } else if markdown {
        writeln!(out, "- \u{274c} **BREAKING Changes**: _{}_ of _{}_", s.total_breaking, s.total)?;
    } else {
        writeln!(out, "\u{274c}  {} Breaking changes out of {}", s.total_breaking, s.total)?;
    }

    for (label, value) in [
        ("Modifications", s.modified),
        ("Removals", s.removed),
        ("Additions", s.added),
        ("Breaking Removals", s.breaking_removed),
        ("Breaking Modifications", s.breaking_modified),
        ("Breaking Additions", s.breaking_added),
    ] {
        if value == 0 {
            continue;
        }
        if markdown {
            writeln!(out, "- **{label}**: _{value}_")?;
        } else {
            writeln!(out, "{label}: {value}")?;
        }
    }
    Ok(())
}
