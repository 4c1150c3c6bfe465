use std::fmt::Write;

use changelens_core::ChangelensError;
use changelens_tree::TreeNode;

use crate::model::{HistoryReport, ReportItem};

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;margin:2rem;color:#1d1d1f;background:#fafafa}
h1{margin-bottom:.2rem}
table{border-collapse:collapse;margin:1rem 0}
td,th{border:1px solid #ccc;padding:.3rem .8rem;text-align:left}
section.commit{border-top:1px solid #ddd;padding-top:1rem;margin-top:1.5rem}
ul.tree{list-style:none;padding-left:1.2rem;border-left:1px dotted #aaa}
.count{color:#666;font-size:.9em}
.breaking{color:#c0392b;font-weight:600}
pre.diff{background:#f0f0f0;padding:.8rem;overflow-x:auto}
";

/// Escape text for use in HTML element content and attribute values.
///
/// ```
/// use changelens_report::escape_html;
///
/// assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl HistoryReport {
    /// Render the report as a single self-contained HTML page.
    ///
    /// The full JSON report is embedded in a `<script type="application/json">`
    /// element so the page can be post-processed without re-running the
    /// history.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelensError::Serialization`] if the embedded payload
    /// cannot be encoded.
    pub fn to_html(&self) -> Result<String, ChangelensError> {
        // `</` would close the script element early
        let payload = serde_json::to_string(self)?.replace("</", "<\\/");

        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(out, "<title>{}</title>", escape_html(&self.title));
        let _ = writeln!(out, "<style>\n{STYLE}</style>\n</head>\n<body>");
        let _ = writeln!(out, "<h1>{}</h1>", escape_html(&self.title));
        let _ = writeln!(
            out,
            "<p><code>{}</code> in {}</p>",
            escape_html(&self.file_path),
            escape_html(&self.source)
        );
        if let Some(date) = &self.date_generated {
            let _ = writeln!(out, "<p class=\"count\">Generated at {}</p>", escape_html(date));
        }

        let s = &self.summary;
        out.push_str("<h2>Summary</h2>\n<table>\n");
        out.push_str("<tr><th>Total</th><th>Breaking</th><th>Added</th><th>Modified</th><th>Removed</th></tr>\n");
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n</table>",
            s.total, s.total_breaking, s.added, s.modified, s.removed
        );

        for item in &self.items {
            write_item(&mut out, item);
        }

        let _ = writeln!(
            out,
            "<script type=\"application/json\" id=\"changelens-data\">{payload}</script>"
        );
        out.push_str("</body>\n</html>\n");
        Ok(out)
    }
}

fn write_item(out: &mut String, item: &ReportItem) {
    let commit = &item.commit;
    let _ = writeln!(out, "<section class=\"commit\" id=\"commit-{}\">", escape_html(&commit.id));
    let _ = writeln!(out, "<h3>{}</h3>", escape_html(&commit.message));
    let _ = writeln!(
        out,
        "<p><code>{}</code> by {} &lt;{}&gt; on {}</p>",
        escape_html(&commit.id),
        escape_html(&commit.author),
        escape_html(&commit.author_email),
        escape_html(&item.date)
    );
    let class = if item.statistics.total_breaking > 0 {
        "breaking"
    } else {
        "count"
    };
    let _ = writeln!(out, "<p class=\"{class}\">{}</p>", escape_html(&item.summary_line()));

    if let Some(tree) = item.tree.as_ref().filter(|t| !t.children.is_empty()) {
        out.push_str("<ul class=\"tree\">\n");
        write_node(out, tree);
        out.push_str("</ul>\n");
    }

    if let Some(diff) = &item.visual_diff {
        let _ = writeln!(
            out,
            "<details><summary>Text diff</summary><pre class=\"diff\">{}</pre></details>",
            escape_html(diff)
        );
    }
    out.push_str("</section>\n");
}

fn write_node(out: &mut String, node: &TreeNode) {
    let title = escape_html(&node.title);
    if node.is_leaf {
        let class = if node.breaking_changes > 0 { " class=\"breaking\"" } else { "" };
        let _ = writeln!(out, "<li{class}>{title}</li>");
        return;
    }
    let breaking = if node.breaking_changes > 0 {
        format!(", <span class=\"breaking\">{} breaking</span>", node.breaking_changes)
    } else {
        String::new()
    };
    let _ = writeln!(
        out,
        "<li><details open><summary>{title} <span class=\"count\">({}{breaking})</span></summary>",
        node.total_changes
    );
    out.push_str("<ul class=\"tree\">\n");
    for child in &node.children {
        write_node(out, child);
    }
    out.push_str("</ul></details></li>\n");
}
