//! Report generation for a file's change history.
//!
//! [`HistoryReport`] is built once from pipeline output and rendered to
//! JSON, a flattened JSON with hashed changes, Markdown, HTML or a plain
//! text summary.

mod diff;
mod html;
mod markdown;
mod model;
mod summary;

pub use diff::unified_diff;
pub use html::escape_html;
pub use model::{change_hash, ElementSummary, HashedChange, HistoryReport, ReportItem, ReportOptions};
