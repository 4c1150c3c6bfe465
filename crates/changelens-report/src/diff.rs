use std::path::Path;

use git2::{DiffOptions, Patch};

/// Unified text diff between two versions of a document, with three lines
/// of context. `None` when the versions are identical or cannot be diffed.
///
/// # Examples
///
/// ```
/// use changelens_report::unified_diff;
///
/// let text = unified_diff(b"a\nb\n", b"a\nc\n").unwrap();
/// assert!(text.contains("-b\n"));
/// assert!(text.contains("+c\n"));
/// assert!(unified_diff(b"same\n", b"same\n").is_none());
/// ```
pub fn unified_diff(original: &[u8], modified: &[u8]) -> Option<String> {
    if original == modified {
        return None;
    }
    let mut opts = DiffOptions::new();
    opts.context_lines(3).force_text(true);

    let mut patch = match Patch::from_buffers(
        original,
        Some(Path::new("Original")),
        modified,
        Some(Path::new("Modified")),
        Some(&mut opts),
    ) {
        Ok(patch) => patch,
        Err(e) => {
            tracing::debug!(error = %e, "could not build text diff");
            return None;
        }
    };
    let buf = patch.to_buf().ok()?;
    let text = String::from_utf8_lossy(&buf).into_owned();
    (!text.is_empty()).then_some(text)
}
