//! The revision source seam and an in-memory implementation.

use std::path::Path;

use changelens_core::{ChangelensError, RevisionDescriptor};
use chrono::{DateTime, Utc};

/// Where a revision source gets its content from.
///
/// Remote sources are fetched with bounded concurrency; local sources are
/// fetched and diffed one revision at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Local,
    Remote,
}

/// A producer of historical versions of one tracked file.
#[allow(async_fn_in_trait)]
pub trait RevisionSource {
    fn mode(&self) -> SourceMode;

    /// Short human-readable name, e.g. `owner/repo:openapi.json`.
    fn describe(&self) -> String;

    /// Every revision that touched the tracked file, newest first.
    async fn list(&self) -> Result<Vec<RevisionDescriptor>, ChangelensError>;

    /// Bytes of the tracked file at revision `id`.
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, ChangelensError>;
}

/// Revisions held in memory.
///
/// Used to compare two files directly, and anywhere the history is
/// already known.
///
/// # Examples
///
/// ```
/// use changelens_history::source::{RevisionSource, SourceMode, StaticSource};
///
/// let source = StaticSource::new("inline", Vec::new());
/// assert_eq!(source.mode(), SourceMode::Local);
/// assert_eq!(source.describe(), "inline");
/// ```
#[derive(Debug, Clone)]
pub struct StaticSource {
    label: String,
    mode: SourceMode,
    revisions: Vec<(RevisionDescriptor, Vec<u8>)>,
}

impl StaticSource {
    /// `revisions` must be ordered newest first.
    pub fn new(label: impl Into<String>, revisions: Vec<(RevisionDescriptor, Vec<u8>)>) -> Self {
        Self {
            label: label.into(),
            mode: SourceMode::Local,
            revisions,
        }
    }

    pub fn with_mode(mut self, mode: SourceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Two files on disk as a two-revision history: `left` is the older
    /// version, `right` the newer.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelensError::FileNotFound`] if either file is missing.
    pub fn left_right(left: &Path, right: &Path) -> Result<Self, ChangelensError> {
        let now = Utc::now();
        let older = now - chrono::Duration::seconds(1);
        let right_rev = (
            file_descriptor("right", right, now),
            read_file(right)?,
        );
        let left_rev = (file_descriptor("left", left, older), read_file(left)?);
        Ok(Self::new(
            format!("{} -> {}", left.display(), right.display()),
            vec![right_rev, left_rev],
        ))
    }
}

fn file_descriptor(id: &str, path: &Path, timestamp: DateTime<Utc>) -> RevisionDescriptor {
    RevisionDescriptor {
        id: id.to_string(),
        message: path.display().to_string(),
        author: String::new(),
        author_email: String::new(),
        timestamp,
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ChangelensError> {
    if !path.exists() {
        return Err(ChangelensError::FileNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}

impl RevisionSource for StaticSource {
    fn mode(&self) -> SourceMode {
        self.mode
    }

    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn list(&self) -> Result<Vec<RevisionDescriptor>, ChangelensError> {
        Ok(self.revisions.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, ChangelensError> {
        self.revisions
            .iter()
            .find(|(d, _)| d.id == id)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| ChangelensError::InvalidReference(format!("unknown revision '{id}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn left_right_lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let left = dir.path().join("old.json");
        let right = dir.path().join("new.json");
        std::fs::write(&left, b"{\"a\":1}").unwrap();
        std::fs::write(&right, b"{\"a\":2}").unwrap();

        let source = StaticSource::left_right(&left, &right).unwrap();
        let listed = source.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "right");
        assert_eq!(listed[1].id, "left");
        assert!(listed[0].timestamp > listed[1].timestamp);
        assert_eq!(source.fetch("left").await.unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn left_right_missing_file() {
        let err = StaticSource::left_right(Path::new("/nope/a.json"), Path::new("/nope/b.json"))
            .unwrap_err();
        assert!(matches!(err, ChangelensError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn fetch_unknown_revision_fails() {
        let source = StaticSource::new("empty", Vec::new());
        assert!(source.fetch("abc").await.is_err());
    }
}
