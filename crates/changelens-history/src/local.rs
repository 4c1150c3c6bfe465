//! Local git history via git2.
//!
//! Walks commits reachable from HEAD and keeps the ones whose diff against
//! their first parent touches the tracked file.

use std::path::{Path, PathBuf};

use changelens_core::{ChangelensError, RevisionDescriptor};
use chrono::{DateTime, Utc};
use git2::{Commit, DiffOptions, Repository, Sort};

use crate::source::{RevisionSource, SourceMode};

/// A file tracked in a local git repository.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use changelens_history::local::LocalGitSource;
///
/// let source = LocalGitSource::discover(Path::new("api/openapi.json")).unwrap();
/// println!("{}", source.file_path());
/// ```
#[derive(Debug, Clone)]
pub struct LocalGitSource {
    repo_path: PathBuf,
    file_path: String,
}

impl LocalGitSource {
    /// `file_path` is relative to the repository root.
    pub fn new(repo_path: impl Into<PathBuf>, file_path: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            file_path: file_path.into(),
        }
    }

    /// Locate the repository containing `file` and check that the file is
    /// tracked at HEAD.
    ///
    /// # Errors
    ///
    /// Returns [`ChangelensError::FileNotFound`] if `file` does not exist,
    /// or [`ChangelensError::Git`] if it is not inside a repository or not
    /// committed.
    pub fn discover(file: &Path) -> Result<Self, ChangelensError> {
        if !file.exists() {
            return Err(ChangelensError::FileNotFound(file.to_path_buf()));
        }
        let file = file.canonicalize()?;
        let start = file.parent().unwrap_or(Path::new("."));
        let repo = Repository::discover(start)
            .map_err(|e| ChangelensError::Git(format!("not a git repository: {e}")))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| ChangelensError::Git("bare repositories are not supported".into()))?
            .canonicalize()?;
        let relative = file.strip_prefix(&workdir).map_err(|_| {
            ChangelensError::Git(format!(
                "{} is outside {}",
                file.display(),
                workdir.display()
            ))
        })?;
        // git paths always use forward slashes
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let head = repo
            .head()
            .and_then(|h| h.peel_to_tree())
            .map_err(|e| ChangelensError::Git(format!("failed to read HEAD: {e}")))?;
        head.get_path(Path::new(&relative)).map_err(|_| {
            ChangelensError::Git(format!("'{relative}' has no committed history"))
        })?;

        Ok(Self::new(workdir, relative))
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    fn open(&self) -> Result<Repository, ChangelensError> {
        Repository::open(&self.repo_path)
            .map_err(|e| ChangelensError::Git(format!("failed to open repository: {e}")))
    }

    fn list_sync(&self) -> Result<Vec<RevisionDescriptor>, ChangelensError> {
        let repo = self.open()?;
        let mut revwalk = repo
            .revwalk()
            .map_err(|e| ChangelensError::Git(format!("failed to create revwalk: {e}")))?;
        revwalk.set_sorting(Sort::TIME).ok();
        revwalk
            .push_head()
            .map_err(|e| ChangelensError::Git(format!("failed to push HEAD: {e}")))?;

        let mut revisions = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| ChangelensError::Git(format!("revwalk error: {e}")))?;
            let commit = repo
                .find_commit(oid)
                .map_err(|e| ChangelensError::Git(format!("failed to find commit: {e}")))?;
            if !self.touches_file(&repo, &commit)? {
                continue;
            }
            revisions.push(describe_commit(&commit));
        }

        tracing::debug!(
            file = %self.file_path,
            count = revisions.len(),
            "listed local revisions"
        );
        Ok(revisions)
    }

    /// True when the commit changes the tracked file and still contains it.
    fn touches_file(&self, repo: &Repository, commit: &Commit) -> Result<bool, ChangelensError> {
        let tree = commit
            .tree()
            .map_err(|e| ChangelensError::Git(format!("failed to get commit tree: {e}")))?;
        if tree.get_path(Path::new(&self.file_path)).is_err() {
            return Ok(false);
        }
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(
                parent
                    .tree()
                    .map_err(|e| ChangelensError::Git(format!("failed to get parent tree: {e}")))?,
            ),
            Err(_) => None,
        };

        let mut opts = DiffOptions::new();
        opts.pathspec(&self.file_path);
        let diff = repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
            .map_err(|e| ChangelensError::Git(format!("failed to diff trees: {e}")))?;
        Ok(diff.deltas().len() > 0)
    }

    fn fetch_sync(&self, id: &str) -> Result<Vec<u8>, ChangelensError> {
        let repo = self.open()?;
        let commit = repo
            .revparse_single(id)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|e| ChangelensError::InvalidReference(format!("'{id}': {e}")))?;
        let tree = commit
            .tree()
            .map_err(|e| ChangelensError::Git(format!("failed to get commit tree: {e}")))?;
        let entry = tree.get_path(Path::new(&self.file_path)).map_err(|_| {
            ChangelensError::Git(format!("'{}' does not exist at {id}", self.file_path))
        })?;
        let blob = entry
            .to_object(&repo)
            .and_then(|obj| obj.peel_to_blob())
            .map_err(|e| ChangelensError::Git(format!("failed to read blob: {e}")))?;
        Ok(blob.content().to_vec())
    }
}

fn describe_commit(commit: &Commit) -> RevisionDescriptor {
    let author = commit.author();
    RevisionDescriptor {
        id: commit.id().to_string(),
        message: commit
            .message()
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .to_string(),
        author: author.name().unwrap_or("unknown").to_string(),
        author_email: author.email().unwrap_or("unknown").to_string(),
        timestamp: DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
    }
}

impl RevisionSource for LocalGitSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Local
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.repo_path.display(), self.file_path)
    }

    async fn list(&self) -> Result<Vec<RevisionDescriptor>, ChangelensError> {
        self.list_sync()
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, ChangelensError> {
        self.fetch_sync(id)
    }
}
