use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::DiffResult;

/// Metadata for one historical version of the tracked file, as listed by a
/// revision source before any content is fetched.
///
/// # Examples
///
/// ```
/// use changelens_core::RevisionDescriptor;
/// use chrono::Utc;
///
/// let desc = RevisionDescriptor {
///     id: "a1b2c3d".into(),
///     message: "add pets endpoint".into(),
///     author: "Dana".into(),
///     author_email: "dana@example.com".into(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(desc.short_id(), "a1b2c3d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionDescriptor {
    /// Commit hash (or any opaque identifier for non-git sources).
    pub id: String,
    /// First line of the commit message.
    pub message: String,
    pub author: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl RevisionDescriptor {
    /// First seven characters of the id.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(7) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }
}

/// One version of the tracked file together with its computed diff.
///
/// `diff` is `None` for the earliest revision (nothing to compare against),
/// for the base revision in cumulative mode, and for revisions whose diff
/// failed.
#[derive(Debug, Clone)]
pub struct Revision {
    pub id: String,
    pub message: String,
    pub author: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    /// Raw bytes of the tracked file at this revision.
    pub content: Vec<u8>,
    /// Raw bytes of the revision this one was compared against.
    pub previous_content: Option<Vec<u8>>,
    pub diff: Option<DiffResult>,
}

impl Revision {
    /// Build an undiffed revision from a descriptor and its content.
    pub fn from_descriptor(desc: RevisionDescriptor, content: Vec<u8>) -> Self {
        Self {
            id: desc.id,
            message: desc.message,
            author: desc.author,
            author_email: desc.author_email,
            timestamp: desc.timestamp,
            content,
            previous_content: None,
            diff: None,
        }
    }

    /// Metadata view of this revision.
    pub fn descriptor(&self) -> RevisionDescriptor {
        RevisionDescriptor {
            id: self.id.clone(),
            message: self.message.clone(),
            author: self.author.clone(),
            author_email: self.author_email.clone(),
            timestamp: self.timestamp,
        }
    }
}
