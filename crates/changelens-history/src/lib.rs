//! Revision history extraction and pairwise diffing.
//!
//! - [`source`]: the [`RevisionSource`](source::RevisionSource) seam and an in-memory source
//! - [`local`]: local git history via `git2`
//! - [`github`]: GitHub REST API history via `reqwest`
//! - [`engine`]: the [`DiffEngine`](engine::DiffEngine) seam and the external command engine
//! - [`structural`]: the built-in JSON comparator
//! - [`pipeline`]: sequencing, concurrency and failure handling

pub mod engine;
pub mod github;
pub mod local;
pub mod pipeline;
pub mod source;
pub mod structural;
