//! Core types, configuration, and error handling for changelens.
//!
//! This crate provides the shared foundation used by all other changelens crates:
//! - [`ChangelensError`]: unified error type using `thiserror`
//! - [`ChangelensConfig`]: configuration loaded from `.changelens.toml`
//! - The diff model: [`DiffResult`], [`ObjectChanges`], [`Slot`], [`SlotValue`], [`Change`]
//! - History records: [`RevisionDescriptor`], [`Revision`]
//! - The progress protocol: [`ProgressReporter`], [`ProgressChannels`]

mod config;
mod error;
pub mod progress;
mod revision;
mod types;

pub use config::{
    ChangelensConfig, EngineConfig, GithubConfig, HistoryConfig, ReportConfig, CONFIG_FILE_NAME,
};
pub use error::ChangelensError;
pub use progress::{progress_channel, ErrorEvent, ProgressChannels, ProgressEvent, ProgressReporter};
pub use revision::{Revision, RevisionDescriptor};
pub use types::{
    Change, ChangeKind, DiffResult, Direction, Location, ObjectChanges, ObjectKind, Slot,
    SlotValue,
};

/// A convenience `Result` type for changelens operations.
pub type Result<T> = std::result::Result<T, ChangelensError>;
