use std::path::PathBuf;

/// Errors that can occur across the changelens workspace.
///
/// Library crates return this type directly. It also implements
/// [`miette::Diagnostic`] so the binary can surface it with help text.
///
/// # Examples
///
/// ```
/// use changelens_core::ChangelensError;
///
/// let err = ChangelensError::Config("missing token".into());
/// assert!(err.to_string().contains("missing token"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ChangelensError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check .changelens.toml or the matching command line flag"))]
    Config(String),

    /// Local git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// GitHub API or transport failure.
    #[error("GitHub error: {0}")]
    #[diagnostic(help("set GH_TOKEN or GITHUB_TOKEN if you are hitting rate limits"))]
    Github(String),

    /// The diff engine rejected a pair of documents.
    #[error("diff engine error: {0}")]
    Engine(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A repository, URL or revision reference could not be understood.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
}
