//! The diff engine seam.
//!
//! Changelens never parses API descriptions to compute diffs itself in the
//! general case. A [`DiffEngine`] turns two document buffers into a
//! [`DiffResult`]; the pipeline only sequences calls to it.

use std::io::Write;
use std::process::Command;

use changelens_core::{ChangelensError, DiffResult, EngineConfig};

use crate::structural::StructuralEngine;

/// Compares two versions of a document.
pub trait DiffEngine {
    /// # Errors
    ///
    /// Returns [`ChangelensError::Engine`] when either document cannot be
    /// understood or the comparison fails.
    fn compare(&self, old: &[u8], new: &[u8]) -> Result<DiffResult, ChangelensError>;
}

impl<T: DiffEngine + ?Sized> DiffEngine for &T {
    fn compare(&self, old: &[u8], new: &[u8]) -> Result<DiffResult, ChangelensError> {
        (**self).compare(old, new)
    }
}

impl<T: DiffEngine + ?Sized> DiffEngine for Box<T> {
    fn compare(&self, old: &[u8], new: &[u8]) -> Result<DiffResult, ChangelensError> {
        (**self).compare(old, new)
    }
}

/// Runs an external program as the diff engine.
///
/// The program is invoked as `program [args..] <old-file> <new-file>` and
/// must print a JSON-encoded [`DiffResult`] on stdout. A non-zero exit
/// status is a failed comparison; stderr becomes the error message.
///
/// # Examples
///
/// ```
/// use changelens_history::engine::CommandEngine;
///
/// let engine = CommandEngine::new("oas-diff").with_args(vec!["--json".into()]);
/// assert_eq!(engine.program(), "oas-diff");
/// ```
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

fn write_temp(content: &[u8]) -> Result<tempfile::NamedTempFile, ChangelensError> {
    let mut file = tempfile::Builder::new().prefix("changelens-").tempfile()?;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}

impl DiffEngine for CommandEngine {
    fn compare(&self, old: &[u8], new: &[u8]) -> Result<DiffResult, ChangelensError> {
        let old_file = write_temp(old)?;
        let new_file = write_temp(new)?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(old_file.path())
            .arg(new_file.path())
            .output()
            .map_err(|e| ChangelensError::Engine(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChangelensError::Engine(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            ChangelensError::Engine(format!("{} produced an unreadable diff: {e}", self.program))
        })
    }
}

/// Build the engine selected by configuration: the external command when
/// one is configured, the built-in structural comparator otherwise.
pub fn engine_from_config(config: &EngineConfig) -> Box<dyn DiffEngine + Send + Sync> {
    match &config.command {
        Some(program) => {
            tracing::debug!(program = %program, "using external diff engine");
            Box::new(CommandEngine::new(program.clone()).with_args(config.args.clone()))
        }
        None => Box::new(StructuralEngine::new()),
    }
}
