//! The history pipeline.
//!
//! Turns the revisions of a tracked file into a list of revisions that each
//! carry a diff against their predecessor (or against a fixed base).
//!
//! Pipeline stages:
//! 1. List revisions from the source (newest first)
//! 2. Apply the time window and count limit
//! 3. Retrieve content: concurrently for remote sources, interleaved with
//!    diffing for local ones
//! 4. Diff each revision against its reference, oldest to newest
//! 5. Return the revisions newest first with collected errors and warnings

use std::collections::HashSet;
use std::pin::pin;

use changelens_core::{
    ChangelensError, ErrorEvent, HistoryConfig, ProgressReporter, Revision, RevisionDescriptor,
};
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use sha2::{Digest, Sha256};

use crate::engine::DiffEngine;
use crate::source::{RevisionSource, SourceMode};

const JOB_LIST: &str = "list";
const JOB_FETCH: &str = "fetch";
const JOB_DIFF: &str = "diff";
const JOB_BUDGET: &str = "budget";
const JOB_COMPLETE: &str = "complete";

/// Options controlling which revisions are processed and how.
///
/// # Examples
///
/// ```
/// use changelens_core::HistoryConfig;
/// use changelens_history::pipeline::PipelineOptions;
///
/// let options = PipelineOptions::from_config(&HistoryConfig {
///     limit: Some(3),
///     since_days: Some(30),
///     ..HistoryConfig::default()
/// });
/// assert_eq!(options.limit, Some(3));
/// assert_eq!(options.since.map(|d| d.num_days()), Some(30));
/// ```
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum number of revisions to process, newest first.
    pub limit: Option<usize>,
    /// Drop revisions older than now minus this window.
    pub since: Option<Duration>,
    /// Diff every revision against this revision instead of its predecessor.
    pub base: Option<String>,
    /// Concurrent content fetches for remote sources.
    pub concurrency: usize,
    /// Remote content budget in KB; older revisions beyond it are dropped.
    pub max_content_kb: Option<u64>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

impl PipelineOptions {
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self {
            limit: config.limit,
            since: config
                .since_days
                .and_then(|days| Duration::try_days(i64::try_from(days).ok()?)),
            base: config.base.clone(),
            concurrency: config.concurrency.max(1),
            max_content_kb: config.max_content_kb,
        }
    }
}

/// Result of a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// Processed revisions, newest first. Empty after a fatal error.
    pub revisions: Vec<Revision>,
    /// Every error reported during the run, fatal or not.
    pub errors: Vec<ErrorEvent>,
    /// Distinct warning messages, in the order first seen.
    pub warnings: Vec<String>,
}

impl PipelineOutcome {
    /// The error that stopped the run, if any.
    pub fn fatal(&self) -> Option<&ErrorEvent> {
        self.errors.iter().find(|e| e.fatal)
    }

    /// Number of revisions that carry a diff.
    pub fn diff_count(&self) -> usize {
        self.revisions.iter().filter(|r| r.diff.is_some()).count()
    }
}

/// Warning messages de-duplicated by SHA-256 of their text.
///
/// # Examples
///
/// ```
/// use changelens_history::pipeline::WarningLog;
///
/// let mut log = WarningLog::default();
/// assert!(log.push("engine failed on abc"));
/// assert!(!log.push("engine failed on abc"));
/// assert_eq!(log.into_vec().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct WarningLog {
    seen: HashSet<[u8; 32]>,
    entries: Vec<String>,
}

impl WarningLog {
    /// Record `message`; returns false if an identical warning was already seen.
    pub fn push(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        let digest: [u8; 32] = Sha256::digest(message.as_bytes()).into();
        if !self.seen.insert(digest) {
            return false;
        }
        self.entries.push(message);
        true
    }

    pub fn into_vec(self) -> Vec<String> {
        self.entries
    }
}

/// Keep the revisions inside the time window, then cap the count.
///
/// `descriptors` are newest first, and so is the result.
pub fn select_revisions(
    descriptors: Vec<RevisionDescriptor>,
    options: &PipelineOptions,
    now: DateTime<Utc>,
) -> Vec<RevisionDescriptor> {
    let cutoff = options
        .since
        .and_then(|window| now.checked_sub_signed(window));
    let mut selected: Vec<RevisionDescriptor> = match cutoff {
        Some(cutoff) => {
            descriptors
                .into_iter()
                .filter(|d| d.timestamp >= cutoff)
                .collect()
        }
        None => descriptors,
    };
    if let Some(limit) = options.limit {
        selected.truncate(limit);
    }
    selected
}

fn matches_reference(id: &str, reference: &str) -> bool {
    !reference.is_empty() && (id == reference || id.starts_with(reference))
}

/// Sequences a revision source through a diff engine.
pub struct HistoryPipeline<E> {
    engine: E,
    options: PipelineOptions,
}

/// Mutable state of one run.
struct Run {
    reporter: ProgressReporter,
    errors: Vec<ErrorEvent>,
    warnings: WarningLog,
}

impl Run {
    async fn fatal(mut self, job: &str, message: String) -> PipelineOutcome {
        tracing::warn!(job, error = %message, "history pipeline aborted");
        self.reporter.error(job, message.clone(), true).await;
        self.errors.push(ErrorEvent {
            job: job.to_string(),
            message,
            fatal: true,
        });
        // dropping the reporter closes both channels
        PipelineOutcome {
            revisions: Vec::new(),
            errors: self.errors,
            warnings: self.warnings.into_vec(),
        }
    }

    async fn warn(&mut self, job: &str, message: String) {
        tracing::warn!(job, "{message}");
        if self.warnings.push(message.clone()) {
            self.reporter.warning(job, message).await;
        }
    }

    async fn recoverable(&mut self, job: &str, message: String) {
        self.reporter.error(job, message.clone(), false).await;
        self.errors.push(ErrorEvent {
            job: job.to_string(),
            message: message.clone(),
            fatal: false,
        });
        self.warnings.push(message);
    }

    async fn finish(self, mut revisions: Vec<Revision>) -> PipelineOutcome {
        let diffs = revisions.iter().filter(|r| r.diff.is_some()).count();
        self.reporter
            .completed(
                JOB_COMPLETE,
                format!("processed {} revisions, {diffs} diffs", revisions.len()),
            )
            .await;
        revisions.reverse();
        PipelineOutcome {
            revisions,
            errors: self.errors,
            warnings: self.warnings.into_vec(),
        }
    }
}

impl<E: DiffEngine> HistoryPipeline<E> {
    pub fn new(engine: E, options: PipelineOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the pipeline over `source`.
    ///
    /// Progress and errors are reported through `reporter`, which is
    /// consumed: both channels close when this returns. A content
    /// retrieval failure is fatal and yields no revisions; a failed diff
    /// leaves that revision's `diff` empty and processing continues.
    pub async fn run<S: RevisionSource>(
        &self,
        source: &S,
        reporter: ProgressReporter,
    ) -> PipelineOutcome {
        let mut run = Run {
            reporter,
            errors: Vec::new(),
            warnings: WarningLog::default(),
        };

        let listed = match source.list().await {
            Ok(listed) => listed,
            Err(e) => {
                let message = format!("failed to list revisions of {}: {e}", source.describe());
                return run.fatal(JOB_LIST, message).await;
            }
        };
        let total = listed.len();
        let mut selected = select_revisions(listed, &self.options, Utc::now());
        tracing::info!(
            source = %source.describe(),
            listed = total,
            selected = selected.len(),
            "selected revisions"
        );
        run.reporter
            .progress(
                JOB_LIST,
                format!("found {total} revisions, processing {}", selected.len()),
            )
            .await;

        if selected.is_empty() {
            return run.finish(Vec::new()).await;
        }

        let base = match &self.options.base {
            Some(reference) => match self.base_content(source, &selected, reference).await {
                Ok(content) => Some((reference.as_str(), content)),
                Err(e) => {
                    let message = format!("failed to read base revision '{reference}': {e}");
                    return run.fatal(JOB_FETCH, message).await;
                }
            },
            None => None,
        };

        selected.reverse();
        match source.mode() {
            SourceMode::Remote => {
                let revisions = match self.fetch_concurrently(source, selected, &mut run).await {
                    Ok(revisions) => revisions,
                    Err(message) => return run.fatal(JOB_FETCH, message).await,
                };
                let mut revisions = self.apply_budget(revisions, &mut run).await;
                for idx in 0..revisions.len() {
                    self.diff_at(&mut revisions, idx, base.as_ref(), &mut run)
                        .await;
                }
                run.finish(revisions).await
            }
            SourceMode::Local => {
                let mut revisions = Vec::with_capacity(selected.len());
                for desc in selected {
                    let content = match source.fetch(&desc.id).await {
                        Ok(content) => content,
                        Err(e) => {
                            let message = format!("failed to read {}: {e}", desc.short_id());
                            return run.fatal(JOB_FETCH, message).await;
                        }
                    };
                    run.reporter
                        .progress(JOB_FETCH, format!("read {}", desc.short_id()))
                        .await;
                    revisions.push(Revision::from_descriptor(desc, content));
                    let idx = revisions.len() - 1;
                    self.diff_at(&mut revisions, idx, base.as_ref(), &mut run)
                        .await;
                }
                run.finish(revisions).await
            }
        }
    }

    async fn base_content<S: RevisionSource>(
        &self,
        source: &S,
        selected: &[RevisionDescriptor],
        reference: &str,
    ) -> Result<Vec<u8>, ChangelensError> {
        let id = selected
            .iter()
            .find(|d| matches_reference(&d.id, reference))
            .map(|d| d.id.as_str())
            .unwrap_or(reference);
        source.fetch(id).await
    }

    /// Fetch every revision's content with bounded concurrency.
    /// Results are consumed in input order, so progress stays ordered.
    async fn fetch_concurrently<S: RevisionSource>(
        &self,
        source: &S,
        selected: Vec<RevisionDescriptor>,
        run: &mut Run,
    ) -> Result<Vec<Revision>, String> {
        let mut stream = pin!(futures::stream::iter(selected)
            .map(|desc| async move {
                let result = source.fetch(&desc.id).await;
                (desc, result)
            })
            .buffered(self.options.concurrency.max(1)));

        let mut revisions = Vec::new();
        while let Some((desc, result)) = stream.next().await {
            match result {
                Ok(content) => {
                    run.reporter
                        .progress(
                            JOB_FETCH,
                            format!("fetched {} ({} bytes)", desc.short_id(), content.len()),
                        )
                        .await;
                    revisions.push(Revision::from_descriptor(desc, content));
                }
                Err(e) => return Err(format!("failed to fetch {}: {e}", desc.short_id())),
            }
        }
        Ok(revisions)
    }

    /// Drop the oldest revisions once the fetched content exceeds the budget.
    /// `revisions` are oldest first; the newest revision is always kept.
    async fn apply_budget(&self, mut revisions: Vec<Revision>, run: &mut Run) -> Vec<Revision> {
        let Some(budget) = self.options.max_content_kb else {
            return revisions;
        };
        let mut used_kb = 0u64;
        let mut keep = 0usize;
        for revision in revisions.iter().rev() {
            let size_kb = (revision.content.len() / 1024) as u64;
            if keep > 0 && used_kb + size_kb > budget {
                break;
            }
            used_kb += size_kb;
            keep += 1;
        }
        let dropped = revisions.len() - keep;
        if dropped > 0 {
            revisions.drain(..dropped);
            let message = format!(
                "content budget of {budget} KB reached, skipped the {dropped} oldest revisions"
            );
            run.warn(JOB_BUDGET, message).await;
        }
        revisions
    }

    /// Diff revision `idx` against its reference content.
    async fn diff_at(
        &self,
        revisions: &mut [Revision],
        idx: usize,
        base: Option<&(&str, Vec<u8>)>,
        run: &mut Run,
    ) {
        let reference = match base {
            Some((reference, _)) if matches_reference(&revisions[idx].id, reference) => None,
            Some((_, content)) => Some(content.clone()),
            None if idx > 0 => Some(revisions[idx - 1].content.clone()),
            None => None,
        };
        let Some(reference) = reference else {
            return;
        };

        let short_id = revisions[idx].descriptor().short_id().to_string();
        let result = self.engine.compare(&reference, &revisions[idx].content);
        revisions[idx].previous_content = Some(reference);
        match result {
            Ok(diff) => {
                let changes = diff.total_changes();
                tracing::debug!(revision = %short_id, changes, "computed diff");
                run.reporter
                    .progress(JOB_DIFF, format!("{short_id}: {changes} changes"))
                    .await;
                revisions[idx].diff = Some(diff);
            }
            Err(e) => {
                let message = format!("unable to diff {short_id}: {e}");
                tracing::warn!(revision = %short_id, error = %e, "diff failed");
                run.recoverable(JOB_DIFF, message).await;
            }
        }
    }
}
