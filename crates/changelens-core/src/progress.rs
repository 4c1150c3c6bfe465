//! Progress and error channels shared between the history pipeline and
//! whatever is displaying its work.
//!
//! Both channels are bounded. The producer holds a [`ProgressReporter`];
//! when it is dropped both channels close, which is how consumers learn the
//! pipeline has finished.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A unit of visible progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Short name of the stage that produced the event.
    pub job: String,
    pub message: String,
    /// Set on the final event of a run.
    pub completed: bool,
    /// The event reports something the user should know about.
    pub warning: bool,
}

/// A problem encountered while processing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub job: String,
    pub message: String,
    /// A fatal error stops the pipeline.
    pub fatal: bool,
}

/// Producer half of the progress protocol.
///
/// Sends never fail from the caller's point of view: if nobody is listening
/// the event is dropped.
#[derive(Debug)]
pub struct ProgressReporter {
    progress: mpsc::Sender<ProgressEvent>,
    errors: mpsc::Sender<ErrorEvent>,
}

/// Consumer half of the progress protocol.
#[derive(Debug)]
pub struct ProgressChannels {
    pub progress: mpsc::Receiver<ProgressEvent>,
    pub errors: mpsc::Receiver<ErrorEvent>,
}

/// Create a connected reporter and receiver pair with the given capacity.
///
/// # Examples
///
/// ```
/// use changelens_core::progress_channel;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let (reporter, channels) = progress_channel(8);
///     reporter.progress("fetch", "fetched a1b2c3d").await;
///     drop(reporter);
///     let (events, errors) = channels.drain().await;
///     assert_eq!(events.len(), 1);
///     assert!(errors.is_empty());
/// });
/// ```
pub fn progress_channel(capacity: usize) -> (ProgressReporter, ProgressChannels) {
    let capacity = capacity.max(1);
    let (progress_tx, progress_rx) = mpsc::channel(capacity);
    let (errors_tx, errors_rx) = mpsc::channel(capacity);
    (
        ProgressReporter {
            progress: progress_tx,
            errors: errors_tx,
        },
        ProgressChannels {
            progress: progress_rx,
            errors: errors_rx,
        },
    )
}

impl ProgressReporter {
    /// A reporter whose events go nowhere.
    pub fn silent() -> Self {
        let (reporter, _channels) = progress_channel(1);
        reporter
    }

    pub async fn progress(&self, job: &str, message: impl Into<String>) {
        self.send(job, message.into(), false, false).await;
    }

    pub async fn warning(&self, job: &str, message: impl Into<String>) {
        self.send(job, message.into(), false, true).await;
    }

    pub async fn completed(&self, job: &str, message: impl Into<String>) {
        self.send(job, message.into(), true, false).await;
    }

    pub async fn error(&self, job: &str, message: impl Into<String>, fatal: bool) {
        let event = ErrorEvent {
            job: job.to_string(),
            message: message.into(),
            fatal,
        };
        let _ = self.errors.send(event).await;
    }

    async fn send(&self, job: &str, message: String, completed: bool, warning: bool) {
        let event = ProgressEvent {
            job: job.to_string(),
            message,
            completed,
            warning,
        };
        let _ = self.progress.send(event).await;
    }
}

impl ProgressChannels {
    /// Read both channels until the producer closes them.
    pub async fn drain(self) -> (Vec<ProgressEvent>, Vec<ErrorEvent>) {
        let mut events = Vec::new();
        let mut errors = Vec::new();
        self.drain_with(|event| events.push(event), |error| errors.push(error))
            .await;
        (events, errors)
    }

    /// Hand every event to `on_progress` or `on_error` as it arrives, until
    /// the producer closes both channels.
    pub async fn drain_with(
        mut self,
        mut on_progress: impl FnMut(ProgressEvent),
        mut on_error: impl FnMut(ErrorEvent),
    ) {
        let mut progress_open = true;
        let mut errors_open = true;
        while progress_open || errors_open {
            tokio::select! {
                event = self.progress.recv(), if progress_open => match event {
                    Some(event) => on_progress(event),
                    None => progress_open = false,
                },
                error = self.errors.recv(), if errors_open => match error {
                    Some(error) => on_error(error),
                    None => errors_open = false,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (reporter, channels) = progress_channel(4);
        let consumer = tokio::spawn(channels.drain());
        for i in 0..10 {
            reporter.progress("fetch", format!("step {i}")).await;
        }
        reporter.warning("budget", "too big").await;
        reporter.completed("done", "finished").await;
        drop(reporter);

        let (events, errors) = consumer.await.unwrap();
        assert!(errors.is_empty());
        assert_eq!(events.len(), 12);
        assert_eq!(events[0].message, "step 0");
        assert_eq!(events[9].message, "step 9");
        assert!(events[10].warning);
        assert!(events[11].completed);
    }

    #[tokio::test]
    async fn errors_use_their_own_channel() {
        let (reporter, channels) = progress_channel(4);
        reporter.error("fetch", "connection reset", true).await;
        drop(reporter);
        let (events, errors) = channels.drain().await;
        assert!(events.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].fatal);
    }

    #[tokio::test]
    async fn drain_with_sees_events_as_they_arrive() {
        let (reporter, channels) = progress_channel(1);
        let producer = tokio::spawn(async move {
            reporter.progress("fetch", "read c1").await;
            reporter.error("diff", "bad input", false).await;
            reporter.completed("done", "finished").await;
        });
        let mut seen = Vec::new();
        let mut failures = 0;
        channels
            .drain_with(|event| seen.push(event.job), |_| failures += 1)
            .await;
        producer.await.unwrap();
        assert_eq!(seen, ["fetch", "done"]);
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn silent_reporter_never_blocks() {
        let reporter = ProgressReporter::silent();
        for _ in 0..100 {
            reporter.progress("fetch", "ignored").await;
            reporter.error("fetch", "ignored", false).await;
        }
    }
}
