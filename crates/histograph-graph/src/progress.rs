//! Progress notifications emitted while the pipeline runs.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Enumerating commits.
    Commits,
    /// Expanding recent commits into file touches.
    Files,
    /// Extracting functions and their line history.
    Analysis,
    /// Checking integrity and computing statistics.
    Graph,
    /// Done.
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Commits => write!(f, "commits"),
            Stage::Files => write!(f, "files"),
            Stage::Analysis => write!(f, "analysis"),
            Stage::Graph => write!(f, "graph"),
            Stage::Complete => write!(f, "complete"),
        }
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisProgress {
    /// Stage being reported.
    pub stage: Stage,
    /// Items processed so far.
    pub current: usize,
    /// Items in the stage.
    pub total: usize,
    /// Human-readable description.
    pub message: String,
}

impl AnalysisProgress {
    /// Build a notification.
    pub fn new(stage: Stage, current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            stage,
            current,
            total,
            message: message.into(),
        }
    }
}

/// Receives progress notifications.
///
/// `report` is called from the pipeline task and must return promptly.
/// Dropping notifications is acceptable; blocking is not.
///
/// Any `Fn(AnalysisProgress)` closure is a sink:
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use histograph_graph::progress::{AnalysisProgress, ProgressSink, Stage};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let log = Arc::clone(&seen);
/// let sink = move |p: AnalysisProgress| log.lock().unwrap().push(p.stage);
/// sink.report(AnalysisProgress::new(Stage::Files, 1, 10, "x"));
/// assert_eq!(*seen.lock().unwrap(), vec![Stage::Files]);
/// ```
pub trait ProgressSink: Send + Sync {
    /// Deliver one notification.
    fn report(&self, progress: AnalysisProgress);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _progress: AnalysisProgress) {}
}

impl<F> ProgressSink for F
where
    F: Fn(AnalysisProgress) + Send + Sync,
{
    fn report(&self, progress: AnalysisProgress) {
        self(progress)
    }
}

/// Forwards notifications into a bounded channel, dropping them when the
/// channel is full or closed.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: mpsc::Sender<AnalysisProgress>,
}

impl ChannelProgress {
    /// Sink and receiver pair with room for `capacity` pending notifications.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AnalysisProgress>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, progress: AnalysisProgress) {
        if self.sender.try_send(progress).is_err() {
            tracing::trace!("progress notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Analysis.to_string(), "analysis");
        assert_eq!(serde_json::to_value(Stage::Complete).unwrap(), "complete");
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = ChannelProgress::channel(1);
        sink.report(AnalysisProgress::new(Stage::Commits, 0, 3, "first"));
        sink.report(AnalysisProgress::new(Stage::Commits, 1, 3, "second"));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.message, "first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (sink, rx) = ChannelProgress::channel(4);
        drop(rx);
        sink.report(AnalysisProgress::new(Stage::Files, 0, 1, "nobody listening"));
    }
}
