//! Lifecycle events consumed by reporters

use std::path::PathBuf;

use tokio::sync::mpsc;

use super::result::{RunSummary, SpecResult, SuiteResult};

/// Events in emission order; suites running in parallel interleave
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// The launcher is about to run these files
    Start { files: Vec<PathBuf> },
    SuiteStarted { location: PathBuf },
    TestStarted { location: PathBuf, name: String },
    TestPassed { location: PathBuf, result: SpecResult },
    TestFailed { location: PathBuf, result: SpecResult },
    TestSkipped { location: PathBuf, result: SpecResult },
    /// Carries the suite level error, if any, inside the result
    SuiteEnded(SuiteResult),
    End(RunSummary),
}

/// Sending half of the event channel
///
/// Emitting never fails: once every reporter is gone events are dropped.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl EventSink {
    pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: RunEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                tracing::trace!("event receiver closed");
            }
        }
    }

    /// Emit the pass, fail or skip event matching the result's status
    pub fn test_finished(&self, location: PathBuf, result: SpecResult) {
        use super::result::Status;
        self.emit(match result.status {
            Status::Pass => RunEvent::TestPassed { location, result },
            Status::Fail => RunEvent::TestFailed { location, result },
            Status::Skip => RunEvent::TestSkipped { location, result },
        });
    }
}
