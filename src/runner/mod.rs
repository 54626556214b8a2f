//! Suite and spec execution
//!
//! The [`Launcher`] runs suite files through a [`SuiteExecutor`], which in
//! turn runs each spec. Progress is published as [`RunEvent`]s; results are
//! collected into a [`RunSummary`].

mod events;
mod launcher;
mod result;
mod spec;
pub(crate) mod suite;

pub use events::{EventSink, RunEvent};
pub use launcher::Launcher;
pub use result::{RunSummary, SpecResult, Status, SuiteResult};
pub use suite::{SuiteExecutor, SuiteRuntime};

use crate::common::config::{Config, Defaults, RetryDefaults};
use crate::suite::matcher::Pattern;

/// Settings shared by every suite of a run
#[derive(Debug, Clone, Default)]
pub struct RunnerSettings {
    /// Only specs whose name matches run; the rest are skipped
    pub grep: Option<Pattern>,
    pub defaults: Defaults,
    pub retry: RetryDefaults,
}

impl RunnerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            grep: None,
            defaults: config.defaults.clone(),
            retry: config.retry.clone(),
        }
    }

    pub fn with_grep(mut self, grep: Option<Pattern>) -> Self {
        self.grep = grep;
        self
    }
}
