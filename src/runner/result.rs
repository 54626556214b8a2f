//! Result records for specs, suites and whole runs

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::common::Error;
use crate::http::Exchange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
    Skip,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Skip => "skip",
        }
    }
}

fn elapsed_ms(since: DateTime<Utc>) -> u64 {
    (Utc::now() - since).num_milliseconds().max(0) as u64
}

/// Outcome of one spec, or of one iteration of a looped spec
#[derive(Debug, Clone, Serialize)]
pub struct SpecResult {
    /// Suite file the spec was declared in
    pub file: PathBuf,
    /// Name of the suite the spec belongs to
    pub suite: String,
    pub name: String,
    pub status: Status,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<Error>,
    /// Exchanges sent while the spec ran
    pub requests: Vec<Exchange>,
}

impl SpecResult {
    /// A skipped record; `finish` turns it into a pass or a failure
    pub fn new(file: impl Into<PathBuf>, suite: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            file: file.into(),
            suite: suite.into(),
            name: name.into(),
            status: Status::Skip,
            started_at: now,
            ended_at: now,
            duration_ms: 0,
            error: None,
            requests: Vec::new(),
        }
    }

    pub fn finish(&mut self, outcome: Result<(), Error>, requests: Vec<Exchange>) {
        self.ended_at = Utc::now();
        self.duration_ms = (self.ended_at - self.started_at).num_milliseconds().max(0) as u64;
        self.requests = requests;
        match outcome {
            Ok(()) => self.status = Status::Pass,
            Err(e) => {
                self.status = Status::Fail;
                self.error = Some(e);
            }
        }
    }
}

/// Outcome of one suite file
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResult {
    pub location: PathBuf,
    /// Unknown when the document failed to load
    pub name: Option<String>,
    pub status: Status,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub tests: Vec<SpecResult>,
    /// Suite level failure: loading, configuration or suite hooks
    pub error: Option<Error>,
    /// Exchanges sent by suite hooks
    pub requests: Vec<Exchange>,
}

impl SuiteResult {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            name: None,
            status: Status::Skip,
            started_at: Utc::now(),
            duration_ms: 0,
            tests: Vec::new(),
            error: None,
            requests: Vec::new(),
        }
    }

    /// Name for display, falling back to the file
    pub fn title(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.location.display().to_string())
    }

    pub fn passed_tests(&self) -> usize {
        self.count(Status::Pass)
    }

    pub fn failed_tests(&self) -> usize {
        self.count(Status::Fail)
    }

    pub fn skipped_tests(&self) -> usize {
        self.count(Status::Skip)
    }

    fn count(&self, status: Status) -> usize {
        self.tests.iter().filter(|t| t.status == status).count()
    }

    pub(crate) fn finish(&mut self) {
        self.duration_ms = elapsed_ms(self.started_at);
    }
}

/// Everything a launcher run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub files: Vec<PathBuf>,
    /// In completion order
    pub suites: Vec<SuiteResult>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            suites: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub(crate) fn finish(&mut self) {
        self.duration_ms = elapsed_ms(self.started_at);
    }

    /// Suites that neither passed nor were skipped; the process exit code
    pub fn failed_count(&self) -> usize {
        self.suites_with(Status::Fail)
    }

    pub fn suites_with(&self, status: Status) -> usize {
        self.suites.iter().filter(|s| s.status == status).count()
    }

    pub fn tests_with(&self, status: Status) -> usize {
        self.suites
            .iter()
            .flat_map(|s| &s.tests)
            .filter(|t| t.status == status)
            .count()
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(status: Status) -> SpecResult {
        let mut result = SpecResult::new("users.yml", "users", "get user");
        result.status = status;
        result
    }

    #[test]
    fn test_spec_finish() {
        let mut result = SpecResult::new("users.yml", "users", "get user");
        result.finish(Err(Error::transport("refused")), Vec::new());
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.file, PathBuf::from("users.yml"));
        assert!(result.ended_at >= result.started_at);
        assert_eq!(result.error.unwrap().message(), "refused");
    }

    #[test]
    fn test_summary_counts() {
        let mut passing = SuiteResult::new("a.yml");
        passing.status = Status::Pass;
        passing.tests = vec![spec(Status::Pass), spec(Status::Skip)];

        let mut failing = SuiteResult::new("b.yml");
        failing.status = Status::Fail;
        failing.tests = vec![spec(Status::Fail), spec(Status::Pass)];

        let mut skipped = SuiteResult::new("c.yml");
        skipped.status = Status::Skip;

        let summary = RunSummary {
            suites: vec![passing, failing, skipped],
            ..RunSummary::new(vec![])
        };
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.tests_with(Status::Pass), 2);
        assert_eq!(summary.test_count(), 4);
        assert_eq!(summary.suites[1].failed_tests(), 1);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Status::Skip).unwrap(), "skip");
    }
}
