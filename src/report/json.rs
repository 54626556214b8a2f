//! The `json` file reporter

use std::path::PathBuf;

use serde::Serialize;

use crate::common::{Error, ErrorReport, Result};
use crate::http::Exchange;
use crate::runner::{RunEvent, RunSummary, Status, SuiteResult};

use super::ReporterOptions;

const TITLE: &str = "apisuite";

/// Document written to `<jsonReportDir>/<jsonReportName>.json`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    pub title: String,
    pub files: Vec<PathBuf>,
    pub passed_suites_count: usize,
    pub skipped_suites_count: usize,
    pub failed_suites_count: usize,
    pub passed_tests_count: usize,
    pub skipped_tests_count: usize,
    pub failed_tests_count: usize,
    /// Milliseconds
    pub duration: u64,
    pub suites: Vec<SuiteReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
    pub location: PathBuf,
    pub name: String,
    pub status: Status,
    pub tests: Vec<TestReport>,
    pub passed_tests: usize,
    pub skipped_tests: usize,
    pub failed_tests: usize,
    pub error: Option<ErrorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<Exchange>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    /// Location of the suite file
    pub suite: PathBuf,
    pub name: String,
    pub duration: u64,
    pub status: Status,
    pub error: Option<ErrorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<Exchange>>,
}

impl JsonReport {
    pub fn new(summary: &RunSummary, log_requests: bool) -> Self {
        Self {
            title: TITLE.to_string(),
            files: summary.files.clone(),
            passed_suites_count: summary.suites_with(Status::Pass),
            skipped_suites_count: summary.suites_with(Status::Skip),
            failed_suites_count: summary.suites_with(Status::Fail),
            passed_tests_count: summary.tests_with(Status::Pass),
            skipped_tests_count: summary.tests_with(Status::Skip),
            failed_tests_count: summary.tests_with(Status::Fail),
            duration: summary.duration_ms,
            suites: summary
                .suites
                .iter()
                .map(|suite| SuiteReport::new(suite, log_requests))
                .collect(),
        }
    }
}

impl SuiteReport {
    fn new(suite: &SuiteResult, log_requests: bool) -> Self {
        let failed = suite.status == Status::Fail;
        Self {
            location: suite.location.clone(),
            name: suite.name.clone().unwrap_or_default(),
            status: suite.status,
            tests: suite
                .tests
                .iter()
                .map(|test| {
                    let failed = test.status == Status::Fail;
                    TestReport {
                        suite: test.file.clone(),
                        name: test.name.clone(),
                        duration: test.duration_ms,
                        status: test.status,
                        error: test.error.as_ref().map(ErrorReport::from),
                        requests: (log_requests && failed && !test.requests.is_empty())
                            .then(|| test.requests.clone()),
                    }
                })
                .collect(),
            passed_tests: suite.passed_tests(),
            skipped_tests: suite.skipped_tests(),
            failed_tests: suite.failed_tests(),
            error: suite.error.as_ref().map(ErrorReport::from),
            requests: (log_requests && failed).then(|| suite.requests.clone()),
        }
    }
}

/// Writes the report once the run ends
pub struct JsonReporter {
    options: ReporterOptions,
}

impl JsonReporter {
    pub fn new(options: ReporterOptions) -> Self {
        Self { options }
    }

    fn write(&self, summary: &RunSummary) -> Result<()> {
        let dir = &self.options.json_report_dir;
        if !dir.is_dir() {
            eprintln!(
                "Directory {} does not exist, cannot write json report",
                dir.display()
            );
            return Ok(());
        }

        let path = dir.join(format!("{}.json", self.options.json_report_name));
        let report = JsonReport::new(summary, self.options.log_requests);
        let body = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::config(format!("failed to serialize json report: {}", e)))?;
        std::fs::write(&path, body)?;

        let shown = std::fs::canonicalize(&path).unwrap_or(path);
        println!("\nJSON report is written to \"{}\"", shown.display());
        Ok(())
    }
}

impl super::Reporter for JsonReporter {
    fn on_event(&mut self, event: &RunEvent) -> Result<()> {
        match event {
            RunEvent::End(summary) => self.write(summary),
            _ => Ok(()),
        }
    }
}
