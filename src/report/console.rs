//! The `specs` console reporter

use std::io::{self, Write};

use colored::Colorize;

use crate::common::{human_duration, Error, Result};
use crate::runner::{RunEvent, RunSummary, SpecResult, Status, SuiteResult};

const OK: &str = "✓";
const ERR: &str = "✖";

/// Prints each test as it finishes, a line per finished suite, and a
/// summary with every failure at the end of the run
pub struct SpecsReporter {
    out: Box<dyn Write + Send>,
    log_requests: bool,
}

impl SpecsReporter {
    pub fn new(out: Box<dyn Write + Send>, log_requests: bool) -> Self {
        Self { out, log_requests }
    }

    pub fn stdout(log_requests: bool) -> Self {
        Self::new(Box::new(io::stdout()), log_requests)
    }

    fn test_line(&mut self, result: &SpecResult) -> io::Result<()> {
        let line = match result.status {
            Status::Pass => format!("   {} {} ({}ms)", OK, result.name, result.duration_ms).green(),
            Status::Fail => format!("   {} {} ({}ms)", ERR, result.name, result.duration_ms).red(),
            Status::Skip => format!("   - {} ({}ms)", result.name, result.duration_ms).cyan(),
        };
        writeln!(self.out)?;
        writeln!(self.out, "{}", line)
    }

    fn suite_line(&mut self, suite: &SuiteResult) -> io::Result<()> {
        let location = suite.location.display();
        let line = match suite.status {
            Status::Pass => format!("  Done: {} (Passed)", location).green(),
            Status::Skip => format!("  Done: {} (Skipped)", location).cyan(),
            Status::Fail => format!("  Done: {} (Failed)", location).red(),
        };
        writeln!(self.out)?;
        writeln!(self.out, "{}", line)
    }

    fn summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        let counts = |skipped: usize, failed: usize, passed: usize| {
            format!(
                "{}{}{}",
                format!("{} skipped, ", skipped).cyan(),
                format!("{} failed, ", failed).red(),
                format!("{} passed ", passed).green()
            )
        };

        writeln!(self.out)?;
        writeln!(
            self.out,
            "{}({} tests)",
            counts(
                summary.tests_with(Status::Skip),
                summary.tests_with(Status::Fail),
                summary.tests_with(Status::Pass)
            ),
            summary.test_count()
        )?;
        writeln!(
            self.out,
            "{}({} suites)",
            counts(
                summary.suites_with(Status::Skip),
                summary.suites_with(Status::Fail),
                summary.suites_with(Status::Pass)
            ),
            summary.files.len()
        )?;
        writeln!(self.out, "Duration: {}", human_duration(summary.duration_ms))?;

        if summary.tests_with(Status::Fail) > 0 || summary.failed_count() > 0 {
            writeln!(self.out, "\nFailures:")?;
        }
        self.failures(summary)?;
        writeln!(self.out)
    }

    fn failures(&mut self, summary: &RunSummary) -> io::Result<()> {
        let mut count = 0;
        for suite in &summary.suites {
            if let Some(error) = &suite.error {
                count += 1;
                writeln!(self.out)?;
                writeln!(
                    self.out,
                    "{}",
                    format!(" {}) Suite failure: {}", count, suite.location.display()).red()
                )?;
                self.error(error)?;
                if self.log_requests {
                    self.requests(&suite.requests)?;
                }
                continue;
            }

            for test in suite.tests.iter().filter(|t| t.status == Status::Fail) {
                count += 1;
                writeln!(self.out)?;
                writeln!(
                    self.out,
                    "{}",
                    format!(" {}) {} ({})", count, test.name, suite.location.display()).red()
                )?;
                if let Some(error) = &test.error {
                    self.error(error)?;
                }
                if self.log_requests {
                    self.requests(&test.requests)?;
                }
            }
        }
        Ok(())
    }

    fn error(&mut self, error: &Error) -> io::Result<()> {
        writeln!(self.out, "{}", format!("{}: {}", error.name(), error.message()).red())
    }

    fn requests(&mut self, requests: &[crate::http::Exchange]) -> io::Result<()> {
        for exchange in requests {
            writeln!(self.out)?;
            write!(self.out, "{}", exchange.render())?;
        }
        Ok(())
    }
}

impl super::Reporter for SpecsReporter {
    fn on_event(&mut self, event: &RunEvent) -> Result<()> {
        match event {
            RunEvent::Start { files } => {
                let files: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
                writeln!(self.out)?;
                writeln!(self.out, "Launcher will run suites: {}", files.join(","))?;
            }
            RunEvent::TestPassed { result, .. }
            | RunEvent::TestFailed { result, .. }
            | RunEvent::TestSkipped { result, .. } => self.test_line(result)?,
            RunEvent::SuiteEnded(suite) => self.suite_line(suite)?,
            RunEvent::End(summary) => self.summary(summary)?,
            RunEvent::SuiteStarted { .. } | RunEvent::TestStarted { .. } => {}
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use crate::report::Reporter;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn test(name: &str, status: Status) -> SpecResult {
        let mut result = SpecResult::new("users.yml", "users", name);
        result.status = status;
        if status == Status::Fail {
            result.error = Some(Error::new(
                ErrorKind::ResponseStatusCodeDidNotMatch,
                "Expected status code: 200, Actual status code: 500",
            ));
        }
        result
    }

    #[test]
    fn test_run_output() {
        colored::control::set_override(false);
        let buffer = Buffer::default();
        let mut reporter = SpecsReporter::new(Box::new(buffer.clone()), false);

        let mut users = SuiteResult::new("specs/users.yml");
        users.status = Status::Fail;
        users.tests = vec![test("get user", Status::Pass), test("delete user", Status::Fail)];

        let mut broken = SuiteResult::new("specs/broken.yml");
        broken.status = Status::Fail;
        broken.error = Some(Error::new(ErrorKind::NoSpecsFound, "No specs found in file 'specs/broken.yml'"));

        let summary = RunSummary {
            suites: vec![users.clone(), broken],
            ..RunSummary::new(vec![PathBuf::from("specs/users.yml"), PathBuf::from("specs/broken.yml")])
        };

        let location = PathBuf::from("specs/users.yml");
        let events = [
            RunEvent::Start { files: summary.files.clone() },
            RunEvent::TestPassed { location: location.clone(), result: users.tests[0].clone() },
            RunEvent::TestFailed { location, result: users.tests[1].clone() },
            RunEvent::SuiteEnded(users),
            RunEvent::End(summary),
        ];
        for event in &events {
            reporter.on_event(event).unwrap();
        }

        let text = buffer.text();
        assert!(text.contains("Launcher will run suites: specs/users.yml,specs/broken.yml"));
        assert!(text.contains("   ✓ get user (0ms)"));
        assert!(text.contains("   ✖ delete user (0ms)"));
        assert!(text.contains("  Done: specs/users.yml (Failed)"));
        assert!(text.contains("0 skipped, 1 failed, 1 passed (2 tests)"));
        assert!(text.contains("0 skipped, 2 failed, 0 passed (2 suites)"));
        assert!(text.contains("Failures:"));
        assert!(text.contains(" 1) delete user (specs/users.yml)"));
        assert!(text.contains("ResponseStatusCodeDidNotMatchError: Expected status code: 200"));
        assert!(text.contains(" 2) Suite failure: specs/broken.yml"));
    }
}
