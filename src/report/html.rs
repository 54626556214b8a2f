//! The `html` file reporter
//!
//! Renders the run summary into one self-contained page. Failed tests can be
//! expanded to show their error and, with `logRequests`, their exchanges.

use std::fmt::Write as _;

use chrono::Utc;

use crate::common::{human_duration, Error, Result};
use crate::http::Exchange;
use crate::runner::{RunEvent, RunSummary, SpecResult, Status, SuiteResult};

use super::ReporterOptions;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; color: #222; }
.header { background: #263238; color: #fff; padding: 16px 24px; }
.header .title { font-size: 22px; margin-bottom: 8px; }
ul { list-style: none; padding-left: 16px; }
.suite-name { font-size: 17px; margin: 18px 0 6px; }
.test-name { font-size: 14px; font-weight: normal; margin: 4px 0; }
.pass .test-name::before { content: "✓ "; color: #2e7d32; }
.fail .test-name::before { content: "✖ "; color: #c62828; }
.skip .test-name::before { content: "- "; color: #0277bd; }
.fail .test-name { cursor: pointer; color: #c62828; }
.duration { color: #888; }
pre { background: #f5f5f5; padding: 8px; white-space: pre-wrap; }
.test.fail pre { display: none; }
.test.fail.open pre { display: block; }
.suite-error { color: #c62828; }
"#;

const SCRIPT: &str = r#"
document.querySelectorAll('.test.fail .test-name').forEach(function (title) {
  title.addEventListener('click', function () {
    title.parentElement.classList.toggle('open');
  });
});
"#;

const SEPARATOR: &str = "----------------------------------- \n";

/// Writes `<htmlReportDir>/<htmlReportName>.html` once the run ends
pub struct HtmlReporter {
    options: ReporterOptions,
}

impl HtmlReporter {
    pub fn new(options: ReporterOptions) -> Self {
        Self { options }
    }

    fn write(&self, summary: &RunSummary) -> Result<()> {
        let dir = &self.options.html_report_dir;
        if !dir.is_dir() {
            eprintln!(
                "Directory {} does not exist, cannot write html report",
                dir.display()
            );
            return Ok(());
        }

        let path = dir.join(format!("{}.html", self.options.html_report_name));
        std::fs::write(&path, render(summary, self.options.log_requests))?;

        let shown = std::fs::canonicalize(&path).unwrap_or(path);
        println!("\nHTML report is written to \"{}\"", shown.display());
        Ok(())
    }
}

impl super::Reporter for HtmlReporter {
    fn on_event(&mut self, event: &RunEvent) -> Result<()> {
        match event {
            RunEvent::End(summary) => self.write(summary),
            _ => Ok(()),
        }
    }
}

/// The whole page for a finished run
pub fn render(summary: &RunSummary, log_requests: bool) -> String {
    let mut suites = String::new();
    for suite in &summary.suites {
        render_suite(&mut suites, suite, log_requests);
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>apisuite report</title>
<style>{style}</style>
</head>
<body>
<div class="header">
<div class="title">apisuite report</div>
<div>{skipped} Skipped, {failed} Failed, {passed} Passed ( {tests} Tests )</div>
<div>{skipped_suites} Skipped, {failed_suites} Failed, {passed_suites} Passed ( {suite_count} Suites )</div>
<div>Duration: {duration}</div>
<div>{date}</div>
</div>
<ul id="report">{suites}</ul>
<script>{script}</script>
</body>
</html>
"#,
        style = STYLE,
        skipped = summary.tests_with(Status::Skip),
        failed = summary.tests_with(Status::Fail),
        passed = summary.tests_with(Status::Pass),
        tests = summary.test_count(),
        skipped_suites = summary.suites_with(Status::Skip),
        failed_suites = summary.suites_with(Status::Fail),
        passed_suites = summary.suites_with(Status::Pass),
        suite_count = summary.suites.len(),
        duration = human_duration(summary.duration_ms),
        date = Utc::now().to_rfc2822(),
        suites = suites,
        script = SCRIPT,
    )
}

fn render_suite(out: &mut String, suite: &SuiteResult, log_requests: bool) {
    let location = escape(&suite.location.display().to_string());
    if suite.status == Status::Skip {
        let _ = write!(
            out,
            r#"<li class="suite skip"><h1 class="suite-name">{} - Skipped</h1></li>"#,
            location
        );
        return;
    }

    let _ = write!(
        out,
        r#"<li class="suite {}"><h1 class="suite-name">{}</h1><ul>"#,
        suite.status.as_str(),
        location
    );
    for test in &suite.tests {
        render_test(out, test, log_requests);
    }
    out.push_str("</ul>");

    if suite.status == Status::Fail {
        if let Some(error) = &suite.error {
            let _ = write!(out, r#"<pre class="suite-error">{}</pre>"#, escape(&describe(error)));
        }
        if log_requests && !suite.requests.is_empty() {
            let _ = write!(
                out,
                r#"<pre class="suite-requests">{}</pre>"#,
                escape(&exchanges(&suite.requests))
            );
        }
    }
    out.push_str("</li>");
}

fn render_test(out: &mut String, test: &SpecResult, log_requests: bool) {
    let _ = write!(
        out,
        r#"<li class="test {}"><h2 class="test-name">{} <span class="duration">( {}ms )</span></h2>"#,
        test.status.as_str(),
        escape(&test.name),
        test.duration_ms
    );
    if let Some(error) = &test.error {
        let _ = write!(out, r#"<pre class="error">{}</pre>"#, escape(&describe(error)));
        if log_requests && !test.requests.is_empty() {
            let _ = write!(
                out,
                r#"<pre class="test-requests">{}</pre>"#,
                escape(&exchanges(&test.requests))
            );
        }
    }
    out.push_str("</li>");
}

fn describe(error: &Error) -> String {
    format!("{}: {}", error.name(), error.message())
}

fn exchanges(requests: &[Exchange]) -> String {
    requests
        .iter()
        .map(|exchange| format!("{}{}", exchange.render(), SEPARATOR))
        .collect()
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
