//! Reporters consuming run lifecycle events
//!
//! Reporters observe a run; they never influence it. Events arrive over a
//! channel in emission order and are handed to every reporter in turn.

mod console;
mod html;
mod json;

use std::path::PathBuf;

use tokio::sync::mpsc;

pub use console::SpecsReporter;
pub use html::HtmlReporter;
pub use json::{JsonReport, JsonReporter};

use crate::common::config::ReportConfig;
use crate::common::{Error, Result};
use crate::runner::RunEvent;

/// Observer of a run
pub trait Reporter: Send {
    fn on_event(&mut self, event: &RunEvent) -> Result<()>;
}

/// Reporter names accepted by `--reporter`, with a short description
pub const AVAILABLE: &[(&str, &str)] = &[
    ("specs", "console output per test and suite, with a summary (always on)"),
    ("json", "writes a JSON report file at the end of the run"),
    ("html", "writes a standalone HTML report page at the end of the run"),
];

/// Feed every event to every reporter until the channel closes
///
/// A failing reporter does not stop the others; the first failure is
/// returned once the run is over.
pub async fn pump(
    mut receiver: mpsc::UnboundedReceiver<RunEvent>,
    mut reporters: Vec<Box<dyn Reporter>>,
) -> Result<()> {
    let mut first_error = None;
    while let Some(event) = receiver.recv().await {
        for reporter in reporters.iter_mut() {
            if let Err(e) = reporter.on_event(&event) {
                tracing::warn!(error = %e, "reporter failed");
                first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Parsed `--reporter-options`
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterOptions {
    pub json_report_dir: PathBuf,
    pub json_report_name: String,
    pub html_report_dir: PathBuf,
    pub html_report_name: String,
    /// Include HTTP exchanges of failed tests and suites
    pub log_requests: bool,
}

impl ReporterOptions {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            json_report_dir: PathBuf::from(&config.json_dir),
            json_report_name: config.json_name.clone(),
            html_report_dir: PathBuf::from(&config.html_dir),
            html_report_name: config.html_name.clone(),
            log_requests: false,
        }
    }

    /// Apply `key=value,flag` pairs on top of the configured defaults
    pub fn parse(text: &str, config: &ReportConfig) -> Result<Self> {
        let mut options = Self::new(config);
        for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parts: Vec<&str> = entry.split('=').map(str::trim).collect();
            match parts.as_slice() {
                ["jsonReportDir", dir] => options.json_report_dir = PathBuf::from(dir),
                ["jsonReportName", name] => options.json_report_name = name.to_string(),
                ["htmlReportDir", dir] => options.html_report_dir = PathBuf::from(dir),
                ["htmlReportName", name] => options.html_report_name = name.to_string(),
                ["logRequests"] => options.log_requests = true,
                ["logRequests", flag] => options.log_requests = *flag != "false",
                [key] | [key, _] => tracing::warn!(option = %key, "ignoring unknown reporter option"),
                _ => {
                    return Err(Error::config(format!(
                        "invalid reporter option '{}'",
                        entry
                    )))
                }
            }
        }
        Ok(options)
    }
}

/// Build the reporters named on the command line
///
/// The console reporter is always first, whether named or not.
pub fn build(names: &[String], options: &ReporterOptions) -> Result<Vec<Box<dyn Reporter>>> {
    let mut reporters: Vec<Box<dyn Reporter>> =
        vec![Box::new(SpecsReporter::stdout(options.log_requests))];
    let mut seen: Vec<&str> = Vec::new();

    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        if seen.contains(&name) {
            continue;
        }
        match name {
            "specs" => {}
            "json" => reporters.push(Box::new(JsonReporter::new(options.clone()))),
            "html" => reporters.push(Box::new(HtmlReporter::new(options.clone()))),
            other => {
                return Err(Error::config(format!(
                    "Invalid reporter '{}', available reporters: {}",
                    other,
                    AVAILABLE
                        .iter()
                        .map(|(name, _)| *name)
                        .collect::<Vec<_>>()
                        .join(", ")
                )))
            }
        }
        seen.push(name);
    }
    Ok(reporters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_options() {
        let options = ReporterOptions::parse(
            "jsonReportDir=out, jsonReportName=run,logRequests,htmlReportName=page",
            &ReportConfig::default(),
        )
        .unwrap();
        assert_eq!(options.json_report_dir, PathBuf::from("out"));
        assert_eq!(options.json_report_name, "run");
        assert_eq!(options.html_report_dir, PathBuf::from("."));
        assert_eq!(options.html_report_name, "page");
        assert!(options.log_requests);

        let defaults = ReporterOptions::parse("", &ReportConfig::default()).unwrap();
        assert_eq!(defaults.json_report_name, "report");
        assert!(!defaults.log_requests);

        assert!(ReporterOptions::parse("colour=red", &ReportConfig::default()).is_ok());
        let err = ReporterOptions::parse("a=b=c", &ReportConfig::default()).unwrap_err();
        assert_eq!(err.message(), "invalid reporter option 'a=b=c'");
    }

    #[test]
    fn test_build_always_includes_specs() {
        let options = ReporterOptions::new(&ReportConfig::default());
        assert_eq!(build(&[], &options).unwrap().len(), 1);
        assert_eq!(build(&["specs".into(), "json".into(), "json".into()], &options).unwrap().len(), 2);
        assert_eq!(build(&["html".into(), "json".into(), "html".into()], &options).unwrap().len(), 3);

        let err = build(&["xml".into()], &options).err().unwrap();
        assert_eq!(err.message(), "Invalid reporter 'xml', available reporters: specs, json, html");
    }

    struct Failing;

    impl Reporter for Failing {
        fn on_event(&mut self, _: &RunEvent) -> Result<()> {
            Err(Error::config("broken"))
        }
    }

    #[tokio::test]
    async fn test_pump_drains_after_failure() {
        let (sender, receiver) = mpsc::unbounded_channel();
        sender.send(RunEvent::Start { files: vec![] }).unwrap();
        sender.send(RunEvent::Start { files: vec![] }).unwrap();
        drop(sender);

        let err = pump(receiver, vec![Box::new(Failing)]).await.unwrap_err();
        assert_eq!(err.message(), "broken");
    }
}
