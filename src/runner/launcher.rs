//! Runs a set of suite files serially or with bounded parallelism

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use crate::common::Result;
use crate::hooks::HookRegistry;
use crate::http::HttpClient;
use crate::report::{self, Reporter};

use super::events::{EventSink, RunEvent};
use super::result::RunSummary;
use super::suite::SuiteExecutor;
use super::RunnerSettings;

pub struct Launcher {
    client: Arc<dyn HttpClient>,
    hooks: Arc<HookRegistry>,
    settings: Arc<RunnerSettings>,
    /// Suites in flight at once; `None` runs them one after another
    parallel: Option<usize>,
}

impl Launcher {
    pub fn new(client: Arc<dyn HttpClient>, hooks: HookRegistry, settings: RunnerSettings) -> Self {
        Self {
            client,
            hooks: Arc::new(hooks),
            settings: Arc::new(settings),
            parallel: None,
        }
    }

    /// Run up to `limit` suites concurrently
    pub fn parallel(mut self, limit: usize) -> Self {
        self.parallel = Some(limit.max(1));
        self
    }

    /// Run every file, feeding lifecycle events to `reporters`
    ///
    /// Suite failures are part of the summary; only reporter failures are
    /// returned as errors.
    pub async fn run(self, files: Vec<PathBuf>, reporters: Vec<Box<dyn Reporter>>) -> Result<RunSummary> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let events = EventSink::new(sender);

        let run = async move {
            let summary = self.launch(files, &events).await;
            events.emit(RunEvent::End(summary.clone()));
            summary
        };

        let (summary, reported) = tokio::join!(run, report::pump(receiver, reporters));
        reported?;
        Ok(summary)
    }

    async fn launch(&self, files: Vec<PathBuf>, events: &EventSink) -> RunSummary {
        let mut summary = RunSummary::new(files.clone());
        events.emit(RunEvent::Start {
            files: files.clone(),
        });

        let executor = SuiteExecutor::new(
            Arc::clone(&self.client),
            Arc::clone(&self.hooks),
            Arc::clone(&self.settings),
            events.clone(),
        );

        match self.parallel {
            Some(limit) => {
                tracing::info!(suites = files.len(), limit, "running suites in parallel");
                summary.suites = stream::iter(files.iter())
                    .map(|file| executor.run(file))
                    .buffer_unordered(limit)
                    .collect()
                    .await;
            }
            None => {
                tracing::info!(suites = files.len(), "running suites serially");
                for file in &files {
                    summary.suites.push(executor.run(file).await);
                }
            }
        }

        summary.finish();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{response, ScriptedClient};
    use crate::http::{HttpClient, HttpResponse, RequestSpec};
    use crate::runner::Status;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const PASSING: &str = "meta:\n  name: ok\nconfiguration:\n  scheme: http\n  host: localhost\nspecs:\n  - name: ping\n    request:\n      method: get\n      path: /ping\n    response:\n      status_code: 200\n";

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Reporter for Recorder {
        fn on_event(&mut self, event: &RunEvent) -> Result<()> {
            let label = match event {
                RunEvent::Start { .. } => "start",
                RunEvent::SuiteStarted { .. } => "suite",
                RunEvent::TestStarted { .. } => "test",
                RunEvent::TestPassed { .. } => "pass",
                RunEvent::TestFailed { .. } => "fail",
                RunEvent::TestSkipped { .. } => "skip",
                RunEvent::SuiteEnded(_) => "suite end",
                RunEvent::End(_) => "end",
            };
            self.0.lock().unwrap().push(label.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_serial_run_events_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("ok.yml");
        std::fs::write(&ok, PASSING).unwrap();
        let missing = dir.path().join("missing.yml");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let launcher = Launcher::new(
            Arc::new(ScriptedClient::always(response(200, "{}"))),
            HookRegistry::new(),
            RunnerSettings::default(),
        );
        let summary = launcher
            .run(vec![ok, missing], vec![Box::new(Recorder(seen.clone()))])
            .await
            .unwrap();

        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.suites[0].status, Status::Pass);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["start", "suite", "test", "pass", "suite end", "suite", "suite end", "end"]
        );
    }

    #[tokio::test]
    async fn test_parallel_run_collects_every_suite() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..5)
            .map(|i| {
                let path = dir.path().join(format!("s{}.yml", i));
                std::fs::write(&path, PASSING).unwrap();
                path
            })
            .collect();

        let summary = Launcher::new(
            Arc::new(ScriptedClient::always(response(200, "{}"))),
            HookRegistry::new(),
            RunnerSettings::default(),
        )
        .parallel(2)
        .run(files, Vec::new())
        .await
        .unwrap();

        assert_eq!(summary.suites.len(), 5);
        assert_eq!(summary.failed_count(), 0);
        assert_eq!(summary.tests_with(Status::Pass), 5);
    }

    /// Holds every request open briefly and remembers the peak concurrency
    #[derive(Default)]
    struct Gauge {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl HttpClient for Gauge {
        async fn send(&self, request: &RequestSpec) -> Result<HttpResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let mut answer = response(200, "{}");
            answer.url = request.href();
            Ok(answer)
        }
    }

    fn passing_suites(dir: &std::path::Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("s{}.yml", i));
                std::fs::write(&path, PASSING).unwrap();
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn test_parallel_limit_bounds_suites_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let files = passing_suites(dir.path(), 10);

        let gauge = Arc::new(Gauge::default());
        let summary = Launcher::new(gauge.clone(), HookRegistry::new(), RunnerSettings::default())
            .parallel(4)
            .run(files.clone(), Vec::new())
            .await
            .unwrap();
        assert_eq!(summary.suites.len(), 10);
        assert_eq!(summary.failed_count(), 0);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 4 && peak > 1, "peak in flight was {}", peak);

        let serial = Arc::new(Gauge::default());
        let summary = Launcher::new(serial.clone(), HookRegistry::new(), RunnerSettings::default())
            .run(files, Vec::new())
            .await
            .unwrap();
        assert_eq!(summary.suites.len(), 10);
        assert_eq!(serial.peak.load(Ordering::SeqCst), 1);
    }
}
