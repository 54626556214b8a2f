//! Suite execution
//!
//! A suite file goes through load, dependency loading and configuration
//! before any spec runs. Failures in those phases end the suite with a
//! suite-level error; a disabled suite is skipped. Specs then run strictly
//! in declaration order between the before-all and after-all hooks.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::common::paths::FileResolver;
use crate::common::{Error, ErrorKind, Result};
use crate::hooks::{HookContext, HookKind, HookRegistry};
use crate::http::{Exchange, HttpClient, HttpResponse, RequestLog, RequestSpec};
use crate::suite::document::{LoopDeclaration, LoopKind, SpecDeclaration};
use crate::suite::loader::{self, LoadedSuite, SuiteDependency, Target};

use super::events::{EventSink, RunEvent};
use super::result::{SpecResult, Status, SuiteResult};
use super::spec::SpecRun;
use super::RunnerSettings;

/// A loaded and configured suite, shared by its spec runs and by the
/// dependency invocations its functions make
pub struct SuiteRuntime {
    pub suite: LoadedSuite,
    pub target: Target,
    pub dependencies: Vec<SuiteDependency>,
    pub(crate) client: Arc<dyn HttpClient>,
    pub(crate) hooks: Arc<HookRegistry>,
    pub(crate) settings: Arc<RunnerSettings>,
    pub(crate) log: RequestLog,
}

impl SuiteRuntime {
    /// Send through the client, recording the exchange in the suite log
    pub(crate) async fn send(&self, request: &RequestSpec) -> Result<HttpResponse> {
        let outcome = self.client.send(request).await;
        self.log.record(Exchange::new(request, &outcome));
        outcome
    }

    /// Look a spec up in this suite, then in each dependency suite
    ///
    /// Specs from a dependency suite run against that suite's target and
    /// resolve files the way that suite does.
    pub(crate) fn find_spec(&self, name: &str) -> Option<(&SpecDeclaration, &Target, &FileResolver)> {
        if let Some(spec) = self.suite.document.find_spec(name) {
            return Some((spec, &self.target, &self.suite.resolver));
        }
        self.dependencies.iter().find_map(|dependency| {
            dependency
                .source
                .document
                .find_spec(name)
                .map(|spec| (spec, &dependency.target, &dependency.source.resolver))
        })
    }

    fn is_skipped(&self, spec: &SpecDeclaration) -> bool {
        if !spec.enabled {
            return true;
        }
        match &self.settings.grep {
            Some(grep) => !grep.is_match(&spec.name),
            None => false,
        }
    }
}

/// Runs suite files, reporting progress through an [`EventSink`]
pub struct SuiteExecutor {
    client: Arc<dyn HttpClient>,
    hooks: Arc<HookRegistry>,
    settings: Arc<RunnerSettings>,
    events: EventSink,
}

impl SuiteExecutor {
    pub fn new(
        client: Arc<dyn HttpClient>,
        hooks: Arc<HookRegistry>,
        settings: Arc<RunnerSettings>,
        events: EventSink,
    ) -> Self {
        Self {
            client,
            hooks,
            settings,
            events,
        }
    }

    pub async fn run(&self, file: &Path) -> SuiteResult {
        let mut result = SuiteResult::new(file);
        self.events.emit(RunEvent::SuiteStarted {
            location: file.to_path_buf(),
        });
        tracing::info!(suite = %file.display(), "running suite");

        match self.prepare(file).await {
            Ok(runtime) => {
                result.name = Some(runtime.suite.name().to_string());
                self.execute(&runtime, &mut result).await;
            }
            Err(e) if e.is(ErrorKind::DisabledSuite) => {
                tracing::info!(suite = %file.display(), "suite disabled");
                result.status = Status::Skip;
            }
            Err(e) => {
                tracing::debug!(suite = %file.display(), error = %e, "suite failed to start");
                result.status = Status::Fail;
                result.error = Some(e);
            }
        }

        result.finish();
        tracing::info!(
            suite = %file.display(),
            status = result.status.as_str(),
            duration_ms = result.duration_ms,
            "suite finished"
        );
        self.events.emit(RunEvent::SuiteEnded(result.clone()));
        result
    }

    async fn prepare(&self, file: &Path) -> Result<SuiteRuntime> {
        let suite = loader::load_document(file)?;
        let defaults = &self.settings.defaults;

        let dependencies = loader::load_dependencies(&suite, &self.hooks, defaults).await?;

        let target = loader::configure(&suite, &self.hooks, defaults)
            .await
            .map_err(|e| {
                if e.is(ErrorKind::InvalidSuiteConfiguration) || e.is(ErrorKind::InvalidSuiteSchema) {
                    e
                } else {
                    Error::new(
                        ErrorKind::SuiteConfigurationFailed,
                        format!(
                            "error occurred while configuring the suite '{}' \n {}",
                            file.display(),
                            e.message()
                        ),
                    )
                }
            })?;

        Ok(SuiteRuntime {
            suite,
            target,
            dependencies,
            client: Arc::clone(&self.client),
            hooks: Arc::clone(&self.hooks),
            settings: Arc::clone(&self.settings),
            log: RequestLog::new(),
        })
    }

    async fn execute(&self, runtime: &SuiteRuntime, result: &mut SuiteResult) {
        let outcome = self.run_specs(runtime, result).await;
        result.requests = runtime.log.snapshot();

        match outcome {
            Ok(()) if result.failed_tests() > 0 => result.status = Status::Fail,
            Ok(()) => result.status = Status::Pass,
            Err(e) => {
                result.status = Status::Fail;
                result.error = Some(e);
            }
        }
    }

    async fn run_specs(&self, runtime: &SuiteRuntime, result: &mut SuiteResult) -> Result<()> {
        let document = &runtime.suite.document;
        if document.specs.is_empty() {
            return Err(Error::new(
                ErrorKind::NoSpecsFound,
                format!("No specs found in file '{}'", runtime.suite.file.display()),
            ));
        }

        let mut suite_ctx = Map::new();

        if let Some(hook) = &document.hooks.before_all {
            let mut ctx = HookContext {
                suite: Some(&mut suite_ctx),
                runner: Some(runtime),
                ..HookContext::default()
            };
            self.hooks
                .run(HookKind::BeforeAll, hook, &runtime.suite.resolver, &mut ctx)
                .await?;
        }

        for spec in &document.specs {
            runtime.log.clear();

            if runtime.is_skipped(spec) {
                tracing::debug!(spec = %spec.name, "skipping spec");
                let skipped =
                    SpecResult::new(&runtime.suite.file, runtime.suite.name(), spec.name.as_str());
                self.record(runtime, result, skipped);
                continue;
            }

            let Some(declaration) = &spec.iterate else {
                self.run_spec(runtime, spec, &spec.name, None, &mut suite_ctx, result)
                    .await;
                continue;
            };

            match self.loop_items(runtime, declaration).await {
                Ok(items) => {
                    for (index, item) in items.iter().enumerate() {
                        runtime.log.clear();
                        let name = format!("{} - loop iteration {}", spec.name, index + 1);
                        self.run_spec(runtime, spec, &name, Some(item), &mut suite_ctx, result)
                            .await;
                    }
                }
                Err(e) => {
                    let mut failed =
                        SpecResult::new(&runtime.suite.file, runtime.suite.name(), spec.name.as_str());
                    failed.finish(Err(e), Vec::new());
                    self.record(runtime, result, failed);
                }
            }
        }

        runtime.log.clear();
        if let Some(hook) = &document.hooks.after_all {
            let mut ctx = HookContext {
                suite: Some(&mut suite_ctx),
                runner: Some(runtime),
                ..HookContext::default()
            };
            self.hooks
                .run(HookKind::AfterAll, hook, &runtime.suite.resolver, &mut ctx)
                .await?;
        }
        Ok(())
    }

    async fn run_spec(
        &self,
        runtime: &SuiteRuntime,
        spec: &SpecDeclaration,
        name: &str,
        loop_item: Option<&Value>,
        suite_ctx: &mut Map<String, Value>,
        result: &mut SuiteResult,
    ) {
        let location = runtime.suite.file.clone();
        self.events.emit(RunEvent::TestStarted {
            location,
            name: name.to_string(),
        });

        let mut record = SpecResult::new(&runtime.suite.file, runtime.suite.name(), name);
        let outcome = SpecRun::new(runtime, spec, name, loop_item)
            .run(suite_ctx)
            .await;
        if let Err(e) = &outcome {
            tracing::debug!(spec = name, error = %e, "spec failed");
        }
        record.finish(outcome, runtime.log.snapshot());
        self.record(runtime, result, record);
    }

    fn record(&self, runtime: &SuiteRuntime, result: &mut SuiteResult, record: SpecResult) {
        self.events
            .test_finished(runtime.suite.file.clone(), record.clone());
        result.tests.push(record);
    }

    async fn loop_items(&self, runtime: &SuiteRuntime, declaration: &LoopDeclaration) -> Result<Vec<Value>> {
        let items = match (declaration.kind, &declaration.dynamic) {
            (LoopKind::Static, _) => declaration.items.clone().unwrap_or(Value::Null),
            (LoopKind::Dynamic, Some(function)) => {
                self.hooks
                    .run(
                        HookKind::LoopItems,
                        function,
                        &runtime.suite.resolver,
                        &mut HookContext::default(),
                    )
                    .await?
            }
            (LoopKind::Dynamic, None) => {
                return Err(HookKind::LoopItems.wrap(Error::new(
                    ErrorKind::InvalidSpecificationSchema,
                    "Loop dynamic function is not specified",
                )))
            }
        };

        match items {
            Value::Array(items) => Ok(items),
            _ => Err(HookKind::LoopItems.wrap(Error::new(
                ErrorKind::InvalidSpecificationSchema,
                "Loop dynamic function did not return an Array",
            ))),
        }
    }
}
