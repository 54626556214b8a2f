//! Spec execution
//!
//! A spec runs in one of two modes. As a test it goes through the full
//! lifecycle: before hooks, request, validation with optional retries, after
//! hooks. As a dependency, invoked by name from a user function, it only
//! sends its request and optionally validates the response.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::common::{Error, ErrorKind, Result};
use crate::hooks::{HookContext, HookKind, SpecInvoker};
use crate::http::{HttpResponse, RequestSpec};
use crate::request::{self, DependencyOptions, RequestOverrides};
use crate::suite::document::{FunctionRef, RetryPolicy, SpecDeclaration};
use crate::validate;

use super::suite::SuiteRuntime;

/// One test-mode execution of a spec or of a loop iteration
pub(crate) struct SpecRun<'a> {
    runtime: &'a SuiteRuntime,
    spec: &'a SpecDeclaration,
    name: &'a str,
    loop_item: Option<&'a Value>,
}

impl<'a> SpecRun<'a> {
    pub(crate) fn new(
        runtime: &'a SuiteRuntime,
        spec: &'a SpecDeclaration,
        name: &'a str,
        loop_item: Option<&'a Value>,
    ) -> Self {
        Self {
            runtime,
            spec,
            name,
            loop_item,
        }
    }

    pub(crate) async fn run(&self, suite_ctx: &mut Map<String, Value>) -> Result<()> {
        let runtime = self.runtime;
        let mut test = Map::new();
        test.insert("name".to_string(), Value::from(self.name));

        if let Some(hook) = &runtime.suite.document.hooks.before_each {
            self.hook(HookKind::BeforeEach, hook, suite_ctx, &mut test, None).await?;
        }
        if let Some(hook) = &self.spec.before_test {
            self.hook(HookKind::BeforeTest, hook, suite_ctx, &mut test, None).await?;
        }

        let overrides = RequestOverrides::from_context(&test)?;
        let request = request::build(
            self.spec,
            &overrides,
            &runtime.target,
            &runtime.suite.resolver,
        )?;
        let response = runtime.send(&request).await?;

        let (response, verdict) = match self.validate(&response, suite_ctx, &mut test).await {
            Ok(()) => (response, Ok(())),
            Err(e) => match &self.spec.retry {
                Some(policy) => self.retry(policy, &request, response, e, suite_ctx, &mut test).await,
                None => (response, Err(e)),
            },
        };
        let verdict = verdict.map_err(|e| {
            if e.is(ErrorKind::Transport) {
                e
            } else {
                e.with_request(request.method.as_str(), &request.href())
            }
        });

        let after = self.after_hooks(&response, suite_ctx, &mut test).await;
        match (verdict, after) {
            (Ok(()), after) => after,
            (Err(e), Err(hook_error)) => {
                tracing::warn!(spec = self.name, error = %hook_error, "after hook failed on a failing spec");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    /// Re-send the built request until it validates or attempts run out
    ///
    /// Returns the last response received together with the outcome.
    async fn retry(
        &self,
        policy: &RetryPolicy,
        request: &RequestSpec,
        mut last: HttpResponse,
        first_error: Error,
        suite_ctx: &mut Map<String, Value>,
        test: &mut Map<String, Value>,
    ) -> (HttpResponse, Result<()>) {
        let defaults = &self.runtime.settings.retry;
        let attempts = policy.count.unwrap_or(defaults.count).max(1);
        let wait = Duration::from_millis(
            policy
                .wait_before_each
                .unwrap_or(defaults.wait_before_each_ms),
        );

        let mut error = first_error;
        for attempt in 1..=attempts {
            tracing::debug!(spec = self.name, attempt, attempts, error = %error, "retrying spec");
            tokio::time::sleep(wait).await;

            match self.runtime.send(request).await {
                Ok(response) => {
                    let outcome = self.validate(&response, suite_ctx, test).await;
                    last = response;
                    match outcome {
                        Ok(()) => return (last, Ok(())),
                        Err(e) => error = e,
                    }
                }
                Err(e) => error = e,
            }
        }
        (last, Err(error))
    }

    async fn validate(
        &self,
        response: &HttpResponse,
        suite_ctx: &mut Map<String, Value>,
        test: &mut Map<String, Value>,
    ) -> Result<()> {
        let mut ctx = HookContext {
            suite: Some(suite_ctx),
            test: Some(test),
            response: Some(response),
            loop_item: self.loop_item,
            config: None,
            runner: Some(self.runtime),
        };
        validate::validate(
            &self.spec.response,
            response,
            &self.runtime.hooks,
            &self.runtime.suite.resolver,
            &mut ctx,
        )
        .await
    }

    async fn after_hooks(
        &self,
        response: &HttpResponse,
        suite_ctx: &mut Map<String, Value>,
        test: &mut Map<String, Value>,
    ) -> Result<()> {
        if let Some(hook) = &self.spec.after_test {
            self.hook(HookKind::AfterTest, hook, suite_ctx, test, Some(response)).await?;
        }
        if let Some(hook) = &self.runtime.suite.document.hooks.after_each {
            self.hook(HookKind::AfterEach, hook, suite_ctx, test, Some(response)).await?;
        }
        Ok(())
    }

    async fn hook(
        &self,
        kind: HookKind,
        function: &FunctionRef,
        suite_ctx: &mut Map<String, Value>,
        test: &mut Map<String, Value>,
        response: Option<&HttpResponse>,
    ) -> Result<()> {
        let mut ctx = HookContext {
            suite: Some(suite_ctx),
            test: Some(test),
            response,
            loop_item: self.loop_item,
            config: None,
            runner: Some(self.runtime),
        };
        self.runtime
            .hooks
            .run(kind, function, &self.runtime.suite.resolver, &mut ctx)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl SpecInvoker for SuiteRuntime {
    /// Dependency mode: no hooks, no retries
    async fn run_spec(&self, name: &str, options: DependencyOptions) -> Result<HttpResponse> {
        let (spec, target, resolver) = self.find_spec(name).ok_or_else(|| {
            Error::new(
                ErrorKind::NoSpecFoundMatchingName,
                format!("No matching spec found with name '{}'", name),
            )
        })?;
        tracing::debug!(suite = %self.suite.file.display(), spec = name, "running dependency spec");

        let request = request::build(spec, &options.request, target, resolver)?;
        let response = self.send(&request).await?;

        if options.validate_response {
            let mut ctx = HookContext {
                response: Some(&response),
                runner: Some(self),
                ..HookContext::default()
            };
            validate::validate(&spec.response, &response, &self.hooks, resolver, &mut ctx).await?;
        }
        Ok(response)
    }
}
