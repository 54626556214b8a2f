//! User functions: hooks, custom validators, configuration and loop builders
//!
//! A [`FunctionRef`](crate::suite::FunctionRef) names either a function
//! registered with the [`HookRegistry`] or a function exported by a module
//! file. Both receive a [`HookContext`] with mutable access to the suite and
//! test contexts, and may invoke other specs through a [`SpecInvoker`].

mod process;
mod registry;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::common::{Error, ErrorKind, Result};
use crate::http::HttpResponse;
use crate::request::DependencyOptions;

pub use process::ProcessModule;
pub use registry::HookRegistry;

/// Where a user function is being called from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
    BeforeTest,
    AfterTest,
    CustomValidator,
    CustomConfiguration,
    LoopItems,
}

impl HookKind {
    /// Kind of the error a failing function is reported as
    pub fn error_kind(self) -> ErrorKind {
        match self {
            HookKind::BeforeAll => ErrorKind::BeforeAllHook,
            HookKind::AfterAll => ErrorKind::AfterAllHook,
            HookKind::BeforeEach => ErrorKind::BeforeEachHook,
            HookKind::AfterEach => ErrorKind::AfterEachHook,
            HookKind::BeforeTest => ErrorKind::BeforeTestHook,
            HookKind::AfterTest => ErrorKind::AfterTestHook,
            HookKind::CustomValidator => ErrorKind::CustomResponseValidation,
            HookKind::CustomConfiguration => ErrorKind::SuiteCustomConfiguration,
            HookKind::LoopItems => ErrorKind::LoopItemsBuilder,
        }
    }

    /// Label used when the module file is missing
    pub fn module_label(self) -> &'static str {
        match self {
            HookKind::BeforeAll => "Before all hook module",
            HookKind::AfterAll => "After all hook module",
            HookKind::BeforeEach => "Before each hook module",
            HookKind::AfterEach => "After each hook module",
            HookKind::BeforeTest => "Before test hook module",
            HookKind::AfterTest => "After test hook module",
            HookKind::CustomValidator => "Custom validator module",
            HookKind::CustomConfiguration => "Custom configuration module",
            HookKind::LoopItems => "Loop items builder module",
        }
    }

    fn context(self) -> &'static str {
        match self {
            HookKind::BeforeAll => " occurred while running the before all hook \n    ",
            HookKind::AfterAll => " occurred while running the after all hook \n     ",
            HookKind::CustomValidator => " occurred in custom response validation \n ",
            HookKind::CustomConfiguration => {
                " occurred while running the custom configuration function \n "
            }
            HookKind::LoopItems => " occurred while building loop items \n ",
            HookKind::BeforeEach | HookKind::AfterEach | HookKind::BeforeTest | HookKind::AfterTest => {
                " - "
            }
        }
    }

    /// Report a function failure under this hook's error kind
    ///
    /// Errors already of this kind, custom validation failures and schema
    /// errors keep their identity.
    pub fn wrap(self, error: Error) -> Error {
        let own = self.error_kind();
        if error.is(own)
            || error.is(ErrorKind::CustomResponseValidation)
            || error.is(ErrorKind::InvalidSuiteSchema)
        {
            return error;
        }
        error.wrap(own, self.context())
    }
}

/// What a user function can see and change
///
/// Only the parts relevant to the call site are set: a configuration
/// function sees `config`, an after-test hook sees `response`, and so on.
#[derive(Default)]
pub struct HookContext<'a> {
    /// Suite-wide user context, shared by every spec of the suite
    pub suite: Option<&'a mut Map<String, Value>>,
    /// Per-spec user context; request overrides are read from it
    pub test: Option<&'a mut Map<String, Value>>,
    pub response: Option<&'a HttpResponse>,
    /// Current item of a looped spec
    pub loop_item: Option<&'a Value>,
    /// Target configuration values returned by a configuration function
    pub config: Option<&'a mut Map<String, Value>>,
    /// Runs dependency specs on behalf of the function
    pub runner: Option<&'a dyn SpecInvoker>,
}

impl HookContext<'_> {
    /// Invoke another spec by name
    pub async fn run_spec(&self, name: &str, options: DependencyOptions) -> Result<HttpResponse> {
        match self.runner {
            Some(runner) => runner.run_spec(name, options).await,
            None => Err(Error::custom(
                "Error",
                format!("spec '{}' can not be invoked from this function", name),
            )),
        }
    }
}

/// Invokes specs by name, used by functions that need other endpoints
#[async_trait]
pub trait SpecInvoker: Send + Sync {
    async fn run_spec(&self, name: &str, options: DependencyOptions) -> Result<HttpResponse>;
}

/// A user function
#[async_trait]
pub trait HookFunction: Send + Sync {
    async fn call(&self, ctx: &mut HookContext<'_>) -> Result<Value>;
}

/// Adapter for synchronous closures
pub struct FnHook<F> {
    function: F,
}

impl<F> FnHook<F> {
    pub fn new(function: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<Value> + Send + Sync,
    {
        Self { function }
    }
}

#[async_trait]
impl<F> HookFunction for FnHook<F>
where
    F: Fn(&mut HookContext<'_>) -> Result<Value> + Send + Sync,
{
    async fn call(&self, ctx: &mut HookContext<'_>) -> Result<Value> {
        (self.function)(ctx)
    }
}

/// A set of named functions loaded from one module file
#[async_trait]
pub trait HookModule: Send + Sync {
    async fn call(&self, function: &str, ctx: &mut HookContext<'_>) -> Result<Value>;
}

/// Module whose functions are registered in-process
#[derive(Default)]
pub struct NativeModule {
    functions: HashMap<String, Arc<dyn HookFunction>>,
}

impl NativeModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, name: impl Into<String>, function: impl HookFunction + 'static) -> Self {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }
}

#[async_trait]
impl HookModule for NativeModule {
    async fn call(&self, function: &str, ctx: &mut HookContext<'_>) -> Result<Value> {
        match self.functions.get(function) {
            Some(hook) => hook.call(ctx).await,
            None => Err(function_not_found(function)),
        }
    }
}

pub(crate) fn function_not_found(function: &str) -> Error {
    Error::new(
        ErrorKind::CustomFunctionNotFoundInModule,
        format!("'{}' function not found in module", function),
    )
}
