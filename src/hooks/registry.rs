//! Function lookup and dispatch

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::common::paths::{absolutize, FileResolver};
use crate::common::{Error, ErrorKind, Result};
use crate::suite::document::{FunctionRef, ModuleFunction};

use super::{HookContext, HookFunction, HookKind, HookModule, ProcessModule};

/// Every user function a run can call
///
/// Inline references look up registered functions by name. Module
/// references resolve the module path against the suite; modules
/// registered in-process take precedence over executables on disk.
#[derive(Default)]
pub struct HookRegistry {
    functions: HashMap<String, Arc<dyn HookFunction>>,
    modules: HashMap<PathBuf, Arc<dyn HookModule>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function(&mut self, name: impl Into<String>, function: impl HookFunction + 'static) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Serve module references to `path` from `module`
    pub fn register_module(&mut self, path: impl AsRef<Path>, module: impl HookModule + 'static) {
        self.modules
            .insert(absolutize(path.as_ref()), Arc::new(module));
    }

    /// Call `function`, reporting any failure under `kind`
    pub async fn run(
        &self,
        kind: HookKind,
        function: &FunctionRef,
        resolver: &FileResolver,
        ctx: &mut HookContext<'_>,
    ) -> Result<Value> {
        let outcome = match function {
            FunctionRef::Inline { inline } => match self.functions.get(&inline.function) {
                Some(registered) => {
                    tracing::trace!(?kind, function = %inline.function, "calling registered function");
                    registered.call(ctx).await
                }
                None => Err(Error::new(
                    ErrorKind::NotAFunction,
                    format!("'{}' is not a registered function", inline.function),
                )),
            },
            FunctionRef::Module { module } => self.run_module(kind, module, resolver, ctx).await,
        };

        outcome.map_err(|e| kind.wrap(e))
    }

    async fn run_module(
        &self,
        kind: HookKind,
        module: &ModuleFunction,
        resolver: &FileResolver,
        ctx: &mut HookContext<'_>,
    ) -> Result<Value> {
        let path = resolver.resolve(&module.module_path);

        if let Some(native) = self.modules.get(&path) {
            tracing::trace!(?kind, module = %path.display(), function = %module.function_name, "calling native module");
            return native.call(&module.function_name, ctx).await;
        }

        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(Error::custom(
                    "Error",
                    format!("{} at: {} is not a file", kind.module_label(), path.display()),
                ))
            }
            Err(_) => return Err(Error::file_does_not_exist(kind.module_label(), &path)),
        }

        ProcessModule::new(path)
            .call(&module.function_name, ctx)
            .await
    }
}
