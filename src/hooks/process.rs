//! Module functions executed as child processes
//!
//! The module file is executed with the function name as its only argument.
//! Communication is newline-delimited JSON over stdio:
//!
//! - the runner writes the context as the first line on stdin:
//!   `{"suite": {..}, "test": {..}, "config": {..}, "response": {..}, "loop_item": ..}`
//! - the module writes messages on stdout, one per line:
//!   - `{"type": "run_spec", "name": "login", "options": {..}}` invokes a
//!     spec; the runner answers with `{"type": "spec_response", "response": {..}}`
//!     or `{"type": "spec_error", "error": {"name": .., "message": ..}}`
//!   - `{"type": "done", "suite": {..}, "test": {..}, "config": {..}, "result": ..}`
//!     finishes the call; the returned contexts replace the caller's
//!   - `{"type": "error", "error": {"name": .., "message": ..}}` fails it
//!
//! Lines that are not messages are forwarded to the log. Exit status 127
//! means the module does not export the function.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};

use crate::common::{Error, ErrorReport, Result};
use crate::request::DependencyOptions;

use super::{function_not_found, HookContext, HookModule};

const FUNCTION_NOT_FOUND_STATUS: i32 = 127;

/// Time a module gets to exit once stdin is closed
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// An executable module file
#[derive(Debug, Clone)]
pub struct ProcessModule {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ModuleMessage {
    RunSpec {
        name: String,
        #[serde(default)]
        options: DependencyOptions,
    },
    Done(ModuleOutput),
    Error {
        error: ErrorReport,
    },
}

#[derive(Debug, Default, Deserialize)]
struct ModuleOutput {
    suite: Option<Map<String, Value>>,
    test: Option<Map<String, Value>>,
    config: Option<Map<String, Value>>,
    #[serde(default)]
    result: Value,
}

impl ProcessModule {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn input(ctx: &HookContext<'_>) -> Value {
        let mut input = Map::new();
        if let Some(suite) = ctx.suite.as_deref() {
            input.insert("suite".into(), Value::Object(suite.clone()));
        }
        if let Some(test) = ctx.test.as_deref() {
            input.insert("test".into(), Value::Object(test.clone()));
        }
        if let Some(config) = ctx.config.as_deref() {
            input.insert("config".into(), Value::Object(config.clone()));
        }
        if let Some(response) = ctx.response {
            input.insert("response".into(), response.to_value());
        }
        if let Some(item) = ctx.loop_item {
            input.insert("loop_item".into(), item.clone());
        }
        Value::Object(input)
    }

    fn apply(ctx: &mut HookContext<'_>, output: ModuleOutput) -> Value {
        if let (Some(target), Some(values)) = (ctx.suite.as_deref_mut(), output.suite) {
            *target = values;
        }
        if let (Some(target), Some(values)) = (ctx.test.as_deref_mut(), output.test) {
            *target = values;
        }
        if let (Some(target), Some(values)) = (ctx.config.as_deref_mut(), output.config) {
            *target = values;
        }
        output.result
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        Error::custom(
            "Error",
            format!("failed to execute module '{}': {}", self.path.display(), e),
        )
    }
}

/// Modules that never read stdin close it early; that is not a failure
async fn write_line(stdin: &mut ChildStdin, message: &Value) {
    let mut line = message.to_string();
    line.push('\n');
    if let Err(e) = stdin.write_all(line.as_bytes()).await {
        tracing::trace!(error = %e, "module stdin closed");
        return;
    }
    let _ = stdin.flush().await;
}

#[async_trait]
impl HookModule for ProcessModule {
    async fn call(&self, function: &str, ctx: &mut HookContext<'_>) -> Result<Value> {
        let mut command = Command::new(&self.path);
        command
            .arg(function)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.path.parent() {
            command.current_dir(dir);
        }

        tracing::debug!(module = %self.path.display(), function, "spawning module");
        let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;

        let missing = || self.spawn_error(std::io::Error::other("stdio not captured"));
        let mut stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;
        let mut stderr = child.stderr.take().ok_or_else(missing)?;

        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        });

        write_line(&mut stdin, &Self::input(ctx)).await;

        let runner = ctx.runner;
        let mut outcome: Option<Result<Value>> = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            let message = match serde_json::from_str::<ModuleMessage>(line.trim()) {
                Ok(message) => message,
                Err(_) => {
                    tracing::debug!(module = %self.path.display(), "{}", line);
                    continue;
                }
            };

            match message {
                ModuleMessage::RunSpec { name, options } => {
                    let reply = match runner {
                        Some(runner) => match runner.run_spec(&name, options).await {
                            Ok(response) => json!({ "type": "spec_response", "response": response.to_value() }),
                            Err(e) => json!({ "type": "spec_error", "error": ErrorReport::from(&e) }),
                        },
                        None => json!({
                            "type": "spec_error",
                            "error": {
                                "name": "Error",
                                "message": format!("spec '{}' can not be invoked from this function", name),
                            }
                        }),
                    };
                    write_line(&mut stdin, &reply).await;
                }
                ModuleMessage::Done(output) => {
                    outcome = Some(Ok(Self::apply(ctx, output)));
                    break;
                }
                ModuleMessage::Error { error } => {
                    outcome = Some(Err(Error::from(error)));
                    break;
                }
            }
        }
        drop(stdin);
        drop(lines);

        let status = match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::debug!(module = %self.path.display(), function, "module still running, killing it");
                child.kill().await?;
                child.wait().await?
            }
        };
        let stderr = stderr_task.await.unwrap_or_default();
        tracing::debug!(module = %self.path.display(), function, %status, "module exited");

        match (status.code(), outcome) {
            (_, Some(outcome)) => outcome,
            (Some(FUNCTION_NOT_FOUND_STATUS), None) => Err(function_not_found(function)),
            (Some(0), None) => Ok(Value::Null),
            _ => Err(Error::custom(
                "Error",
                format!(
                    "module '{}' failed with {}: {}",
                    self.path.display(),
                    status,
                    stderr.trim()
                ),
            )),
        }
    }
}
