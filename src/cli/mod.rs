//! CLI command handling
//!
//! Turns parsed arguments into a launcher run and returns the exit code.

pub mod discover;

use std::path::PathBuf;
use std::sync::Arc;

use crate::commands::Cli;
use crate::common::config::Config;
use crate::common::paths::absolutize;
use crate::common::{Error, Result};
use crate::hooks::HookRegistry;
use crate::http::ReqwestClient;
use crate::report::{self, ReporterOptions};
use crate::runner::{Launcher, RunnerSettings};
use crate::suite::matcher::Pattern;

/// Directory searched when no paths are given
const DEFAULT_DIR: &str = "specs";

/// Run the CLI; the returned code is the number of failed suites
pub async fn run(cli: Cli) -> Result<i32> {
    if cli.reporters {
        print_reporters();
        return Ok(0);
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let files = suite_files(&cli.paths, cli.recursive)?;
    println!(
        "Found suites:\n{}",
        files
            .iter()
            .map(|f| format!("  - {}", f.display()))
            .collect::<Vec<_>>()
            .join("\n")
    );

    let parallel = parallelism(cli.parallel, config.parallel.max_limit)?;
    let grep = cli
        .grep
        .as_deref()
        .map(Pattern::parse)
        .transpose()
        .map_err(|e| Error::config(format!("invalid --grep pattern: {}", e)))?;

    let options = match &cli.reporter_options {
        Some(text) => ReporterOptions::parse(text, &config.report)?,
        None => ReporterOptions::new(&config.report),
    };
    let reporters = report::build(&cli.reporter, &options)?;

    let settings = RunnerSettings::from_config(&config).with_grep(grep);
    let mut launcher = Launcher::new(Arc::new(ReqwestClient::new()?), HookRegistry::new(), settings);
    if let Some(limit) = parallel {
        launcher = launcher.parallel(limit);
    }

    let summary = launcher.run(files, reporters).await?;
    Ok(i32::try_from(summary.failed_count()).unwrap_or(i32::MAX))
}

fn print_reporters() {
    println!();
    for (name, description) in report::AVAILABLE {
        println!("    {} - {}", name, description);
    }
    println!();
}

/// Resolve every argument to absolute suite file paths
fn suite_files(paths: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut args = paths.to_vec();
    if args.is_empty() {
        eprintln!("Test Suite path/pattern/directory is not specified, Looking for suites in specs directory");
        if !PathBuf::from(DEFAULT_DIR).is_dir() {
            return Err(Error::config(
                "'specs' directory does not exist. You can specify a path as 'apisuite /path/to/suite.yml'",
            ));
        }
        args.push(DEFAULT_DIR.to_string());
    }

    let mut files = Vec::new();
    for arg in &args {
        let found = discover::find_suite_files(arg, recursive)?;
        if found.is_empty() {
            eprintln!("Warning: No suites found using path/pattern {}", arg);
        }
        files.extend(found.iter().map(|f| absolutize(f)));
    }

    if files.is_empty() {
        return Err(Error::config("No test suites found"));
    }
    Ok(files)
}

/// `--parallel` must be above one and within the configured limit
fn parallelism(requested: Option<usize>, max_limit: usize) -> Result<Option<usize>> {
    match requested {
        None => Ok(None),
        Some(n) if n > 1 && n <= max_limit => Ok(Some(n)),
        Some(n) => Err(Error::config(format!(
            "Given argument for parallel option {} is invalid, Please provide a number (> 1 and <= {})",
            n, max_limit
        ))),
    }
}
