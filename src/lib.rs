//! apisuite - declarative API test runner
//!
//! Suites are YAML documents describing a target, hooks and an ordered list
//! of specs. Each spec builds an HTTP request, sends it and validates the
//! response. This library loads suites, runs them and reports the results.

pub mod cli;
pub mod commands;
pub mod common;
pub mod hooks;
pub mod http;
pub mod report;
pub mod request;
pub mod runner;
pub mod suite;
pub mod validate;

// Re-export commonly used types for tests
pub use common::{Error, ErrorKind, Result};
pub use runner::{Launcher, RunSummary, RunnerSettings, Status};
