//! CLI argument definitions
//!
//! Defines the clap parser for the suite runner.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "apisuite", about = "Declarative API test runner for YAML suites")]
#[command(version, long_about = None)]
pub struct Cli {
    /// Suite files, directories, names without extension, or glob patterns
    /// (defaults to the `specs` directory)
    pub paths: Vec<String>,

    /// Include sub-directories when searching directories for suites
    #[arg(long)]
    pub recursive: bool,

    /// Number of suites to run in parallel
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Reporters to use, comma separated (e.g. specs,json,html)
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    pub reporter: Vec<String>,

    /// Reporter specific options: jsonReportDir, jsonReportName, htmlReportDir, htmlReportName, logRequests
    #[arg(long = "reporter-options", value_name = "K=V,...")]
    pub reporter_options: Option<String>,

    /// Only run specs whose name matches: `pattern` or `/pattern/flags`
    #[arg(long, value_name = "PATTERN")]
    pub grep: Option<String>,

    /// Display available reporters and exit
    #[arg(long)]
    pub reporters: bool,

    /// Log runner internals to stderr
    #[arg(long, short)]
    pub verbose: bool,

    /// Runner configuration file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let cli = Cli::parse_from([
            "apisuite",
            "specs/users",
            "--parallel",
            "4",
            "--reporter",
            "specs,json",
            "--reporter-options",
            "jsonReportDir=out,logRequests",
            "--grep",
            "/user/i",
            "--recursive",
        ]);
        assert_eq!(cli.paths, vec!["specs/users"]);
        assert_eq!(cli.parallel, Some(4));
        assert_eq!(cli.reporter, vec!["specs", "json"]);
        assert_eq!(cli.reporter_options.as_deref(), Some("jsonReportDir=out,logRequests"));
        assert_eq!(cli.grep.as_deref(), Some("/user/i"));
        assert!(cli.recursive);
        assert!(!cli.reporters);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["apisuite"]);
        assert!(cli.paths.is_empty());
        assert!(cli.parallel.is_none());
        assert!(cli.reporter.is_empty());
    }
}
