//! apisuite - declarative API test runner
//!
//! Runs YAML suite files against HTTP APIs and exits with the number of
//! failed suites.

use apisuite::cli;
use apisuite::commands::Cli;
use apisuite::common::logging;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        logging::init_verbose();
    } else {
        logging::init_cli();
    }

    match cli::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
