//! Common utilities shared between the CLI and the runner

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, ErrorKind, ErrorReport, Result};

/// Format a duration in milliseconds as `1m2s.345ms`, or `1h2m3s.45ms` once it
/// reaches an hour
pub fn human_duration(millis: u64) -> String {
    let ms = millis % 1000;
    let seconds = (millis / 1000) % 60;
    let minutes = (millis / (1000 * 60)) % 60;
    let hours = millis / (1000 * 60 * 60);

    if hours == 0 {
        format!("{}m{}s.{}ms", minutes, seconds, ms)
    } else {
        format!("{}h{}m{}s.{}ms", hours, minutes, seconds, ms)
    }
}
