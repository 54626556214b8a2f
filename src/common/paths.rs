//! Configuration paths and suite-relative file resolution

use std::path::{Component, Path, PathBuf};

/// Name used for the configuration directory
const APP_NAME: &str = "apisuite";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/apisuite/`
/// - macOS: `~/Library/Application Support/apisuite/`
/// - Windows: `%APPDATA%\apisuite\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Resolves files referenced from a suite document
///
/// Suites that set `meta.locate_files_relative` resolve against their own
/// directory; everything else resolves against the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResolver {
    base: PathBuf,
}

impl FileResolver {
    pub fn new(suite_file: &Path, relative_to_suite: bool) -> Self {
        let base = if relative_to_suite {
            suite_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        };
        Self {
            base: absolutize(&base),
        }
    }

    /// Resolver rooted at an explicit directory
    pub fn rooted_at(base: impl Into<PathBuf>) -> Self {
        Self {
            base: absolutize(&base.into()),
        }
    }

    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.base.join(path))
        }
    }
}

/// Make a path absolute against the working directory without touching the
/// filesystem
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        normalize(&cwd.join(path))
    }
}

/// Lexically collapse `.` and `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
