//! Suite file discovery from command line paths

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

const EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Expand one command line argument into suite files
///
/// The argument may name a file, a file without its `.yml`/`.yaml`
/// extension, a directory or a glob pattern. Directories contribute their
/// suite files, and those of sub-directories when `recursive` is set. An
/// argument that matches nothing yields no files.
pub fn find_suite_files(arg: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let path = Path::new(arg);
    if path.exists() {
        return expand(path, recursive);
    }

    for extension in EXTENSIONS {
        let candidate = PathBuf::from(format!("{}.{}", arg, extension));
        if candidate.exists() {
            return expand(&candidate, recursive);
        }
    }

    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };
    let matches: Vec<PathBuf> = glob::glob_with(arg, options)
        .map_err(|e| Error::config(format!("invalid pattern {}: {}", arg, e)))?
        .filter_map(|entry| entry.ok())
        .collect();
    Ok(matches)
}

fn expand(path: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    let mut files = Vec::new();
    for entry in entries {
        if entry.is_dir() {
            if recursive {
                files.extend(expand(&entry, recursive)?);
            }
            continue;
        }
        if entry.is_file() && is_suite_file(&entry) {
            files.push(entry);
        }
    }
    Ok(files)
}

fn is_suite_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(true, |name| name.starts_with('.'));
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext));
    !hidden && extension
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("users.yml"), "").unwrap();
        fs::write(root.join("orders.yaml"), "").unwrap();
        fs::write(root.join(".hidden.yml"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("deep.yml"), "").unwrap();
        dir
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_directory() {
        let dir = tree();
        let arg = dir.path().to_str().unwrap();

        assert_eq!(names(&find_suite_files(arg, false).unwrap()), vec!["orders.yaml", "users.yml"]);
        assert_eq!(
            names(&find_suite_files(arg, true).unwrap()),
            vec!["deep.yml", "orders.yaml", "users.yml"]
        );
    }

    #[test]
    fn test_name_without_extension() {
        let dir = tree();
        let arg = dir.path().join("orders");
        let files = find_suite_files(arg.to_str().unwrap(), false).unwrap();
        assert_eq!(names(&files), vec!["orders.yaml"]);
    }

    #[test]
    fn test_glob_and_no_match() {
        let dir = tree();
        let pattern = format!("{}/*.yml", dir.path().display());
        assert_eq!(names(&find_suite_files(&pattern, false).unwrap()), vec!["users.yml"]);

        let missing = format!("{}/none-*.yml", dir.path().display());
        assert!(find_suite_files(&missing, false).unwrap().is_empty());
    }
}
