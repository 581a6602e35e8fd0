//! Package path resolution
//!
//! The package argument is either a plain path or a glob pattern (`*`, `?`,
//! `**`, `[...]` classes and `{a,b}` alternatives). A pattern must resolve to
//! exactly one file.

use crate::core::error::StoreError;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const GLOB_CHARS: [char; 4] = ['*', '?', '[', '{'];

/// Resolve `pattern` to a single existing file
///
/// # Examples
///
/// ```no_run
/// use webstore_publisher::orchestration::resolve_package;
///
/// let package = resolve_package("dist/*.{zip,crx}").unwrap();
/// println!("uploading {}", package.display());
/// ```
pub fn resolve_package(pattern: &str) -> Result<PathBuf, StoreError> {
    let pattern = pattern.trim();
    let not_found = || StoreError::PackageNotFound {
        pattern: pattern.to_string(),
    };

    let literal = PathBuf::from(pattern);
    if literal.is_file() {
        return Ok(literal);
    }

    let normalized = pattern.strip_prefix("./").unwrap_or(pattern);
    if !has_glob(normalized) {
        return Err(not_found());
    }

    let (base, tail) = split_base(normalized);
    let matcher = compile(pattern, &tail)?;

    // Only `**` can match below the pattern's own depth
    let depth = tail.split('/').count();
    let mut walker = WalkDir::new(&base).min_depth(1);
    if !tail.contains("**") {
        walker = walker.min_depth(depth).max_depth(depth);
    }

    debug!("Searching {} for {}", base.display(), tail);

    let mut matches: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(&base).ok()?;
            if !matcher.is_match(relative) {
                return None;
            }
            Some(if base == Path::new(".") {
                relative.to_path_buf()
            } else {
                entry.path().to_path_buf()
            })
        })
        .collect();
    matches.sort();

    match matches.len() {
        0 => Err(not_found()),
        1 => Ok(matches.remove(0)),
        _ => Err(StoreError::MultiplePackages {
            pattern: pattern.to_string(),
            matches: matches.iter().map(|p| p.display().to_string()).collect(),
        }),
    }
}

fn has_glob(text: &str) -> bool {
    text.contains(GLOB_CHARS)
}

/// Split into the leading directory with no glob characters and the rest
fn split_base(pattern: &str) -> (PathBuf, String) {
    let parts: Vec<&str> = pattern.split('/').collect();
    let split = parts
        .iter()
        .position(|part| has_glob(part))
        .unwrap_or(parts.len());

    let base = parts[..split].join("/");
    let base = if base.is_empty() {
        if pattern.starts_with('/') {
            PathBuf::from("/")
        } else {
            PathBuf::from(".")
        }
    } else {
        PathBuf::from(base)
    };

    (base, parts[split..].join("/"))
}

fn compile(pattern: &str, glob: &str) -> Result<GlobMatcher, StoreError> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| StoreError::Config(format!("invalid package pattern {}: {}", pattern, e)))
}
