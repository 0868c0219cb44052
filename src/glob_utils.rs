//! Glob pattern matching for repository discovery exclusions

use crate::error::ValidationError;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compile `patterns` into one [`GlobSet`]
///
/// An invalid pattern is a validation error naming the pattern.
///
/// # Examples
///
/// ```
/// use git_churn::glob_utils::{compile_patterns, matches_any};
///
/// let set = compile_patterns(&["node_modules".to_string(), "*.bak".to_string()]).unwrap();
/// assert!(matches_any(&set, "/work/app/node_modules"));
/// assert!(matches_any(&set, "archive.bak"));
/// assert!(!matches_any(&set, "/work/app/src"));
/// ```
pub fn compile_patterns(patterns: &[String]) -> Result<GlobSet, ValidationError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ValidationError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ValidationError::InvalidPattern(e.to_string()))
}

/// Check a path against the set: the whole path, the path without a leading
/// slash, and every trailing run of components
pub fn matches_any(set: &GlobSet, path: &str) -> bool {
    if set.is_empty() {
        return false;
    }

    if set.is_match(path) {
        return true;
    }

    let path_no_slash = path.trim_start_matches('/');
    if set.is_match(path_no_slash) {
        return true;
    }

    // "vendor" should match "/abs/path/to/vendor"
    let parts: Vec<&str> = path_no_slash.split('/').collect();
    (1..parts.len()).any(|i| set.is_match(parts[i..].join("/")))
}
