//! Repository discovery under a root directory

use crate::config::DiscoveryConfig;
use crate::error::{Result, ValidationError};
use crate::glob_utils::{compile_patterns, matches_any};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds git working trees below a root directory
pub struct RepoDiscovery {
    root: PathBuf,
    exclude_patterns: Vec<String>,
    max_depth: usize,
}

impl RepoDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            exclude_patterns: Vec::new(),
            max_depth: usize::MAX,
        }
    }

    pub fn from_config(root: impl AsRef<Path>, config: &DiscoveryConfig) -> Self {
        Self::new(root)
            .with_exclude_patterns(config.exclude_patterns.clone())
            .with_max_depth(config.max_depth)
    }

    /// Directory names (or relative paths) matching any pattern are skipped
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Walk the root and collect every directory that contains `.git`.
    ///
    /// The walk does not descend into a repository once found, so submodules
    /// and nested checkouts are not reported separately.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(ValidationError::PathNotFound(self.root.display().to_string()).into());
        }
        if !self.root.is_dir() {
            return Err(ValidationError::NotADirectory(self.root.display().to_string()).into());
        }

        let excludes = compile_patterns(&self.exclude_patterns)?;
        let mut repos = Vec::new();
        let mut walker = WalkDir::new(&self.root)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if entry.depth() > 0 {
                if entry.file_name() == ".git" {
                    walker.skip_current_dir();
                    continue;
                }
                let relative = path.strip_prefix(&self.root).unwrap_or(path);
                if matches_any(&excludes, &relative.to_string_lossy()) {
                    tracing::debug!("Excluded {}", path.display());
                    walker.skip_current_dir();
                    continue;
                }
            }

            if path.join(".git").exists() {
                tracing::debug!("Found repository {}", path.display());
                repos.push(path.to_path_buf());
                walker.skip_current_dir();
            }
        }

        tracing::info!(
            "Discovered {} repositories under {}",
            repos.len(),
            self.root.display()
        );
        Ok(repos)
    }
}

/// Convenience wrapper around [`RepoDiscovery`]
pub fn discover_repositories(
    root: &Path,
    exclude_patterns: &[String],
    max_depth: usize,
) -> Result<Vec<PathBuf>> {
    RepoDiscovery::new(root)
        .with_exclude_patterns(exclude_patterns.to_vec())
        .with_max_depth(max_depth)
        .discover()
}
