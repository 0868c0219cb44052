//! # git-churn - Streaming History Extraction from the git CLI
//!
//! Turns the textual output of `git log --numstat`, `git diff --numstat -z` and
//! `cloc --git --diff --json` into typed records for churn, authorship and
//! file-coupling analytics. Everything is derived from the tools' stdout; the
//! repository object store is never opened directly.
//!
//! ## Key Features
//!
//! - **Streaming Segmentation**: Log lines are regrouped into per-commit buffers
//!   while the subprocess is still running
//! - **Fixed-Schema Parsing**: Sentinel-delimited headers tolerate commas and
//!   other delimiters inside commit subjects
//! - **Rename Resolution**: `a/{old => new}/b` and bare `old => new` notation
//!   resolve to either side of the move
//! - **Rename-Aware Diffs**: NUL-delimited numstat tokens classify into ordinary
//!   changes and rename/copy entries
//! - **Cut-Paste Detection**: Symmetric added/removed language statistics are
//!   flagged as likely moves
//! - **Failure Isolation**: Multi-repository runs keep going when one
//!   repository fails and report every failure with its command
//!
//! ## Architecture
//!
//! ```text
//! CommandRunner (process) ──lines──▶ CommitSegmenter ──buffers──▶ commit parser
//!                          ──blob───▶ split_diff_output ─tokens─▶ diff classifier
//!                          ──json───▶ language_diff ───────────▶ cut-paste flags
//!
//! Orchestrator: fans any of the above across repositories, bounded concurrency
//! ```
//!
//! ## Modules
//!
//! - [`process`]: Subprocess execution with timeouts and output caps
//! - [`git`]: Segmenter, parsers, rename normalizer, diff classifier, repository operations
//! - [`language_diff`]: cloc diff reports and the cut-paste classifier
//! - [`orchestrator`]: Bounded-concurrency fan-out with per-unit failure isolation
//! - [`discovery`]: Finding repositories below a directory
//! - [`config`]: Configuration management with environment variable support
//! - [`counters`]: Injected extraction counters
//! - [`error`]: Error types and result aliases
//! - [`paths`]: Platform config locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use git_churn::git::{GitRepo, LogOptions};
//! use git_churn::process::ProcessRunner;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> git_churn::error::Result<()> {
//!     let repo = GitRepo::new(Arc::new(ProcessRunner::default()), ".")?;
//!     for commit in repo.commits_with_files(&LogOptions::default()).await? {
//!         println!("{} +{} -{}", commit.header.short_hash, commit.lines_added(), commit.lines_deleted());
//!     }
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Atomic counters passed into the engine for instrumentation
pub mod counters;

/// Repository discovery with wildcard exclusions
pub mod discovery;

/// Error types and utilities
pub mod error;

/// Git history extraction through the command line
pub mod git;

/// Glob pattern helpers
pub mod glob_utils;

/// Language-level diff statistics and cut-paste classification
pub mod language_diff;

/// Multi-unit fan-out with failure isolation
pub mod orchestrator;

/// Platform-specific configuration paths
pub mod paths;

/// Subprocess runner abstraction and tokio implementation
pub mod process;
