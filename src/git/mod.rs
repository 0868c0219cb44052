//! Git history extraction through the `git` command line
//!
//! Provides the streaming pipeline that turns `git log` / `git diff` output into
//! typed records: segmentation into per-commit buffers, fixed-schema field
//! parsing, rename resolution and diff token classification.

/// Commit records and their field parsers
pub mod commit;
/// NUL-delimited numstat diff classification
pub mod diff;
/// Repository handle and history queries
pub mod history;
/// Fetch, pull and checkout with typed unit failures
pub mod ops;
/// Brace and bare rename notation resolution
pub mod rename;
/// Sentinel-based regrouping of log lines into commit buffers
pub mod segmenter;

pub use commit::{CommitCompact, CommitHeader, CommitWithFiles, FileChange};
pub use diff::DiffEntry;
pub use history::{GitRepo, LogOptions, read_commit_log};
pub use rename::{RenameSide, normalize_rename};
pub use segmenter::{CommitSegmenter, DEFAULT_SENTINEL, segment_lines, segment_stream};
