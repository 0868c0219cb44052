//! Repository handle and history queries built on the `git` CLI

use super::commit::{CommitCompact, CommitWithFiles, parse_commit_buffer, parse_compact_line};
use super::diff::{DiffEntry, classify_diff_tokens, split_diff_output};
use super::segmenter::{segment_lines, segment_stream};
use crate::config::GitConfig;
use crate::counters::ExtractionCounters;
use crate::error::{ChurnError, FormatError, LogSource, Result, ToolErrorKind, ValidationError};
use crate::process::{CommandRunner, CommandSpec};
use chrono::{DateTime, FixedOffset, Utc};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filters applied to `git log` invocations
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Revision or range such as `main` or `v1.0..HEAD`; defaults to HEAD
    pub revision_range: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub max_count: Option<usize>,
    pub no_merges: bool,
    /// Restrict to these pathspecs
    pub paths: Vec<String>,
}

impl LogOptions {
    fn push_args(&self, args: &mut Vec<String>) -> Result<()> {
        if let Some(since) = &self.since {
            args.push(format!("--since={}", since));
        }
        if let Some(until) = &self.until {
            args.push(format!("--until={}", until));
        }
        if let Some(max) = self.max_count {
            args.push(format!("--max-count={}", max));
        }
        if self.no_merges {
            args.push("--no-merges".to_string());
        }
        if let Some(range) = &self.revision_range {
            validate_ref(range)?;
            args.push(range.clone());
        }
        if !self.paths.is_empty() {
            args.push("--".to_string());
            args.extend(self.paths.iter().cloned());
        }
        Ok(())
    }
}

/// Reject refs that git would read as options or that carry control characters
pub(crate) fn validate_ref(r: &str) -> Result<()> {
    if r.is_empty() || r.starts_with('-') || r.contains(['\0', '\n', '\r']) {
        return Err(ValidationError::InvalidRef(r.to_string()).into());
    }
    Ok(())
}

/// A repository on disk plus the runner used to query it
#[derive(Clone)]
pub struct GitRepo {
    runner: Arc<dyn CommandRunner>,
    path: PathBuf,
    program: String,
    sentinel: String,
    rename_threshold: u8,
    counters: Option<Arc<ExtractionCounters>>,
}

impl GitRepo {
    pub fn new(runner: Arc<dyn CommandRunner>, path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(runner, path, &GitConfig::default())
    }

    /// Fails with a validation error when `path` is empty
    pub fn with_config(
        runner: Arc<dyn CommandRunner>,
        path: impl AsRef<Path>,
        config: &GitConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ValidationError::MissingArgument("repository path".to_string()).into());
        }

        Ok(Self {
            runner,
            path: path.to_path_buf(),
            program: config.program.clone(),
            sentinel: config.sentinel.clone(),
            rename_threshold: config.rename_threshold,
            counters: None,
        })
    }

    pub fn with_counters(mut self, counters: Arc<ExtractionCounters>) -> Self {
        self.counters = Some(counters);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Identifier used when attributing records and failures to this repository
    pub fn unit_id(&self) -> String {
        self.path.display().to_string()
    }

    pub(crate) fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub(crate) fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(&self.program)
            .current_dir(&self.path)
            .args(args)
    }

    /// `--format` argument producing one sentinel-delimited header per commit
    pub fn log_format(&self) -> String {
        let s = &self.sentinel;
        format!("--format={s}%h{s}%aI{s}%an{s}%cn{s}%cI{s}%s{s}%p")
    }

    pub fn log_command(&self, opts: &LogOptions) -> Result<CommandSpec> {
        let mut args = vec![
            "-c".to_string(),
            "core.quotepath=off".to_string(),
            "log".to_string(),
            "--numstat".to_string(),
            "--no-color".to_string(),
            self.log_format(),
        ];
        opts.push_args(&mut args)?;
        Ok(self.command(args))
    }

    /// Stream commits with their numstat file changes as git produces them
    pub fn commit_stream(
        &self,
        opts: &LogOptions,
    ) -> Result<BoxStream<'static, Result<CommitWithFiles>>> {
        let spec = self.log_command(opts)?;
        let sentinel = self.sentinel.clone();
        let counters = self.counters.clone();
        let lines = self.runner.lines(&spec);

        Ok(segment_stream(lines, &self.sentinel)
            .map(move |buffer| -> Result<CommitWithFiles> {
                let commit = parse_commit_buffer(&buffer?, &sentinel, &LogSource::Stream)?;
                if let Some(counters) = &counters {
                    counters.record_commit(commit.files.len());
                }
                Ok(commit)
            })
            .boxed())
    }

    /// Collect the whole log; the first malformed commit fails the call
    pub async fn commits_with_files(&self, opts: &LogOptions) -> Result<Vec<CommitWithFiles>> {
        let commits: Vec<CommitWithFiles> = self.commit_stream(opts)?.try_collect().await?;
        tracing::info!(
            "Extracted {} commits from {}",
            commits.len(),
            self.path.display()
        );
        Ok(commits)
    }

    pub fn compact_command(&self, opts: &LogOptions) -> Result<CommandSpec> {
        let mut args = vec![
            "log".to_string(),
            "--no-color".to_string(),
            "--format=%H,%aI,%an,%s".to_string(),
        ];
        opts.push_args(&mut args)?;
        Ok(self.command(args))
    }

    /// Lightweight history scan, one [`CommitCompact`] per commit
    pub async fn compact_history(
        &self,
        repo_id: &str,
        opts: &LogOptions,
    ) -> Result<Vec<CommitCompact>> {
        let spec = self.compact_command(opts)?;
        let mut lines = self.runner.lines(&spec);
        let mut commits = Vec::new();

        while let Some(line) = lines.next().await {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            commits.push(parse_compact_line(&line, repo_id)?);
        }

        tracing::debug!("Scanned {} commits in {}", commits.len(), repo_id);
        Ok(commits)
    }

    pub fn diff_command(&self, from: &str, to: &str) -> Result<CommandSpec> {
        validate_ref(from)?;
        validate_ref(to)?;
        Ok(self.command([
            "-c".to_string(),
            "core.quotepath=off".to_string(),
            "diff".to_string(),
            "--numstat".to_string(),
            "-z".to_string(),
            format!("-M{}%", self.rename_threshold),
            from.to_string(),
            to.to_string(),
        ]))
    }

    /// Rename-aware numstat diff between two revisions
    pub async fn diff(&self, from: &str, to: &str) -> Result<Vec<DiffEntry>> {
        let spec = self.diff_command(from, to)?;
        let raw = self.runner.run(&spec).await?;
        let tokens = split_diff_output(&raw);
        let entries = classify_diff_tokens(&tokens)?;

        if let Some(counters) = &self.counters {
            counters.record_diff_entries(entries.len());
        }
        Ok(entries)
    }

    /// Committer date of `sha`'s first parent.
    ///
    /// A root commit has no parent; git reports that as an unknown revision and
    /// the Unix epoch is returned instead.
    pub async fn parent_commit_date(&self, sha: &str) -> Result<DateTime<FixedOffset>> {
        validate_ref(sha)?;
        let spec = self.command([
            "log".to_string(),
            "-1".to_string(),
            "--format=%cI".to_string(),
            format!("{}^", sha),
        ]);

        match self.runner.run(&spec).await {
            Ok(out) => DateTime::parse_from_rfc3339(out.trim()).map_err(|e| {
                ChurnError::from(FormatError::InvalidDate {
                    value: out.trim().to_string(),
                    reason: e.to_string(),
                    origin: LogSource::Stream,
                })
            }),
            Err(e) if e.kind() == ToolErrorKind::UnknownRevision => {
                tracing::debug!("{} has no parent, using epoch", sha);
                Ok(DateTime::<Utc>::UNIX_EPOCH.fixed_offset())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse a saved `git log` output file.
///
/// A missing file means the log was not computed yet and yields no commits.
pub async fn read_commit_log(path: &Path, sentinel: &str) -> Result<Vec<CommitWithFiles>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("Commit log {} not found, treating as empty", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let origin = LogSource::File(path.to_path_buf());
    segment_lines(content.lines().map(String::from), sentinel)
        .map(|buffer| parse_commit_buffer(&buffer, sentinel, &origin).map_err(ChurnError::from))
        .collect()
}
