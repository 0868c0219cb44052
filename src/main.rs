use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use git_churn::config::Config;
use git_churn::counters::ExtractionCounters;
use git_churn::discovery::RepoDiscovery;
use git_churn::error::UnitFailure;
use git_churn::git::{CommitCompact, CommitWithFiles, GitRepo, LogOptions};
use git_churn::language_diff::LanguageDiffer;
use git_churn::orchestrator::{BatchOutcome, Orchestrator};
use git_churn::process::{CommandRunner, ProcessRunner};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Extract commit history, numstat churn and rename-aware diffs as JSON lines
#[derive(Parser, Debug)]
#[command(author, version = VERSION, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "GIT_CHURN_CONFIG")]
    config: Option<PathBuf>,

    /// Repositories processed at the same time by multi-repository commands
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Commits with per-file numstat changes
    Log {
        repo: PathBuf,
        #[command(flatten)]
        filter: LogArgs,
    },
    /// Compact history (sha, date, author, subject) of every repository under a root
    History {
        root: PathBuf,
        #[command(flatten)]
        filter: LogArgs,
    },
    /// Rename-aware numstat diff between two revisions
    Diff { repo: PathBuf, from: String, to: String },
    /// Per-language cloc statistics between two revisions
    LanguageDiff { repo: PathBuf, from: String, to: String },
    /// Committer date of a commit's first parent (epoch for a root commit)
    ParentDate { repo: PathBuf, sha: String },
    /// Commits with file changes for every repository under a root
    Scan {
        root: PathBuf,
        #[command(flatten)]
        filter: LogArgs,
    },
    /// Fetch every repository under a root
    Fetch { root: PathBuf },
    /// Fast-forward pull every repository under a root
    Pull { root: PathBuf },
    /// List repositories under a root
    Repos { root: PathBuf },
}

#[derive(Args, Debug, Clone, Default)]
struct LogArgs {
    /// Revision or range, e.g. `v1.0..HEAD`
    #[arg(long)]
    rev: Option<String>,

    #[arg(long)]
    since: Option<String>,

    #[arg(long)]
    until: Option<String>,

    #[arg(long)]
    max_count: Option<usize>,

    #[arg(long)]
    no_merges: bool,

    /// Limit to these paths
    #[arg(last = true)]
    paths: Vec<String>,
}

impl From<LogArgs> for LogOptions {
    fn from(args: LogArgs) -> Self {
        LogOptions {
            revision_range: args.rev,
            since: args.since,
            until: args.until,
            max_count: args.max_count,
            no_merges: args.no_merges,
            paths: args.paths,
        }
    }
}

/// One JSON line on stdout
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Commit {
        repo: &'a str,
        #[serde(flatten)]
        commit: &'a CommitWithFiles,
    },
    History(&'a CommitCompact),
    Repo {
        path: &'a Path,
    },
    Done {
        repo: &'a str,
    },
    Failure(&'a UnitFailure),
}

fn emit<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

struct App {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    counters: Arc<ExtractionCounters>,
    cancel: CancellationToken,
}

impl App {
    fn repo(&self, path: &Path) -> git_churn::error::Result<GitRepo> {
        Ok(GitRepo::with_config(self.runner.clone(), path, &self.config.git)?
            .with_counters(self.counters.clone()))
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::from_config(&self.config.orchestrator).with_cancellation(self.cancel.clone())
    }

    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        Ok(RepoDiscovery::from_config(root, &self.config.discovery).discover()?)
    }

    async fn run(&self, command: Command) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();

        match command {
            Command::Log { repo, filter } => {
                let git = self.repo(&repo)?;
                let unit = git.unit_id();
                let mut commits = git.commit_stream(&filter.into())?;
                while let Some(commit) = commits.next().await {
                    emit(&mut out, &Record::Commit { repo: &unit, commit: &commit? })?;
                }
            }
            Command::History { root, filter } => {
                let opts: LogOptions = filter.into();
                let repos = self.discover(&root)?;
                let outcome = self
                    .orchestrator()
                    .run(repos, |path| {
                        let git = self.repo(&path)?;
                        let opts = opts.clone();
                        Ok(async move {
                            let id = git.unit_id();
                            git.compact_history(&id, &opts).await
                        })
                    })
                    .await?;
                for success in &outcome.successes {
                    for commit in &success.value {
                        emit(&mut out, &Record::History(commit))?;
                    }
                }
                report_failures(&mut out, &outcome)?;
            }
            Command::Diff { repo, from, to } => {
                for entry in self.repo(&repo)?.diff(&from, &to).await? {
                    emit(&mut out, &entry)?;
                }
            }
            Command::LanguageDiff { repo, from, to } => {
                let differ = LanguageDiffer::new(self.runner.clone(), &self.config.cloc);
                let report = differ.diff(&repo, &from, &to).await?;
                emit(&mut out, &report)?;
            }
            Command::ParentDate { repo, sha } => {
                let date = self.repo(&repo)?.parent_commit_date(&sha).await?;
                emit(&mut out, &date.to_rfc3339())?;
            }
            Command::Scan { root, filter } => {
                let opts: LogOptions = filter.into();
                let repos = self.discover(&root)?;
                let outcome = self
                    .orchestrator()
                    .run(repos, |path| {
                        let git = self.repo(&path)?;
                        let opts = opts.clone();
                        Ok(async move { git.commits_with_files(&opts).await })
                    })
                    .await?;
                for success in &outcome.successes {
                    for commit in &success.value {
                        emit(&mut out, &Record::Commit { repo: &success.unit, commit })?;
                    }
                }
                report_failures(&mut out, &outcome)?;
            }
            Command::Fetch { root } => {
                let repos = self.discover(&root)?;
                let outcome = self
                    .orchestrator()
                    .run(repos, |path| {
                        let git = self.repo(&path)?;
                        Ok(async move { git.fetch().await })
                    })
                    .await?;
                for success in &outcome.successes {
                    emit(&mut out, &Record::Done { repo: &success.unit })?;
                }
                report_failures(&mut out, &outcome)?;
            }
            Command::Pull { root } => {
                let repos = self.discover(&root)?;
                let outcome = self
                    .orchestrator()
                    .run(repos, |path| {
                        let git = self.repo(&path)?;
                        Ok(async move { git.pull().await })
                    })
                    .await?;
                for success in &outcome.successes {
                    emit(&mut out, &Record::Done { repo: &success.unit })?;
                }
                report_failures(&mut out, &outcome)?;
            }
            Command::Repos { root } => {
                for path in self.discover(&root)? {
                    emit(&mut out, &Record::Repo { path: &path })?;
                }
            }
        }

        out.flush()?;
        Ok(())
    }
}

fn report_failures<T>(out: &mut impl Write, outcome: &BatchOutcome<T>) -> Result<()> {
    for failure in &outcome.failures {
        emit(out, &Record::Failure(failure))?;
    }
    if !outcome.is_clean() {
        anyhow::bail!(
            "{} of {} repositories failed",
            outcome.failures.len(),
            outcome.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON lines only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::with_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::new()?,
    };
    if let Some(concurrency) = cli.concurrency {
        config.orchestrator.concurrency = concurrency;
    }

    let counters = Arc::new(ExtractionCounters::new());
    let runner = ProcessRunner::from_config(&config.process).with_counters(counters.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing running repositories");
            on_interrupt.cancel();
        }
    });

    let app = App {
        config,
        runner: Arc::new(runner),
        counters: counters.clone(),
        cancel,
    };
    let result = app.run(cli.command).await;

    tracing::info!("Extraction counters: {:?}", counters.snapshot());
    result
}
