/// Integration tests driving a real `git` binary; skipped when git is not on PATH
use anyhow::Result;
use git_churn::config::GitConfig;
use git_churn::error::{ChurnError, FailureKind, ToolErrorKind};
use git_churn::git::{GitRepo, LogOptions};
use git_churn::orchestrator::Orchestrator;
use git_churn::process::ProcessRunner;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

macro_rules! require_git {
    () => {
        if !git_available() {
            eprintln!("git not found on PATH, skipping");
            return Ok(());
        }
    };
}

fn git(dir: &Path, args: &[&str], date: &str) -> String {
    let output = Command::new("git")
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_AUTHOR_NAME", "Ada Lovelace")
        .env("GIT_AUTHOR_EMAIL", "ada@example.com")
        .env("GIT_COMMITTER_NAME", "Grace Hopper")
        .env("GIT_COMMITTER_EMAIL", "grace@example.com")
        .env("GIT_AUTHOR_DATE", date)
        .env("GIT_COMMITTER_DATE", date)
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

struct Fixture {
    _dir: TempDir,
    path: PathBuf,
    root_sha: String,
    rename_sha: String,
}

/// Three commits: root with two files, a rename with one added line, a binary file
fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app");
    std::fs::create_dir_all(path.join("src")).unwrap();

    git(&path, &["init", "-q"], "2024-01-01T12:00:00+00:00");

    let body: String = (1..=10).map(|i| format!("line {i}\n")).collect();
    std::fs::write(path.join("src/a.txt"), &body).unwrap();
    std::fs::write(path.join("README.md"), "# app\n\nintro\n").unwrap();
    git(&path, &["add", "."], "2024-01-01T12:00:00+00:00");
    git(&path, &["commit", "-q", "-m", "Add readme, intro"], "2024-01-01T12:00:00+00:00");
    let root_sha = git(&path, &["rev-parse", "HEAD"], "2024-01-01T12:00:00+00:00");

    std::fs::create_dir_all(path.join("lib")).unwrap();
    git(&path, &["mv", "src/a.txt", "lib/a.txt"], "2024-01-02T12:00:00+00:00");
    std::fs::write(path.join("lib/a.txt"), format!("{body}line 11\n")).unwrap();
    git(&path, &["add", "."], "2024-01-02T12:00:00+00:00");
    git(&path, &["commit", "-q", "-m", "Move a to lib"], "2024-01-02T12:00:00+00:00");
    let rename_sha = git(&path, &["rev-parse", "HEAD"], "2024-01-02T12:00:00+00:00");

    std::fs::write(path.join("logo.bin"), [0u8, 159, 146, 150, 0, 1, 2]).unwrap();
    git(&path, &["add", "."], "2024-01-03T12:00:00+00:00");
    git(&path, &["commit", "-q", "-m", "Add logo"], "2024-01-03T12:00:00+00:00");

    Fixture {
        _dir: dir,
        path,
        root_sha,
        rename_sha,
    }
}

fn open(path: &Path) -> GitRepo {
    GitRepo::new(Arc::new(ProcessRunner::default()), path).unwrap()
}

#[tokio::test]
async fn test_commits_with_files_from_real_log() -> Result<()> {
    require_git!();
    let fx = fixture();

    let commits = open(&fx.path).commits_with_files(&LogOptions::default()).await?;
    assert_eq!(commits.len(), 3);

    let logo = &commits[0];
    assert_eq!(logo.header.subject, "Add logo");
    assert_eq!(logo.files.len(), 1);
    assert_eq!(logo.files[0].path, "logo.bin");
    assert_eq!(logo.files[0].lines_added, 0);

    let rename = &commits[1];
    assert!(rename_sha_matches(&fx.rename_sha, &rename.header.short_hash));
    assert_eq!(rename.files.len(), 1);
    assert_eq!(rename.files[0].path, "lib/a.txt");
    assert_eq!(rename.files[0].lines_added, 1);

    let root = &commits[2];
    assert!(root.header.is_root());
    assert_eq!(root.header.subject, "Add readme; intro");
    assert_eq!(root.header.author_name, "Ada Lovelace");
    assert_eq!(root.header.committer_name, "Grace Hopper");
    assert_eq!(root.header.author_date.to_rfc3339(), "2024-01-01T12:00:00+00:00");
    assert_eq!(root.lines_added(), 13);

    Ok(())
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_latin1_filename_does_not_fail_history() -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    require_git!();
    let dir = TempDir::new()?;
    let path = dir.path().join("latin1");
    std::fs::create_dir_all(&path)?;
    git(&path, &["init", "-q"], "2024-02-01T12:00:00+00:00");

    std::fs::write(path.join(OsStr::from_bytes(b"caf\xe9.txt")), "one\ntwo\n")?;
    std::fs::write(path.join("plain.txt"), "x\n")?;
    git(&path, &["add", "."], "2024-02-01T12:00:00+00:00");
    git(&path, &["commit", "-q", "-m", "Add menu"], "2024-02-01T12:00:00+00:00");

    let commits = open(&path).commits_with_files(&LogOptions::default()).await?;
    assert_eq!(commits.len(), 1);

    let files = &commits[0].files;
    assert_eq!(files.len(), 2);
    let cafe = files
        .iter()
        .find(|f| f.path.starts_with("caf"))
        .expect("latin-1 file is reported");
    assert_eq!(cafe.path, "caf\u{FFFD}.txt");
    assert_eq!(cafe.lines_added, 2);
    assert!(files.iter().any(|f| f.path == "plain.txt"));

    Ok(())
}

fn rename_sha_matches(full: &str, short: &str) -> bool {
    !short.is_empty() && full.starts_with(short)
}

#[tokio::test]
async fn test_log_filters() -> Result<()> {
    require_git!();
    let fx = fixture();
    let repo = open(&fx.path);

    let opts = LogOptions {
        max_count: Some(1),
        ..Default::default()
    };
    assert_eq!(repo.commits_with_files(&opts).await?.len(), 1);

    let opts = LogOptions {
        paths: vec!["README.md".to_string()],
        ..Default::default()
    };
    let commits = repo.commits_with_files(&opts).await?;
    assert_eq!(commits.len(), 1);
    assert!(commits[0].header.is_root());

    Ok(())
}

#[tokio::test]
async fn test_compact_history() -> Result<()> {
    require_git!();
    let fx = fixture();

    let commits = open(&fx.path)
        .compact_history("app", &LogOptions::default())
        .await?;
    assert_eq!(commits.len(), 3);
    assert_eq!(commits[2].sha, fx.root_sha);
    assert_eq!(commits[2].subject, "Add readme, intro");
    assert!(commits.iter().all(|c| c.repo == "app"));

    Ok(())
}

#[tokio::test]
async fn test_diff_detects_rename() -> Result<()> {
    require_git!();
    let fx = fixture();

    let entries = open(&fx.path).diff(&fx.root_sha, "HEAD").await?;
    assert_eq!(entries.len(), 2);

    let rename = entries.iter().find(|e| e.is_rename_copy).expect("rename entry");
    assert_eq!(rename.pre_image_path, "src/a.txt");
    assert_eq!(rename.file_path, "lib/a.txt");
    assert_eq!(rename.lines_added, 1);

    let binary = entries.iter().find(|e| !e.is_rename_copy).expect("binary entry");
    assert_eq!(binary.file_path, "logo.bin");
    assert_eq!(binary.lines_added, 0);

    Ok(())
}

#[tokio::test]
async fn test_diff_unknown_revision() -> Result<()> {
    require_git!();
    let fx = fixture();

    let err = open(&fx.path).diff("no-such-rev", "HEAD").await.unwrap_err();
    assert_eq!(err.tool_kind(), Some(ToolErrorKind::UnknownRevision));

    Ok(())
}

#[tokio::test]
async fn test_parent_commit_date() -> Result<()> {
    require_git!();
    let fx = fixture();
    let repo = open(&fx.path);

    let parent = repo.parent_commit_date("HEAD").await?;
    assert_eq!(parent.to_rfc3339(), "2024-01-02T12:00:00+00:00");

    let epoch = repo.parent_commit_date(&fx.root_sha).await?;
    assert_eq!(epoch.timestamp(), 0);

    Ok(())
}

#[tokio::test]
async fn test_checkout_and_pull_failures() -> Result<()> {
    require_git!();
    let fx = fixture();
    let repo = open(&fx.path);

    repo.checkout(&fx.rename_sha).await?;
    let commits = repo.commits_with_files(&LogOptions::default()).await?;
    assert_eq!(commits.len(), 2);

    match repo.checkout("missing-branch").await.unwrap_err() {
        ChurnError::Unit(failure) => assert_eq!(failure.kind, FailureKind::CheckoutFailed),
        other => panic!("unexpected error: {other:?}"),
    }

    // No remote configured
    match repo.pull().await.unwrap_err() {
        ChurnError::Unit(failure) => {
            assert_eq!(failure.kind, FailureKind::PullFailed);
            assert!(failure.command.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_orchestrated_scan_isolates_broken_repo() -> Result<()> {
    require_git!();
    let first = fixture();
    let second = fixture();
    let not_a_repo = TempDir::new()?;

    let units = vec![
        first.path.clone(),
        not_a_repo.path().to_path_buf(),
        second.path.clone(),
    ];
    let runner = Arc::new(ProcessRunner::default());

    let outcome = Orchestrator::new(2)
        .run(units, |path| {
            let repo = GitRepo::new(runner.clone(), &path)?;
            Ok(async move { repo.commits_with_files(&LogOptions::default()).await })
        })
        .await?;

    assert_eq!(outcome.successes.len(), 2);
    assert!(outcome.successes.iter().all(|s| s.value.len() == 3));
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].unit, not_a_repo.path().display().to_string());
    assert_eq!(outcome.failures[0].kind, FailureKind::ToolFailed);

    Ok(())
}

#[tokio::test]
async fn test_missing_program_is_not_found() -> Result<()> {
    let dir = TempDir::new()?;
    let config = GitConfig {
        program: "git-churn-no-such-binary".to_string(),
        ..Default::default()
    };
    let repo = GitRepo::with_config(Arc::new(ProcessRunner::default()), dir.path(), &config)?;

    let err = repo
        .commits_with_files(&LogOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.tool_kind(), Some(ToolErrorKind::NotFound));

    Ok(())
}
