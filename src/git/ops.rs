//! Working-tree operations: fetch, pull and checkout
//!
//! Each operation either succeeds or returns a [`UnitFailure`] tagged with the
//! repository, the failure kind and the command that failed, so a batch run can
//! report it without stopping the other repositories.

use super::history::{GitRepo, validate_ref};
use crate::error::{ChurnError, FailureKind, Result, ToolError, UnitFailure};
use crate::process::CommandSpec;

impl GitRepo {
    async fn run_op(&self, spec: CommandSpec, kind: FailureKind) -> Result<String> {
        self.runner().run(&spec).await.map_err(|e| self.op_failure(kind, e))
    }

    fn op_failure(&self, kind: FailureKind, err: ToolError) -> ChurnError {
        let message = match &err {
            ToolError::NonZeroExit { stderr, .. } | ToolError::UnknownRevision { stderr, .. }
                if !stderr.is_empty() =>
            {
                stderr.clone()
            }
            other => other.to_string(),
        };
        let failure = UnitFailure::new(self.unit_id(), kind, message).with_command(err.command());
        tracing::warn!("{}", failure);
        failure.into()
    }

    /// `git fetch --all --prune` without ever prompting for credentials
    pub async fn fetch(&self) -> Result<()> {
        let spec = self
            .command(["fetch", "--all", "--prune"])
            .env("GIT_TERMINAL_PROMPT", "0");
        self.run_op(spec, FailureKind::FetchFailed).await?;
        tracing::info!("Fetched {}", self.path().display());
        Ok(())
    }

    /// Fast-forward only; a diverged branch is reported as `PullFailed`
    pub async fn pull(&self) -> Result<()> {
        let spec = self
            .command(["pull", "--ff-only"])
            .env("GIT_TERMINAL_PROMPT", "0");
        self.run_op(spec, FailureKind::PullFailed).await?;
        tracing::info!("Pulled {}", self.path().display());
        Ok(())
    }

    pub async fn checkout(&self, rev: &str) -> Result<()> {
        validate_ref(rev)?;
        let spec = self.command(["checkout", "--quiet", rev]);
        self.run_op(spec, FailureKind::CheckoutFailed).await?;
        tracing::info!("Checked out {} in {}", rev, self.path().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::ScriptedRunner;
    use std::sync::Arc;

    fn repo(runner: ScriptedRunner) -> GitRepo {
        GitRepo::new(Arc::new(runner), "/repos/app").unwrap()
    }

    fn unit_failure(err: ChurnError) -> UnitFailure {
        match err {
            ChurnError::Unit(failure) => failure,
            other => panic!("expected unit failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_success_disables_prompt() {
        let runner = Arc::new(ScriptedRunner::new().reply("fetch --all --prune", ""));
        let repo = GitRepo::new(runner.clone(), "/repos/app").unwrap();
        repo.fetch().await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(
            calls[0]
                .envs
                .contains(&("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()))
        );
    }

    #[tokio::test]
    async fn test_pull_failure_is_tagged() {
        let runner = ScriptedRunner::new().fail(
            "pull --ff-only",
            ToolError::from_exit("git pull --ff-only", Some(128), "fatal: Not possible to fast-forward"),
        );
        let failure = unit_failure(repo(runner).pull().await.unwrap_err());
        assert_eq!(failure.kind, FailureKind::PullFailed);
        assert_eq!(failure.unit, "/repos/app");
        assert_eq!(failure.command.as_deref(), Some("git pull --ff-only"));
        assert!(failure.message.contains("fast-forward"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_tagged() {
        let runner = ScriptedRunner::new().fail(
            "fetch --all --prune",
            ToolError::Timeout {
                command: "git fetch --all --prune".to_string(),
                secs: 30,
            },
        );
        let failure = unit_failure(repo(runner).fetch().await.unwrap_err());
        assert_eq!(failure.kind, FailureKind::FetchFailed);
        assert!(failure.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_checkout() {
        let runner = ScriptedRunner::new()
            .reply("checkout --quiet v1.2", "")
            .fail(
                "checkout --quiet nope",
                ToolError::from_exit("git checkout --quiet nope", Some(1), "error: pathspec 'nope' did not match"),
            );
        let repo = repo(runner);
        repo.checkout("v1.2").await.unwrap();

        let failure = unit_failure(repo.checkout("nope").await.unwrap_err());
        assert_eq!(failure.kind, FailureKind::CheckoutFailed);
    }

    #[tokio::test]
    async fn test_checkout_rejects_option_like_ref() {
        let err = repo(ScriptedRunner::new()).checkout("--force").await.unwrap_err();
        assert!(err.is_contract_error());
    }
}
