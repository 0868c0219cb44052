//! Scripted [`CommandRunner`] for subprocess-free tests

use super::{CommandRunner, CommandSpec};
use crate::error::ToolError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;

/// Replies to commands by their rendered argument list (`"log --numstat ..."`),
/// ignoring the program name and working directory.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    replies: HashMap<String, Result<String, ToolError>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(mut self, args: &str, stdout: &str) -> Self {
        self.replies.insert(args.to_string(), Ok(stdout.to_string()));
        self
    }

    pub(crate) fn fail(mut self, args: &str, err: ToolError) -> Self {
        self.replies.insert(args.to_string(), Err(err));
        self
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, spec: &CommandSpec) -> Result<String, ToolError> {
        self.calls.lock().unwrap().push(spec.clone());
        let key = spec.args.join(" ");
        self.replies.get(&key).cloned().unwrap_or_else(|| {
            Err(ToolError::NonZeroExit {
                command: spec.to_string(),
                code: Some(1),
                stderr: format!("no scripted reply for '{}'", key),
            })
        })
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<String, ToolError> {
        self.answer(spec)
    }

    fn lines(&self, spec: &CommandSpec) -> BoxStream<'static, Result<String, ToolError>> {
        match self.answer(spec) {
            Ok(stdout) => {
                let lines: Vec<Result<String, ToolError>> =
                    stdout.lines().map(|l| Ok(l.to_string())).collect();
                stream::iter(lines).boxed()
            }
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }
}
