//! Subprocess execution for the external revision tools
//!
//! [`CommandRunner`] is the seam between the parsing engine and the operating
//! system: the engine asks for either the whole captured stdout of a command or
//! a stream of its stdout lines. [`ProcessRunner`] is the tokio-backed
//! implementation; every child is spawned with `kill_on_drop(true)`, so dropping
//! a partially consumed line stream tears the subprocess down.

use crate::config::ProcessConfig;
use crate::counters::ExtractionCounters;
use crate::error::ToolError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};

#[cfg(test)]
pub(crate) mod fake;

/// A fully described external command: program, arguments and working directory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Source of subprocess output, either captured whole or streamed line by line
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion and return its stdout
    async fn run(&self, spec: &CommandSpec) -> Result<String, ToolError>;

    /// Stream the command's stdout lines (without terminators).
    ///
    /// A non-zero exit is reported as the final item after all lines.
    fn lines(&self, spec: &CommandSpec) -> BoxStream<'static, Result<String, ToolError>>;
}

/// tokio-backed [`CommandRunner`] with a timeout and output caps
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    max_output_bytes: usize,
    max_line_length: usize,
    counters: Option<Arc<ExtractionCounters>>,
}

impl ProcessRunner {
    pub fn new(timeout: Duration, max_output_bytes: usize, max_line_length: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
            max_line_length,
            counters: None,
        }
    }

    pub fn from_config(config: &ProcessConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timeout_secs),
            config.max_output_bytes,
            config.max_line_length,
        )
    }

    /// Count every spawned subprocess in `counters`
    pub fn with_counters(mut self, counters: Arc<ExtractionCounters>) -> Self {
        self.counters = Some(counters);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Child, ToolError> {
        spawn_child(spec, self.counters.as_deref())
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::from_config(&ProcessConfig::default())
    }
}

fn spawn_child(spec: &CommandSpec, counters: Option<&ExtractionCounters>) -> Result<Child, ToolError> {
    let command = spec.to_string();
    tracing::debug!("Spawning: {}", command);

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.envs {
        cmd.env(key, value);
    }
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::NotFound {
                program: spec.program.clone(),
                command: command.clone(),
            }
        } else {
            ToolError::Io {
                command: command.clone(),
                message: e.to_string(),
            }
        }
    })?;

    if let Some(counters) = counters {
        counters.record_process();
    }
    Ok(child)
}

/// Drain stderr on its own task so a chatty child never blocks on a full pipe
fn collect_stderr<R>(stderr: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr
            && let Err(e) = stderr.read_to_end(&mut buf).await
        {
            tracing::debug!("Failed to read subprocess stderr: {}", e);
        }
        String::from_utf8_lossy(&buf).trim().to_string()
    })
}

async fn wait_until(
    child: &mut Child,
    deadline: Instant,
    command: &str,
    timeout: Duration,
) -> Result<ExitStatus, ToolError> {
    match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => Err(ToolError::Io {
            command: command.to_string(),
            message: e.to_string(),
        }),
        Err(_) => {
            let _ = child.start_kill();
            Err(ToolError::Timeout {
                command: command.to_string(),
                secs: timeout.as_secs(),
            })
        }
    }
}

async fn check_exit(
    status: ExitStatus,
    stderr: JoinHandle<String>,
    command: &str,
) -> Result<(), ToolError> {
    if status.success() {
        return Ok(());
    }
    let stderr = stderr.await.unwrap_or_default();
    tracing::debug!("'{}' failed with {:?}: {}", command, status.code(), stderr);
    Err(ToolError::from_exit(command, status.code(), stderr))
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<String, ToolError> {
        let command = spec.to_string();
        let deadline = Instant::now() + self.timeout;
        let mut child = self.spawn(spec)?;

        let mut stdout = child.stdout.take().ok_or_else(|| ToolError::Io {
            command: command.clone(),
            message: "stdout was not captured".to_string(),
        })?;
        let stderr = collect_stderr(child.stderr.take());

        let limit = self.max_output_bytes;
        let read = async {
            let mut out = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                let n = stdout.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                if out.len() + n > limit {
                    return Ok(None);
                }
                out.extend_from_slice(&chunk[..n]);
            }
            Ok::<_, std::io::Error>(Some(out))
        };

        let out = match tokio::time::timeout_at(deadline, read).await {
            Ok(Ok(Some(out))) => out,
            Ok(Ok(None)) => {
                let _ = child.start_kill();
                tracing::warn!("'{}' exceeded the {} byte output limit", command, limit);
                return Err(ToolError::OutputOverflow { command, limit });
            }
            Ok(Err(e)) => {
                let _ = child.start_kill();
                return Err(ToolError::Io {
                    command,
                    message: e.to_string(),
                });
            }
            Err(_) => {
                let _ = child.start_kill();
                return Err(ToolError::Timeout {
                    command,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let status = wait_until(&mut child, deadline, &command, self.timeout).await?;
        check_exit(status, stderr, &command).await?;

        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn lines(&self, spec: &CommandSpec) -> BoxStream<'static, Result<String, ToolError>> {
        let state = LineState::Pending {
            spec: spec.clone(),
            runner: self.clone(),
        };

        stream::unfold(state, |state| async move {
            let mut running = match state {
                LineState::Done => return None,
                LineState::Pending { spec, runner } => match runner.start_lines(&spec) {
                    Ok(running) => running,
                    Err(e) => return Some((Err(e), LineState::Done)),
                },
                LineState::Running(running) => running,
            };

            match running.next_line().await {
                Ok(Some(line)) => Some((Ok(line), LineState::Running(running))),
                Ok(None) => match running.finish().await {
                    Ok(()) => None,
                    Err(e) => Some((Err(e), LineState::Done)),
                },
                Err(e) => {
                    let _ = running.child.start_kill();
                    Some((Err(e), LineState::Done))
                }
            }
        })
        .boxed()
    }
}

enum LineState {
    Pending {
        spec: CommandSpec,
        runner: ProcessRunner,
    },
    Running(Box<RunningChild>),
    Done,
}

struct RunningChild {
    child: Child,
    lines: FramedRead<ChildStdout, AnyDelimiterCodec>,
    stderr: JoinHandle<String>,
    deadline: Instant,
    timeout: Duration,
    command: String,
    max_line_length: usize,
}

impl ProcessRunner {
    fn start_lines(&self, spec: &CommandSpec) -> Result<Box<RunningChild>, ToolError> {
        let command = spec.to_string();
        let mut child = self.spawn(spec)?;
        let stdout = child.stdout.take().ok_or_else(|| ToolError::Io {
            command: command.clone(),
            message: "stdout was not captured".to_string(),
        })?;
        let stderr = collect_stderr(child.stderr.take());

        Ok(Box::new(RunningChild {
            child,
            lines: FramedRead::new(
                stdout,
                AnyDelimiterCodec::new_with_max_length(
                    b"\n".to_vec(),
                    b"\n".to_vec(),
                    self.max_line_length,
                ),
            ),
            stderr,
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
            command,
            max_line_length: self.max_line_length,
        }))
    }
}

/// Paths are raw bytes with `core.quotepath=off`, so decode lossily as `run` does
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

impl RunningChild {
    async fn next_line(&mut self) -> Result<Option<String>, ToolError> {
        match tokio::time::timeout_at(self.deadline, self.lines.next()).await {
            Ok(Some(Ok(line))) => Ok(Some(decode_line(&line))),
            Ok(None) => Ok(None),
            Ok(Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded))) => {
                tracing::warn!(
                    "'{}' emitted a line longer than {} bytes",
                    self.command,
                    self.max_line_length
                );
                Err(ToolError::OutputOverflow {
                    command: self.command.clone(),
                    limit: self.max_line_length,
                })
            }
            Ok(Some(Err(AnyDelimiterCodecError::Io(e)))) => Err(ToolError::Io {
                command: self.command.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(ToolError::Timeout {
                command: self.command.clone(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn finish(self: Box<Self>) -> Result<(), ToolError> {
        let RunningChild {
            mut child,
            stderr,
            deadline,
            timeout,
            command,
            ..
        } = *self;
        let status = wait_until(&mut child, deadline, &command, timeout).await?;
        check_exit(status, stderr, &command).await
    }
}
