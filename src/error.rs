/// Centralized error types for git-churn using thiserror
///
/// Every failure is a tagged variant so callers compare by kind, never by identity.
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T, E = ChurnError> = std::result::Result<T, E>;

/// Main error type for the extraction engine
#[derive(Error, Debug)]
pub enum ChurnError {
    #[error("Tool invocation error: {0}")]
    Tool(#[from] ToolError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("{0}")]
    Unit(#[from] UnitFailure),

    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Discriminant of [`ToolError`], comparable by value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolErrorKind {
    NotFound,
    NonZeroExit,
    UnknownRevision,
    OutputOverflow,
    Timeout,
    Io,
}

/// Failures of the external revision tool (spawn, exit status, limits)
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("'{program}' was not found on PATH (command: {command})")]
    NotFound { program: String, command: String },

    #[error("'{command}' exited with {}: {stderr}", .code.map(|c| format!("status {}", c)).unwrap_or_else(|| "a signal".to_string()))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("'{command}' referenced an unknown revision: {stderr}")]
    UnknownRevision { command: String, stderr: String },

    #[error("'{command}' produced more than {limit} bytes of output")]
    OutputOverflow { command: String, limit: usize },

    #[error("'{command}' timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("I/O failure while running '{command}': {message}")]
    Io { command: String, message: String },
}

impl ToolError {
    /// Stderr substrings git prints when a revision cannot be resolved
    const UNKNOWN_REVISION_MARKERS: [&'static str; 2] = ["unknown revision", "bad revision"];

    /// Build the error for a non-zero exit, upgrading to `UnknownRevision`
    /// when stderr carries one of git's "unknown revision" messages
    pub fn from_exit(command: impl Into<String>, code: Option<i32>, stderr: impl Into<String>) -> Self {
        let command = command.into();
        let stderr = stderr.into();
        if Self::UNKNOWN_REVISION_MARKERS
            .iter()
            .any(|marker| stderr.contains(marker))
        {
            ToolError::UnknownRevision { command, stderr }
        } else {
            ToolError::NonZeroExit {
                command,
                code,
                stderr,
            }
        }
    }

    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::NotFound { .. } => ToolErrorKind::NotFound,
            ToolError::NonZeroExit { .. } => ToolErrorKind::NonZeroExit,
            ToolError::UnknownRevision { .. } => ToolErrorKind::UnknownRevision,
            ToolError::OutputOverflow { .. } => ToolErrorKind::OutputOverflow,
            ToolError::Timeout { .. } => ToolErrorKind::Timeout,
            ToolError::Io { .. } => ToolErrorKind::Io,
        }
    }

    /// The rendered command line that failed
    pub fn command(&self) -> &str {
        match self {
            ToolError::NotFound { command, .. }
            | ToolError::NonZeroExit { command, .. }
            | ToolError::UnknownRevision { command, .. }
            | ToolError::OutputOverflow { command, .. }
            | ToolError::Timeout { command, .. }
            | ToolError::Io { command, .. } => command,
        }
    }
}

/// Where the text being parsed came from, used to enrich format errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogSource {
    #[default]
    Stream,
    File(PathBuf),
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Stream => write!(f, "command output"),
            LogSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Parsed content does not match the fixed schema it was expected to have
#[derive(Error, Debug, Clone)]
pub enum FormatError {
    #[error("Commit header in {origin} has {actual} fields, expected 7 or 8: {line:?}")]
    FieldCount {
        line: String,
        actual: usize,
        origin: LogSource,
    },

    #[error("Numstat line in {origin} does not have 3 tab-separated parts: {line:?}")]
    MalformedFileLine { line: String, origin: LogSource },

    #[error("Diff token #{index} does not have 3 tab-separated parts: {token:?}")]
    MalformedDiffToken { index: usize, token: String },

    #[error("Rename/copy token #{index} is missing its path tokens: {token:?}")]
    TruncatedRename { index: usize, token: String },

    #[error("Invalid date {value:?} in {origin}: {reason}")]
    InvalidDate {
        value: String,
        reason: String,
        origin: LogSource,
    },

    #[error("Compact history line has fewer than 4 fields: {0:?}")]
    CompactLine(String),

    #[error("Language diff in {0} has no SUM section")]
    MissingSum(LogSource),

    #[error("Duplicate key '{key}' in {origin}")]
    DuplicateKey { key: String, origin: LogSource },

    #[error("Invalid JSON in {origin}: {reason}")]
    Json { reason: String, origin: LogSource },
}

/// Category of an isolated per-unit failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PullFailed,
    FetchFailed,
    CheckoutFailed,
    ToolFailed,
    ParseFailed,
    Cancelled,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::PullFailed => "pull failed",
            FailureKind::FetchFailed => "fetch failed",
            FailureKind::CheckoutFailed => "checkout failed",
            FailureKind::ToolFailed => "tool failed",
            FailureKind::ParseFailed => "parse failed",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Other => "failed",
        };
        f.write_str(name)
    }
}

/// A failure attributed to one unit of work (repository path or commit)
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{unit}: {kind}: {message}{}", .command.as_ref().map(|c| format!(" (command: {})", c)).unwrap_or_default())]
pub struct UnitFailure {
    pub unit: String,
    pub kind: FailureKind,
    pub command: Option<String>,
    pub message: String,
}

impl UnitFailure {
    pub fn new(unit: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            kind,
            command: None,
            message: message.into(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Attribute an arbitrary engine error to `unit`.
    ///
    /// A `ChurnError::Unit` keeps its own kind and command; tool and format
    /// errors map to `ToolFailed` / `ParseFailed`.
    pub fn from_error(unit: impl Into<String>, err: &ChurnError) -> Self {
        let unit = unit.into();
        match err {
            ChurnError::Unit(failure) => UnitFailure {
                unit,
                ..failure.clone()
            },
            ChurnError::Tool(tool) => {
                UnitFailure::new(unit, FailureKind::ToolFailed, tool.to_string())
                    .with_command(tool.command())
            }
            ChurnError::Format(format) => {
                UnitFailure::new(unit, FailureKind::ParseFailed, format.to_string())
            }
            other => UnitFailure::new(unit, FailureKind::Other, other.to_string()),
        }
    }
}

/// Fatal orchestration failures (contract violations by a unit-of-work function)
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("Unit '{unit}' violated the unit-of-work contract: {message}")]
    Contract { unit: String, message: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Path does not exist: {0}")]
    PathNotFound(String),

    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid git ref: {0}")]
    InvalidRef(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

// Conversion from anyhow::Error to ChurnError
impl From<anyhow::Error> for ChurnError {
    fn from(err: anyhow::Error) -> Self {
        ChurnError::Other(format!("{:#}", err))
    }
}

impl ChurnError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        ChurnError::Other(msg.into())
    }

    /// Tool error kind, if this error came from the external tool
    pub fn tool_kind(&self) -> Option<ToolErrorKind> {
        match self {
            ChurnError::Tool(tool) => Some(tool.kind()),
            _ => None,
        }
    }

    /// Check if this error is a contract violation rather than an external failure
    pub fn is_contract_error(&self) -> bool {
        matches!(
            self,
            ChurnError::Validation(_) | ChurnError::Orchestration(OrchestrationError::Contract { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_revision_detected_from_stderr() {
        let err = ToolError::from_exit(
            "git log -1 abc^",
            Some(128),
            "fatal: ambiguous argument 'abc^': unknown revision or path not in the working tree.",
        );
        assert_eq!(err.kind(), ToolErrorKind::UnknownRevision);
    }

    #[test]
    fn test_other_exit_stays_non_zero() {
        let err = ToolError::from_exit("git pull", Some(1), "fatal: not a git repository");
        assert_eq!(err.kind(), ToolErrorKind::NonZeroExit);
        assert_eq!(err.command(), "git pull");
    }

    #[test]
    fn test_non_zero_exit_display() {
        let err = ToolError::NonZeroExit {
            command: "git fetch".to_string(),
            code: Some(2),
            stderr: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "'git fetch' exited with status 2: boom");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ChurnError = io_err.into();
        assert!(matches!(err, ChurnError::Io(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let err: ChurnError = anyhow::anyhow!("test error").into();
        assert!(matches!(err, ChurnError::Other(_)));
    }

    #[test]
    fn test_field_count_names_source_file() {
        let err = FormatError::FieldCount {
            line: "bad".to_string(),
            actual: 3,
            origin: LogSource::File(PathBuf::from("/tmp/repo.log")),
        };
        assert!(err.to_string().contains("/tmp/repo.log"));
        assert!(err.to_string().contains("3 fields"));
    }

    #[test]
    fn test_unit_failure_from_tool_error_keeps_command() {
        let err: ChurnError = ToolError::Timeout {
            command: "git log".to_string(),
            secs: 5,
        }
        .into();
        let failure = UnitFailure::from_error("/repos/a", &err);
        assert_eq!(failure.kind, FailureKind::ToolFailed);
        assert_eq!(failure.command.as_deref(), Some("git log"));
        assert_eq!(failure.unit, "/repos/a");
    }

    #[test]
    fn test_unit_failure_passthrough_rewrites_unit() {
        let err: ChurnError =
            UnitFailure::new("inner", FailureKind::PullFailed, "conflict").into();
        let failure = UnitFailure::from_error("/repos/b", &err);
        assert_eq!(failure.kind, FailureKind::PullFailed);
        assert_eq!(failure.unit, "/repos/b");
        assert_eq!(failure.message, "conflict");
    }

    #[test]
    fn test_unit_failure_display() {
        let failure = UnitFailure::new("/r", FailureKind::FetchFailed, "no remote")
            .with_command("git fetch --all");
        assert_eq!(
            failure.to_string(),
            "/r: fetch failed: no remote (command: git fetch --all)"
        );
    }

    #[test]
    fn test_contract_error_classification() {
        let err: ChurnError = ValidationError::MissingArgument("path".to_string()).into();
        assert!(err.is_contract_error());
        let err: ChurnError = ToolError::Timeout {
            command: "git".to_string(),
            secs: 1,
        }
        .into();
        assert!(!err.is_contract_error());
        assert_eq!(err.tool_kind(), Some(ToolErrorKind::Timeout));
    }
}
