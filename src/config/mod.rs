/// Configuration system for git-churn
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ChurnError, ConfigError};
use crate::git::DEFAULT_SENTINEL;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Subprocess limits
    #[serde(default)]
    pub process: ProcessConfig,

    /// git invocation settings
    #[serde(default)]
    pub git: GitConfig,

    /// cloc invocation settings
    #[serde(default)]
    pub cloc: ClocConfig,

    /// Multi-repository fan-out
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Repository discovery
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Limits applied to every spawned subprocess
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Wall-clock limit per command
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cap on captured stdout for whole-output commands
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Cap on a single line of streamed output
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Program name or path of the git binary
    #[serde(default = "default_git_program")]
    pub program: String,

    /// Marker that starts every commit header in log output
    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    /// Similarity percentage passed to `-M` for rename detection
    #[serde(default = "default_rename_threshold")]
    pub rename_threshold: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClocConfig {
    #[serde(default = "default_cloc_program")]
    pub program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Units processed at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Directory names or paths never searched for repositories
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Maximum directory depth below the root
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    300
}

fn default_max_output_bytes() -> usize {
    256 * 1024 * 1024 // 256 MB
}

fn default_max_line_length() -> usize {
    1024 * 1024 // 1 MB
}

fn default_git_program() -> String {
    "git".to_string()
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

fn default_rename_threshold() -> u8 {
    50
}

fn default_cloc_program() -> String {
    "cloc".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        "target".to_string(),
        "vendor".to_string(),
    ]
}

fn default_max_depth() -> usize {
    4
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: default_git_program(),
            sentinel: default_sentinel(),
            rename_threshold: default_rename_threshold(),
        }
    }
}

impl Default for ClocConfig {
    fn default() -> Self {
        Self {
            program: default_cloc_program(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: default_exclude_patterns(),
            max_depth: default_max_depth(),
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ChurnError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, ChurnError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, ChurnError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ChurnError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ChurnError> {
        if self.process.timeout_secs == 0 {
            return Err(invalid("process.timeout_secs", "must be greater than 0"));
        }

        if self.process.max_output_bytes == 0 {
            return Err(invalid("process.max_output_bytes", "must be greater than 0"));
        }

        if self.process.max_line_length == 0 {
            return Err(invalid("process.max_line_length", "must be greater than 0"));
        }

        if self.git.program.trim().is_empty() {
            return Err(invalid("git.program", "must not be empty"));
        }

        // A sentinel made of whitespace or tabs would collide with numstat lines
        if self.git.sentinel.trim().is_empty() || self.git.sentinel.contains('\t') {
            return Err(invalid(
                "git.sentinel",
                "must contain a non-whitespace character and no tabs",
            ));
        }

        if self.git.rename_threshold > 100 {
            return Err(invalid(
                "git.rename_threshold",
                format!("must be between 0 and 100, got {}", self.git.rename_threshold),
            ));
        }

        if self.cloc.program.trim().is_empty() {
            return Err(invalid("cloc.program", "must not be empty"));
        }

        if self.orchestrator.concurrency == 0 {
            return Err(invalid("orchestrator.concurrency", "must be greater than 0"));
        }

        if let Err(e) = crate::glob_utils::compile_patterns(&self.discovery.exclude_patterns) {
            return Err(invalid("discovery.exclude_patterns", e.to_string()));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(program) = std::env::var("GIT_CHURN_GIT_PROGRAM") {
            self.git.program = program;
        }

        if let Ok(timeout) = std::env::var("GIT_CHURN_TIMEOUT_SECS")
            && let Ok(secs) = timeout.parse()
        {
            self.process.timeout_secs = secs;
        }

        if let Ok(concurrency) = std::env::var("GIT_CHURN_CONCURRENCY")
            && let Ok(n) = concurrency.parse()
        {
            self.orchestrator.concurrency = n;
        }

        if let Ok(threshold) = std::env::var("GIT_CHURN_RENAME_THRESHOLD")
            && let Ok(pct) = threshold.parse()
        {
            self.git.rename_threshold = pct;
        }

        if let Ok(max_output) = std::env::var("GIT_CHURN_MAX_OUTPUT_BYTES")
            && let Ok(bytes) = max_output.parse()
        {
            self.process.max_output_bytes = bytes;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, ChurnError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::new`], reading `path` instead of the default location
    pub fn with_file(path: &Path) -> Result<Self, ChurnError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
