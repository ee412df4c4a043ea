use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable holding the GitHub token
pub const TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Environment variable overriding the GitHub API base URL
pub const API_URL_VAR: &str = "GITHUB_API_URL";

/// Public GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Main configuration structure for ghmirror
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Root directory for mirrors (`--output` takes precedence)
    #[serde(default)]
    pub output_directory: Option<String>,

    /// GitHub API settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which remote address of a repository gets cloned
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CloneProtocol {
    /// `ssh_url`, authenticated by the local SSH agent/keys
    #[default]
    Ssh,
    /// `clone_url`, authenticated by git's own credential helpers
    Https,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// API base URL (GitHub Enterprise installs use `https://host/api/v3`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Remote address used for cloning
    #[serde(default)]
    pub clone_protocol: CloneProtocol,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout: u64,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Maximum parallel git operations (1 = strictly sequential)
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Timeout for a single git operation in seconds (0 = unbounded)
    #[serde(default)]
    pub timeout: u64,

    /// git executable to invoke
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_parallel() -> usize {
    1
}
fn default_git_binary() -> String {
    "git".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            clone_protocol: CloneProtocol::default(),
            timeout: default_request_timeout(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            timeout: 0,
            git_binary: default_git_binary(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl GitHubConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl SyncConfig {
    /// Per-invocation git timeout, `None` when unbounded
    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        match Self::default_config_path() {
            Some(config_path) if config_path.exists() => Self::load(&config_path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Default configuration file path (XDG compliant)
    pub fn default_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("ghmirror").join("config.yml"))
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        if let Some(output) = &self.output_directory {
            let expanded = shellexpand::full(output)
                .context("Failed to expand output_directory path")?
                .into_owned();
            self.output_directory = Some(expanded);
        }

        Ok(())
    }
}

/// Bearer token for the listing API.
///
/// `Debug` never prints the secret; call [`Token::expose`] at the one place
/// that builds the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Returns `None` for empty or whitespace-only input
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// No token was supplied by `--token`, the environment or the `.env` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingToken;

impl fmt::Display for MissingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GitHub token required via --token or the {} environment variable",
            TOKEN_VAR
        )
    }
}

impl std::error::Error for MissingToken {}

/// Variables read from a `.env` file.
///
/// The file is parsed into a map rather than loaded into the process
/// environment, and real environment variables shadow it.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    vars: HashMap<String, String>,
}

impl EnvFile {
    /// Parse `path`; a missing file yields an empty set.
    ///
    /// Lines that don't parse are skipped with a warning. Only failing to
    /// open an existing file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No .env file at {:?}", path);
            return Ok(Self::default());
        }

        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to read .env file: {:?}", path))?;

        let mut vars = HashMap::new();
        for entry in entries {
            match entry {
                Ok((key, value)) => {
                    vars.insert(key, value);
                }
                Err(dotenvy::Error::Io(e)) => {
                    warn!("Stopped reading .env file {:?}: {}", path, e);
                    break;
                }
                Err(e) => warn!("Skipping unreadable line in .env file {:?}: {}", path, e),
            }
        }

        debug!("Read {} variables from {:?}", vars.len(), path);
        Ok(Self { vars })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Process environment first, then the file
    pub fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.get(key).map(str::to_string))
    }
}

/// Values given on the command line, which win over every other source
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub output: Option<PathBuf>,
}

/// Immutable settings for one run, resolved once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: Token,
    pub output_root: PathBuf,
    pub api_url: String,
    pub config: Config,
}

impl Settings {
    /// Resolve the run settings.
    ///
    /// `program_dir` anchors the default `output` directory and `lookup`
    /// reads environment variables. Performs no I/O.
    pub fn resolve<F>(
        overrides: Overrides,
        config: Config,
        program_dir: &Path,
        lookup: F,
    ) -> std::result::Result<Self, MissingToken>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = overrides
            .token
            .as_deref()
            .and_then(Token::new)
            .or_else(|| lookup(TOKEN_VAR).as_deref().and_then(Token::new))
            .ok_or(MissingToken)?;

        let known_prefix = ["ghp_", "gho_", "ghs_", "ghu_", "github_pat_"]
            .iter()
            .any(|prefix| token.expose().starts_with(prefix));
        if !known_prefix {
            debug!("GitHub token doesn't look like a GitHub token (expected ghp_, gho_, ghs_, ghu_ or github_pat_ prefix)");
        }

        let output_root = overrides
            .output
            .or_else(|| config.output_directory.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| program_dir.join("output"));

        let api_url = lookup(API_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| config.github.api_url.clone());

        Ok(Self {
            token,
            output_root,
            api_url,
            config,
        })
    }
}

/// Directory containing the running executable
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let exe = exe.canonicalize().unwrap_or(exe);
    exe.parent()
        .map(Path::to_path_buf)
        .context("Executable path has no parent directory")
}

/// Create the mirror root if needed and return its absolute path
pub fn prepare_output_dir(path: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create output directory: {:?}", path))?;

    path.canonicalize()
        .with_context(|| format!("Failed to resolve output directory: {:?}", path))
}
