use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::config::SyncConfig;

/// What a repository needs, judged from its local path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// No valid mirror: clone into the path
    Clone,
    /// A mirror with git metadata exists: fetch and prune
    Update,
}

impl SyncAction {
    /// `Update` only when `path` is a directory holding a `.git` entry.
    ///
    /// A directory without `.git` is `Clone` even when it has content.
    pub fn for_path(path: &Path) -> Self {
        if path.is_dir() && path.join(".git").exists() {
            SyncAction::Update
        } else {
            SyncAction::Clone
        }
    }
}

/// Runs the two git operations a mirror needs
#[derive(Debug, Clone)]
pub struct GitClient {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl GitClient {
    /// Create a new Git client with the given configuration
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            binary: PathBuf::from(&config.git_binary),
            timeout: config.operation_timeout(),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `git clone <url> <target>`, creating the parent directories first
    pub async fn clone_repository(&self, url: &str, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create parent directory {:?}", parent))?;
        }

        let mut command = self.command();
        command.arg("clone").arg(url).arg(target);

        self.run(command, "clone").await
    }

    /// `git fetch --all --prune` inside an existing mirror
    pub async fn fetch_all_prune(&self, path: &Path) -> Result<()> {
        let mut command = self.command();
        command
            .args(["fetch", "--all", "--prune"])
            .current_dir(path);

        self.run(command, "fetch").await
    }

    fn command(&self) -> AsyncCommand {
        let mut command = AsyncCommand::new(&self.binary);
        command
            // never block on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, mut command: AsyncCommand, operation: &str) -> Result<()> {
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    anyhow!(
                        "git {} timed out after {}s",
                        operation,
                        limit.as_secs()
                    )
                })?,
            None => command.output().await,
        }
        .with_context(|| format!("Failed to execute {:?} {}", self.binary, operation))?;

        check_output(&output, operation)
    }
}

fn check_output(output: &Output, operation: &str) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        debug!("git {} output: {}", operation, stdout.trim());
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "git {} failed ({}): {}",
            operation,
            output.status,
            stderr.trim()
        ));
    }

    Ok(())
}
