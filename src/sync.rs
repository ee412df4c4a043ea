//! Sync Engine - clones or refreshes every discovered repository
//!
//! Each repository is handled in isolation: a failing clone or fetch is
//! recorded in its [`SyncResult`] and the run moves on. Repositories are
//! processed one at a time unless `sync.max_parallel` allows more.

use anyhow::{bail, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::discovery::RepoSpec;
use crate::git::{GitClient, SyncAction};

/// Outcome for one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Repository was cloned into a new mirror
    Cloned { path: PathBuf },
    /// Existing mirror was fetched and pruned
    Updated { path: PathBuf },
    /// Clone or update failed
    Failed {
        name: String,
        path: PathBuf,
        error: String,
    },
}

/// Results from a complete sync run
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub cloned: usize,
    pub updated: usize,
    pub errored: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
}

impl SyncSummary {
    pub fn from_results(results: Vec<SyncResult>, duration: Duration) -> Self {
        let mut cloned = 0;
        let mut updated = 0;
        let mut errored = 0;

        for result in &results {
            match result {
                SyncResult::Cloned { .. } => cloned += 1,
                SyncResult::Updated { .. } => updated += 1,
                SyncResult::Failed { .. } => errored += 1,
            }
        }

        Self {
            cloned,
            updated,
            errored,
            duration,
            results,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncResult> {
        self.results
            .iter()
            .filter(|result| matches!(result, SyncResult::Failed { .. }))
    }
}

/// Planned action per repository, without touching anything
pub fn plan(repos: &[RepoSpec]) -> Vec<(&RepoSpec, SyncAction)> {
    repos.iter().map(|repo| (repo, repo.action())).collect()
}

/// The engine that drives clone/update for a set of repositories
#[derive(Debug, Clone)]
pub struct SyncEngine {
    git_client: GitClient,
    max_parallel: usize,
}

impl SyncEngine {
    /// Create a new sync engine with the given configuration
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_git_client(GitClient::new(config), config.max_parallel)
    }

    pub fn with_git_client(git_client: GitClient, max_parallel: usize) -> Self {
        Self {
            git_client,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Sync every repository and tally the outcome.
    ///
    /// Never fails: per-repository errors end up in the summary.
    pub async fn sync_repos(&self, repos: Vec<RepoSpec>) -> SyncSummary {
        let start_time = Instant::now();

        info!(
            "Syncing {} repositories (max_parallel={})",
            repos.len(),
            self.max_parallel
        );

        let results = if self.max_parallel == 1 {
            let mut results = Vec::with_capacity(repos.len());
            for repo in &repos {
                results.push(self.sync_repository(repo).await);
            }
            results
        } else {
            stream::iter(repos.iter())
                .map(|repo| self.sync_repository(repo))
                .buffer_unordered(self.max_parallel)
                .collect::<Vec<_>>()
                .await
        };

        let summary = SyncSummary::from_results(results, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} cloned, {} updated, {} failed",
            summary.duration.as_secs_f64(),
            summary.cloned,
            summary.updated,
            summary.errored
        );

        summary
    }

    /// Clone or update a single repository
    pub async fn sync_repository(&self, repo: &RepoSpec) -> SyncResult {
        let full_name = repo.full_name();
        let path = repo.local_path.clone();

        let outcome = match repo.action() {
            SyncAction::Update => {
                println!("🔄 Updating {}", path.display());
                self.git_client
                    .fetch_all_prune(&path)
                    .await
                    .map(|()| SyncResult::Updated { path: path.clone() })
            }
            SyncAction::Clone => {
                println!("📥 Cloning {} -> {}", repo.clone_url, path.display());
                self.clone_repository(repo)
                    .await
                    .map(|()| SyncResult::Cloned { path: path.clone() })
            }
        };

        match outcome {
            Ok(result) => {
                debug!("Sync completed for {}: {:?}", full_name, result);
                result
            }
            Err(e) => {
                let error = format!("{:#}", e);
                error!("Failed to sync {}: {}", full_name, error);
                SyncResult::Failed {
                    name: full_name,
                    path,
                    error,
                }
            }
        }
    }

    async fn clone_repository(&self, repo: &RepoSpec) -> Result<()> {
        if is_occupied(&repo.local_path) {
            bail!(
                "target {} exists but is not a git repository",
                repo.local_path.display()
            );
        }

        self.git_client
            .clone_repository(&repo.clone_url, &repo.local_path)
            .await
    }
}

// Anything other than a missing path or an empty directory.
fn is_occupied(path: &Path) -> bool {
    if std::fs::symlink_metadata(path).is_err() {
        return false;
    }

    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_some(),
        Err(_) => true,
    }
}
