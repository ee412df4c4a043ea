//! Repository discovery
//!
//! Turns listing API entries into [`RepoSpec`] values: the identity, remote
//! address and local mirror path of each repository.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::CloneProtocol;
use crate::git::SyncAction;
use crate::github::{GitHubClient, RawRepository};

/// Everything needed to clone or refresh one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    /// Owner login (user or organization)
    pub owner: String,

    /// Repository name
    pub name: String,

    /// Remote address handed to `git clone`
    pub clone_url: String,

    /// `<output_root>/<owner>/<name>`
    pub local_path: PathBuf,
}

impl RepoSpec {
    /// Build a spec from a listing entry.
    ///
    /// Returns `None` when the entry has no usable name or lacks the remote
    /// address for `protocol`.
    pub fn from_raw(
        raw: &RawRepository,
        output_root: &Path,
        protocol: CloneProtocol,
    ) -> Option<Self> {
        let name = raw.name.as_deref().filter(|n| is_path_component(n))?;

        let clone_url = match protocol {
            CloneProtocol::Ssh => raw.ssh_url.as_deref(),
            CloneProtocol::Https => raw.clone_url.as_deref(),
        }
        .filter(|url| !url.is_empty())?;

        let owner = raw
            .owner
            .as_ref()
            .and_then(|o| o.login.as_deref())
            .filter(|login| !login.is_empty())
            .or_else(|| {
                raw.full_name
                    .as_deref()
                    .and_then(|full| full.split('/').next())
                    .filter(|owner| !owner.is_empty())
            })
            .unwrap_or("unknown");

        if !is_path_component(owner) {
            return None;
        }

        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            clone_url: clone_url.to_string(),
            local_path: output_root.join(owner).join(name),
        })
    }

    /// Display name (owner/name format)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Clone or update, decided from the local path
    pub fn action(&self) -> SyncAction {
        SyncAction::for_path(&self.local_path)
    }
}

// Owner and name become directories under the output root.
fn is_path_component(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

/// Trait for repository discovery from a hosting provider
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Discover every repository to mirror.
    ///
    /// Fails as a whole; callers never see a partial listing.
    async fn discover(&self) -> Result<Vec<RepoSpec>>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Discovery through the GitHub `/user/repos` listing
pub struct GitHubDiscovery {
    client: GitHubClient,
    output_root: PathBuf,
    protocol: CloneProtocol,
}

impl GitHubDiscovery {
    pub fn new(client: GitHubClient, output_root: PathBuf, protocol: CloneProtocol) -> Self {
        Self {
            client,
            output_root,
            protocol,
        }
    }
}

#[async_trait]
impl Discovery for GitHubDiscovery {
    async fn discover(&self) -> Result<Vec<RepoSpec>> {
        let repositories = self.client.list_repositories().await?;
        let listed = repositories.len();

        let specs: Vec<RepoSpec> = repositories
            .iter()
            .filter_map(|raw| RepoSpec::from_raw(raw, &self.output_root, self.protocol))
            .collect();

        if specs.len() < listed {
            debug!(
                "Skipped {} malformed repository entries",
                listed - specs.len()
            );
        }

        Ok(specs)
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}
