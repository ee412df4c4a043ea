//! ghmirror - local mirrors of every GitHub repository a token can see
//!
//! Lists repositories through the GitHub REST API, then clones the ones
//! missing locally and refreshes existing mirrors with
//! `git fetch --all --prune`.
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration, `.env` handling and settings resolution
//! - [`github`]: repository listing with `Link` header pagination
//! - [`discovery`]: listing entries to local mirror specs
//! - [`git`]: local state inspection and git invocations
//! - [`sync`]: per-repository orchestration and the run summary

pub mod config;
pub mod discovery;
pub mod git;
pub mod github;
pub mod sync;

pub use config::{Config, Settings};
pub use discovery::{Discovery, GitHubDiscovery, RepoSpec};
pub use git::{GitClient, SyncAction};
pub use github::GitHubClient;
pub use sync::{SyncEngine, SyncResult, SyncSummary};
