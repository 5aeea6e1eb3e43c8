//! Backend abstractions consumed by the release engine
//!
//! The orchestration logic never talks to git, a forge API, a registry or a
//! package manager directly. It is written against the traits in this module,
//! and concrete implementations are injected by the caller:
//!
//! - [`Vcs`]: working-tree state, history, tags, pushes
//! - [`Forge`]: pull requests, labels and platform releases (GitHub, GitLab, ...)
//! - [`Registry`]: published-version lookups and availability polling
//! - [`PackageManager`]: build, publish, lock and smoke-test commands
//!
//! `git` provides a [`SystemGit`](git::SystemGit) implementation of [`Vcs`];
//! `memory` provides in-process implementations of all four traits.
//!
//! All traits are `Send + Sync` so fan-out work (registry lookups, health
//! checks) can run on the rayon pool.

pub mod git;
pub mod memory;
pub mod registry;

use crate::core::error::ReleaseResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use registry::{PollSettings, poll_with_backoff};

/// A commit as seen by the version planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
  pub sha: String,
  pub subject: String,
  #[serde(default)]
  pub body: String,
}

impl Commit {
  pub fn new(sha: impl Into<String>, subject: impl Into<String>) -> Self {
    Self {
      sha: sha.into(),
      subject: subject.into(),
      body: String::new(),
    }
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = body.into();
    self
  }

  /// Subject and body joined the way `git log --format=%B` prints them
  pub fn message(&self) -> String {
    if self.body.is_empty() {
      self.subject.clone()
    } else {
      format!("{}\n\n{}", self.subject, self.body)
    }
  }
}

/// Captured output of an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  pub command: String,
  pub success: bool,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn ok(command: impl Into<String>) -> Self {
    Self {
      command: command.into(),
      success: true,
      ..Default::default()
    }
  }

  pub fn failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
    Self {
      command: command.into(),
      success: false,
      stdout: String::new(),
      stderr: stderr.into(),
    }
  }
}

/// Version control operations
pub trait Vcs: Send + Sync {
  /// No uncommitted changes (tracked or untracked)
  fn is_clean(&self) -> ReleaseResult<bool>;

  /// Repository is a shallow clone
  fn is_shallow(&self) -> ReleaseResult<bool>;

  /// Default branch of the `origin` remote
  fn default_branch(&self) -> ReleaseResult<String>;

  /// Currently checked-out branch (`HEAD` when detached)
  fn current_branch(&self) -> ReleaseResult<String>;

  /// Full SHA of HEAD
  fn head_sha(&self) -> ReleaseResult<String>;

  /// Commits after `since` (exclusive, a tag or SHA; `None` = all history)
  /// touching any of `paths` (empty = whole repository), newest first
  fn log(&self, since: Option<&str>, paths: &[PathBuf]) -> ReleaseResult<Vec<Commit>>;

  /// Files changed between `since` and HEAD
  fn diff_files(&self, since: Option<&str>) -> ReleaseResult<Vec<PathBuf>>;

  /// Commit the given paths (all changes when empty); returns the new SHA
  fn commit(&self, message: &str, paths: &[PathBuf]) -> ReleaseResult<String>;

  /// Create an annotated tag at `target` (HEAD when `None`)
  fn tag(&self, name: &str, message: &str, target: Option<&str>) -> ReleaseResult<()>;

  fn tag_exists(&self, name: &str) -> ReleaseResult<bool>;

  /// Delete a tag locally, and on the remote when `remote` is set
  fn delete_tag(&self, name: &str, remote: bool) -> ReleaseResult<()>;

  /// All tag names
  fn list_tags(&self) -> ReleaseResult<Vec<String>>;

  /// Push the current branch, or only tags when `tags_only`
  fn push(&self, tags_only: bool) -> ReleaseResult<()>;

  fn checkout_branch(&self, name: &str, create: bool) -> ReleaseResult<()>;
}

/// What a forge can do. Missing capabilities are logged and skipped, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeCapabilities {
  pub releases: bool,
  pub draft_releases: bool,
  pub labels: bool,
}

impl ForgeCapabilities {
  pub fn github() -> Self {
    Self {
      releases: true,
      draft_releases: true,
      labels: true,
    }
  }

  pub fn gitlab() -> Self {
    Self {
      releases: true,
      draft_releases: false,
      labels: true,
    }
  }

  pub fn none() -> Self {
    Self {
      releases: false,
      draft_releases: false,
      labels: false,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
  Open,
  Merged,
  Closed,
  All,
}

/// A pull/merge request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
  pub number: u64,
  pub title: String,
  pub body: String,
  pub labels: Vec<String>,
  pub head_branch: String,
  pub base_branch: String,
  pub state: PrState,
  /// RFC 3339 merge timestamp, set for merged PRs
  pub merged_at: Option<String>,
  pub merge_commit_sha: Option<String>,
}

/// Filter for `Forge::list_prs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrFilter {
  pub label: Option<String>,
  pub state: PrState,
  pub base: Option<String>,
  pub limit: usize,
}

/// Input for `Forge::create_release`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
  pub tag: String,
  pub title: String,
  pub body: String,
  pub draft: bool,
  pub prerelease: bool,
}

/// A platform release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
  pub tag: String,
  pub title: String,
  pub draft: bool,
  pub url: Option<String>,
}

/// Code-hosting platform API
pub trait Forge: Send + Sync {
  /// Short name for logs ("github", "gitlab", ...)
  fn name(&self) -> &str;

  fn capabilities(&self) -> ForgeCapabilities;

  /// CLI installed and authenticated
  fn is_available(&self) -> bool;

  fn create_release(&self, request: &ReleaseRequest) -> ReleaseResult<ReleaseInfo>;

  /// Flip a draft release to published
  fn publish_release(&self, tag: &str) -> ReleaseResult<()>;

  fn list_releases(&self, limit: usize) -> ReleaseResult<Vec<ReleaseInfo>>;

  fn create_pr(&self, title: &str, body: &str, head: &str, base: &str) -> ReleaseResult<PullRequest>;

  /// PRs matching `filter`, most recently updated first
  fn list_prs(&self, filter: &PrFilter) -> ReleaseResult<Vec<PullRequest>>;

  fn pr_data(&self, number: u64) -> ReleaseResult<PullRequest>;

  fn add_labels(&self, number: u64, labels: &[String]) -> ReleaseResult<()>;

  fn remove_labels(&self, number: u64, labels: &[String]) -> ReleaseResult<()>;

  fn merge_pr(&self, number: u64) -> ReleaseResult<()>;
}

/// Result of comparing local artifact digests with the registry's
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumReport {
  pub matched: Vec<String>,
  pub mismatched: Vec<String>,
  pub missing: Vec<String>,
}

impl ChecksumReport {
  pub fn ok(&self) -> bool {
    self.mismatched.is_empty() && self.missing.is_empty()
  }
}

/// Package registry queries
pub trait Registry: Send + Sync {
  fn name(&self) -> &str;

  /// `name@version` already exists on the registry
  fn check_published(&self, name: &str, version: &str) -> ReleaseResult<bool>;

  fn latest_version(&self, name: &str) -> ReleaseResult<Option<String>>;

  /// Compare `local` (file name → sha256 hex) with the registry's digests
  fn verify_checksum(&self, name: &str, version: &str, local: &BTreeMap<String, String>)
  -> ReleaseResult<ChecksumReport>;

  /// Wait until `name@version` is visible. Returns `false` on timeout; lookup
  /// errors count as "not yet".
  fn poll_available(&self, name: &str, version: &str, settings: PollSettings) -> bool {
    poll_with_backoff(settings, std::thread::sleep, || {
      self.check_published(name, version).unwrap_or_else(|err| {
        tracing::debug!("{}: lookup of {}@{} failed: {}", self.name(), name, version, err);
        false
      })
    })
  }
}

/// Package manager commands
pub trait PackageManager: Send + Sync {
  fn name(&self) -> &str;

  /// Build distributable artifacts for one package into `output_dir`
  fn build(&self, package_dir: &Path, output_dir: &Path) -> ReleaseResult<CommandOutput>;

  fn publish(&self, dist_dir: &Path, index_url: Option<&str>) -> ReleaseResult<CommandOutput>;

  /// Refresh the lockfile, or only verify it is current when `check_only`
  fn lock(&self, check_only: bool, upgrade_package: Option<&str>, cwd: &Path) -> ReleaseResult<CommandOutput>;

  fn version_bump(&self, package_dir: &Path, new_version: &str) -> ReleaseResult<CommandOutput>;

  /// Resolve `name==version` from the registry in a scratch environment
  fn resolve_check(&self, name: &str, version: &str, index_url: Option<&str>) -> ReleaseResult<CommandOutput>;

  /// Install and import the published package
  fn smoke_test(&self, name: &str, version: &str) -> ReleaseResult<CommandOutput>;
}
