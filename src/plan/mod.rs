//! Execution plan: what a release run will do, per package
//!
//! Every release produces an `ExecutionPlan` before anything is mutated,
//! enabling:
//!
//! - **Review**: the plan renders as a table, CSV, JSON or an ASCII flow
//! - **Idempotency**: same versions + levels → same plan → same id
//! - **Auditability**: the id is a content hash of the JSON projection
//!
//! # Status precedence
//!
//! ```text
//! excluded > dependency_only > already_published > skipped > included
//! ```
//!
//! `dependency_only` applies to packages in the graph levels that have no
//! planned version.

mod render;

use crate::version::{PackageVersion, VersionBump};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Plan identifier (SHA256 hash of plan contents)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
  /// Create a plan ID from plan contents
  pub fn from_contents(contents: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Self(format!("{:x}", hasher.finalize()))
  }

  /// Full hex digest
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Get the short ID (first 12 characters)
  pub fn short(&self) -> &str {
    self.0.char_indices().nth(12).map_or(self.0.as_str(), |(end, _)| &self.0[..end])
  }
}

impl fmt::Display for PlanId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.short())
  }
}

/// What happens to a package in this release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
  Included,
  Skipped,
  Excluded,
  AlreadyPublished,
  DependencyOnly,
}

impl PlanStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      PlanStatus::Included => "included",
      PlanStatus::Skipped => "skipped",
      PlanStatus::Excluded => "excluded",
      PlanStatus::AlreadyPublished => "already_published",
      PlanStatus::DependencyOnly => "dependency_only",
    }
  }
}

impl fmt::Display for PlanStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One package's row in the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
  pub name: String,
  pub level: usize,
  pub current_version: String,
  pub next_version: String,
  pub status: PlanStatus,
  pub bump: VersionBump,
  pub reason: String,
  /// 1-based position in `(level, name)` order
  pub order: usize,
}

/// The full plan, sorted by `(level, name)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
  /// Content hash of `git_sha` and `entries`, fixed at build time
  pub id: PlanId,
  pub git_sha: String,
  pub entries: Vec<PlanEntry>,
}

/// Decide each package's status
///
/// `levels` are topological levels of package names. Planned packages
/// missing from `levels` are placed at level 0.
pub fn build_plan(
  versions: &[PackageVersion],
  levels: &[Vec<String>],
  exclude_names: &BTreeSet<String>,
  already_published: &BTreeSet<String>,
  git_sha: &str,
) -> ExecutionPlan {
  let by_name: BTreeMap<&str, &PackageVersion> = versions.iter().map(|v| (v.name.as_str(), v)).collect();

  let mut placed: BTreeMap<&str, usize> = BTreeMap::new();
  for (level, names) in levels.iter().enumerate() {
    for name in names {
      placed.entry(name.as_str()).or_insert(level);
    }
  }
  for v in versions {
    if !placed.contains_key(v.name.as_str()) {
      tracing::debug!("{} is not in the dependency graph, placing at level 0", v.name);
      placed.insert(v.name.as_str(), 0);
    }
  }

  let mut entries: Vec<PlanEntry> = placed
    .into_iter()
    .map(|(name, level)| entry(name, level, by_name.get(name).copied(), exclude_names, already_published))
    .collect();

  entries.sort_by(|a, b| (a.level, &a.name).cmp(&(b.level, &b.name)));
  for (i, entry) in entries.iter_mut().enumerate() {
    entry.order = i + 1;
  }

  ExecutionPlan {
    id: content_id(git_sha, &entries),
    git_sha: git_sha.to_string(),
    entries,
  }
}

fn content_id(git_sha: &str, entries: &[PlanEntry]) -> PlanId {
  let json = serde_json::to_vec(&(git_sha, entries)).unwrap_or_default();
  PlanId::from_contents(&json)
}

fn entry(
  name: &str,
  level: usize,
  version: Option<&PackageVersion>,
  exclude_names: &BTreeSet<String>,
  already_published: &BTreeSet<String>,
) -> PlanEntry {
  let (current_version, next_version, bump) = match version {
    Some(v) => (v.old_version.clone(), v.new_version.clone(), v.bump),
    None => (String::new(), String::new(), VersionBump::None),
  };

  let (status, reason) = if exclude_names.contains(name) {
    (PlanStatus::Excluded, "excluded from publishing".to_string())
  } else if let Some(v) = version {
    if already_published.contains(name) {
      (
        PlanStatus::AlreadyPublished,
        format!("{}@{} is already published", name, v.new_version),
      )
    } else if v.skipped || !v.is_bumped() {
      (PlanStatus::Skipped, v.reason.clone())
    } else {
      (PlanStatus::Included, v.reason.clone())
    }
  } else {
    (PlanStatus::DependencyOnly, "no planned version".to_string())
  };

  PlanEntry {
    name: name.to_string(),
    level,
    current_version,
    next_version,
    status,
    bump,
    reason,
    order: 0,
  }
}

impl ExecutionPlan {
  /// Entries that will be released
  pub fn included(&self) -> impl Iterator<Item = &PlanEntry> {
    self.entries.iter().filter(|e| e.status == PlanStatus::Included)
  }

  /// Entry count per status
  pub fn counts(&self) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for entry in &self.entries {
      *counts.entry(entry.status.as_str()).or_insert(0) += 1;
    }
    counts
  }

  pub fn id(&self) -> &PlanId {
    &self.id
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
