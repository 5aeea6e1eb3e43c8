//! Release planning: commit history + dependency graph → next versions
//!
//! Per package:
//! 1. Highest conventional-commit bump since the package's last release tag
//! 2. `min_bump` floor, when there is a releasable change
//! 3. Manual override, which wins even with no commits
//! 4. Dependency propagation: dependents of a bumped package get a patch, transitively

use super::bump::{VersionBump, bump_version, parse_version};
use super::commits::{bump_for_commits, bump_for_message};
use crate::backends::{Commit, Vcs};
use crate::core::config::format_tag;
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::graph::build_graph;
use crate::workspace::Package;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

/// Reason recorded for packages with nothing to release
pub const NO_CHANGES: &str = "no changes since last tag";

/// Commits per package name, newest first
pub type CommitLog = BTreeMap<String, Vec<Commit>>;

/// Planned version for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
  pub name: String,
  pub old_version: String,
  pub new_version: String,
  pub bump: VersionBump,
  #[serde(default)]
  pub skipped: bool,
  #[serde(default)]
  pub reason: String,
}

impl PackageVersion {
  /// Whether this entry changes the version
  pub fn is_bumped(&self) -> bool {
    self.new_version != self.old_version
  }
}

/// Planner knobs (usually from `ReleaseKitConfig`)
#[derive(Debug, Clone, Default)]
pub struct VersionOptions {
  pub min_bump: VersionBump,
  pub overrides: BTreeMap<String, VersionBump>,
}

impl VersionOptions {
  pub fn from_config(config: &crate::core::config::ReleaseKitConfig) -> Self {
    Self {
      min_bump: config.min_bump,
      overrides: config.overrides.clone(),
    }
  }
}

/// Compute the next version of every package
///
/// Output is sorted by name and depends only on the inputs.
pub fn compute_versions(
  packages: &[Package],
  commit_log: &CommitLog,
  options: &VersionOptions,
) -> ReleaseResult<Vec<PackageVersion>> {
  let mut bumps: BTreeMap<&str, (VersionBump, String)> = BTreeMap::new();

  for pkg in packages {
    let commits = commit_log.get(&pkg.name).map(Vec::as_slice).unwrap_or_default();
    let from_commits = bump_for_commits(commits);

    let planned = match options.overrides.get(&pkg.name) {
      Some(&forced) => (forced, format!("override: {}", forced)),
      None if from_commits > VersionBump::None => {
        let releasable = commits
          .iter()
          .filter(|c| bump_for_message(&c.message()) > VersionBump::None)
          .count();
        let noun = if releasable == 1 { "commit" } else { "commits" };
        (
          from_commits.max(options.min_bump),
          format!("{} releasable {} ({})", releasable, noun, from_commits.max(options.min_bump)),
        )
      }
      None => (VersionBump::None, NO_CHANGES.to_string()),
    };
    // Unparsable versions are not bumped and do not propagate
    let planned = match parse_version(&pkg.version) {
      Err(err) if planned.0 > VersionBump::None => {
        tracing::warn!("not bumping {}: {}", pkg.name, err);
        (VersionBump::None, unbumpable(&err))
      }
      _ => planned,
    };
    bumps.insert(pkg.name.as_str(), planned);
  }

  propagate(packages, &mut bumps);

  let mut versions = Vec::with_capacity(packages.len());
  for pkg in packages {
    let (mut bump, mut reason) = bumps[pkg.name.as_str()].clone();
    let new_version = match bump_version(&pkg.version, bump) {
      Ok(version) => version,
      Err(err) => {
        tracing::warn!("not bumping {}: {}", pkg.name, err);
        bump = VersionBump::None;
        reason = unbumpable(&err);
        pkg.version.clone()
      }
    };
    versions.push(PackageVersion {
      name: pkg.name.clone(),
      old_version: pkg.version.clone(),
      new_version,
      bump,
      skipped: bump == VersionBump::None,
      reason,
    });
  }
  versions.sort_by(|a, b| a.name.cmp(&b.name));
  Ok(versions)
}

fn unbumpable(err: &ReleaseError) -> String {
  format!("version cannot be bumped: {}", err)
}

/// Give every transitive dependent of a bumped package at least a patch
fn propagate(packages: &[Package], bumps: &mut BTreeMap<&str, (VersionBump, String)>) {
  let graph = build_graph(packages);
  let mut queue: VecDeque<String> = bumps
    .iter()
    .filter(|(_, (bump, _))| *bump > VersionBump::None)
    .map(|(name, _)| name.to_string())
    .collect();

  let mut propagated = BTreeSet::new();
  while let Some(name) = queue.pop_front() {
    for dependent in graph.reverse_deps(&name) {
      let Some(entry) = bumps.get_mut(dependent.as_str()) else {
        continue;
      };
      if entry.0 == VersionBump::None && propagated.insert(dependent.clone()) {
        entry.0 = VersionBump::Patch;
        queue.push_back(dependent);
      }
    }
  }

  for name in propagated {
    let Some(deps) = graph.dependencies(&name) else {
      continue;
    };
    let bumped: Vec<&str> = deps
      .iter()
      .filter(|dep| **dep != name)
      .filter(|dep| bumps.get(dep.as_str()).is_some_and(|(b, _)| *b > VersionBump::None))
      .map(String::as_str)
      .collect();
    if let Some(entry) = bumps.get_mut(name.as_str()) {
      entry.1 = format!("dependency bumped: {}", bumped.join(", "));
    }
  }
}

/// Commits touching each package since its last release tag
///
/// The last release tag is `tag_format` rendered with the package's current
/// version; without it the package's whole history counts.
pub fn collect_commit_log(
  vcs: &dyn Vcs,
  packages: &[Package],
  tag_format: &str,
  workspace_root: &Path,
) -> ReleaseResult<CommitLog> {
  let mut log = CommitLog::new();
  for pkg in packages {
    let tag = format_tag(tag_format, &pkg.name, &pkg.version);
    let since = if vcs.tag_exists(&tag)? {
      Some(tag)
    } else {
      tracing::debug!("{} has no tag {}, using full history", pkg.name, tag);
      None
    };

    let relative = pkg.relative_path(workspace_root);
    let paths = if relative.as_os_str().is_empty() {
      Vec::new()
    } else {
      vec![relative]
    };
    let commits = vcs
      .log(since.as_deref(), &paths)
      .with_context(|| format!("Failed to read history of {}", pkg.name))?;
    log.insert(pkg.name.clone(), commits);
  }
  Ok(log)
}
