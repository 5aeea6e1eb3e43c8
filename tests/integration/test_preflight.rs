//! Integration tests for preflight against a real git checkout

use crate::helpers::{TestWorkspace, git};
use anyhow::Result;
use releasekit::backends::git::SystemGit;
use releasekit::backends::memory::{MemoryPackageManager, MemoryRegistry};
use releasekit::checks::{PreflightContext, PreflightResult, run_preflight};
use releasekit::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use releasekit::graph::build_graph;
use releasekit::version::{PackageVersion, VersionBump};
use releasekit::workspace::python::PythonWorkspace;
use releasekit::workspace::Workspace;
use std::collections::BTreeMap;

fn bumped(name: &str, old: &str, new: &str) -> PackageVersion {
  PackageVersion {
    name: name.to_string(),
    old_version: old.to_string(),
    new_version: new.to_string(),
    bump: VersionBump::Minor,
    skipped: false,
    reason: "1 releasable commit (minor)".to_string(),
  }
}

fn preflight(
  ws: &TestWorkspace,
  pm: &MemoryPackageManager,
  registry: &MemoryRegistry,
  versions: &[PackageVersion],
) -> ReleaseResult<PreflightResult> {
  let git = SystemGit::open(&ws.path)?;
  let packages = PythonWorkspace::new(&ws.path).discover(&[]);
  let graph = build_graph(&packages);
  run_preflight(PreflightContext {
    vcs: &git,
    pm,
    forge: None,
    registry,
    packages: &packages,
    graph: &graph,
    versions,
    workspace_root: &ws.path,
    dry_run: false,
    skip_version_check: false,
    env: BTreeMap::new(),
  })
}

fn workspace() -> Result<TestWorkspace> {
  let ws = TestWorkspace::new()?;
  ws.add_package("core", "1.0.0", &[])?;
  ws.add_package("plugin", "1.0.0", &["core"])?;
  ws.commit("feat: packages")?;
  Ok(ws)
}

#[test]
fn test_clean_checkout_passes() -> Result<()> {
  let ws = workspace()?;
  let pm = MemoryPackageManager::new("uv");
  let registry = MemoryRegistry::new("pypi");
  let versions = vec![bumped("core", "1.0.0", "1.1.0")];

  let result = preflight(&ws, &pm, &registry, &versions)?;
  assert!(result.ok());
  assert_eq!(
    result.passed,
    vec![
      "release-lock",
      "clean-worktree",
      "lockfile",
      "shallow-clone",
      "cycles",
      "forge",
      "stale-artifacts",
      "version-conflicts"
    ]
  );
  Ok(())
}

#[test]
fn test_dirty_tree_stops_before_later_checks() -> Result<()> {
  let ws = workspace()?;
  ws.write_file("packages/core/src/core/wip.py", "# unfinished\n")?;
  let pm = MemoryPackageManager::new("uv");
  let registry = MemoryRegistry::new("pypi");

  let err = preflight(&ws, &pm, &registry, &[bumped("core", "1.0.0", "1.1.0")]).unwrap_err();
  match err {
    ReleaseError::Blocked { check, info, result } => {
      assert_eq!(check, "clean-worktree");
      assert_eq!(info.code, ErrorCode::PreflightDirtyWorktree);
      assert_eq!(result.passed, vec!["release-lock"]);
    }
    other => panic!("expected a blocked preflight, got {}", other),
  }
  assert!(pm.calls().is_empty(), "lockfile check ran on a dirty tree");
  assert_eq!(registry.lookups(), 0);
  Ok(())
}

#[test]
fn test_stale_dist_blocks() -> Result<()> {
  let ws = workspace()?;
  ws.write_file("packages/core/dist/core-0.9.0.tar.gz", "old")?;
  // Ignored by git so the tree stays clean
  ws.write_file(".gitignore", "dist/\n")?;
  git(&ws.path, &["add", ".gitignore"])?;
  git(&ws.path, &["commit", "-m", "chore: ignore dist"])?;

  let pm = MemoryPackageManager::new("uv");
  let registry = MemoryRegistry::new("pypi");
  let err = preflight(&ws, &pm, &registry, &[]).unwrap_err();
  assert_eq!(err.code(), Some(ErrorCode::PreflightStaleArtifacts));
  Ok(())
}

#[test]
fn test_every_conflict_is_listed() -> Result<()> {
  let ws = workspace()?;
  let pm = MemoryPackageManager::new("uv");
  let registry = MemoryRegistry::new("pypi");
  registry.publish("core", "1.1.0");
  registry.publish("plugin", "1.0.1");

  let versions = vec![bumped("core", "1.0.0", "1.1.0"), bumped("plugin", "1.0.0", "1.0.1")];
  let err = preflight(&ws, &pm, &registry, &versions).unwrap_err();
  assert_eq!(err.code(), Some(ErrorCode::PreflightVersionConflict));
  let message = err.to_string();
  assert!(message.contains("core@1.1.0"), "got: {}", message);
  assert!(message.contains("plugin@1.0.1"), "got: {}", message);
  Ok(())
}
