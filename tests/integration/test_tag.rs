//! Integration tests for tagging merged releases

use crate::helpers::{TestWorkspace, git, run_releasekit, run_releasekit_unchecked};
use anyhow::Result;
use chrono::TimeZone;
use releasekit::backends::memory::{MemoryForge, MemoryVcs};
use releasekit::backends::{PrState, PullRequest, Vcs};
use releasekit::core::config::ReleaseKitConfig;
use releasekit::tag::{ManifestSource, TagContext, tag_release};
use releasekit::version::{PackageVersion, ReleaseManifest, VersionBump, build_manifest, embed_in_pr_body};

fn version(name: &str, old: &str, new: &str) -> PackageVersion {
  PackageVersion {
    name: name.to_string(),
    old_version: old.to_string(),
    new_version: new.to_string(),
    bump: if old == new { VersionBump::None } else { VersionBump::Minor },
    skipped: old == new,
    reason: String::new(),
  }
}

fn manifest(sha: &str, versions: Vec<PackageVersion>, umbrella: &str) -> ReleaseManifest {
  build_manifest(sha, versions, umbrella, chrono::Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap())
}

#[test]
fn test_scenario_b_nothing_bumped() -> Result<()> {
  let dir = tempfile::tempdir()?;
  let vcs = MemoryVcs::new();
  let sha = vcs.add_commit("chore: release", &["core/pyproject.toml"]);
  let path = dir.path().join("manifest.json");
  manifest(&sha, vec![version("core", "1.0.0", "1.0.0")], "").save(&path)?;

  let config = ReleaseKitConfig::default();
  let result = tag_release(TagContext {
    vcs: &vcs,
    forge: None,
    config: &config,
    workspace_root: dir.path(),
    source: ManifestSource::File(path),
    dry_run: false,
  })?;
  assert!(result.ok);
  assert!(result.created.is_empty());
  assert!(vcs.list_tags()?.is_empty());
  Ok(())
}

#[test]
fn test_gitlab_publishes_without_draft() -> Result<()> {
  let dir = tempfile::tempdir()?;
  let vcs = MemoryVcs::new();
  let sha = vcs.add_commit("chore: release", &["core/pyproject.toml"]);
  let forge = MemoryForge::gitlab();
  let m = manifest(&sha, vec![version("core", "1.0.0", "1.1.0")], "v1.1.0");
  forge.insert_pr(PullRequest {
    number: 3,
    title: "chore: release main".to_string(),
    body: embed_in_pr_body(&m)?,
    labels: vec!["autorelease: pending".to_string()],
    head_branch: "releasekit--release".to_string(),
    base_branch: "main".to_string(),
    state: PrState::Merged,
    merged_at: Some("2026-06-01T10:00:00Z".to_string()),
    merge_commit_sha: Some(sha.clone()),
  });

  let config = ReleaseKitConfig::default();
  let result = tag_release(TagContext {
    vcs: &vcs,
    forge: Some(&forge),
    config: &config,
    workspace_root: dir.path(),
    source: ManifestSource::PullRequest,
    dry_run: false,
  })?;
  assert!(result.ok);
  assert_eq!(result.releases, vec!["v1.1.0"]);
  assert!(!forge.operations().iter().any(|op| op.starts_with("publish-release")));
  assert!(!forge.releases()[0].draft);
  assert_eq!(forge.pr(3).unwrap().labels, vec!["autorelease: tagged"]);
  Ok(())
}

fn merged_release() -> Result<(TestWorkspace, std::path::PathBuf)> {
  let ws = TestWorkspace::new()?;
  ws.add_package("core", "1.1.0", &[])?;
  ws.add_package("plugin", "1.0.1", &["core>=1.1.0"])?;
  let sha = ws.commit("chore: release")?;
  ws.add_remote()?;

  let manifest_path = ws.path.join("release-manifest.json");
  let m = manifest(
    &sha,
    vec![version("core", "1.0.0", "1.1.0"), version("plugin", "1.0.0", "1.0.1")],
    "v1.1.0",
  );
  m.save(&manifest_path)?;
  Ok((ws, manifest_path))
}

#[test]
fn test_cli_tag_dry_run_creates_nothing() -> Result<()> {
  let (ws, manifest_path) = merged_release()?;
  let output = run_releasekit(
    &ws.path,
    &["tag", "--manifest", manifest_path.to_str().unwrap(), "--dry-run", "--json"],
  )?;
  let result: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(result["ok"], true);
  assert_eq!(result["created"], serde_json::json!(["core-v1.1.0", "plugin-v1.0.1", "v1.1.0"]));
  assert!(ws.tags()?.is_empty());
  Ok(())
}

#[test]
fn test_cli_tag_creates_and_pushes() -> Result<()> {
  let (ws, manifest_path) = merged_release()?;
  run_releasekit(&ws.path, &["tag", "--manifest", manifest_path.to_str().unwrap()])?;
  assert_eq!(ws.tags()?, vec!["core-v1.1.0", "plugin-v1.0.1", "v1.1.0"]);

  let remote = ws.path.with_extension("remote.git");
  let output = git(&remote, &["tag", "--list"])?;
  let pushed: Vec<String> = String::from_utf8_lossy(&output.stdout).lines().map(String::from).collect();
  assert_eq!(pushed, vec!["core-v1.1.0", "plugin-v1.0.1", "v1.1.0"]);

  // A re-run finds every tag in place
  let output = run_releasekit(&ws.path, &["tag", "--manifest", manifest_path.to_str().unwrap(), "--json"])?;
  let result: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(result["created"], serde_json::json!([]));
  assert_eq!(result["skipped"].as_array().map(Vec::len), Some(3));
  Ok(())
}

#[test]
fn test_cli_tag_rolls_back_when_push_fails() -> Result<()> {
  let (ws, manifest_path) = merged_release()?;
  git(&ws.path, &["remote", "set-url", "origin", "/nonexistent/remote.git"])?;

  let output = run_releasekit_unchecked(&ws.path, &["tag", "--manifest", manifest_path.to_str().unwrap()])?;
  assert!(!output.status.success());
  assert!(String::from_utf8_lossy(&output.stderr).contains("RK-TAG-PUSH-FAILED"));
  assert!(ws.tags()?.is_empty());
  Ok(())
}

#[test]
fn test_cli_tag_rejects_manifest_without_sha() -> Result<()> {
  let (ws, manifest_path) = merged_release()?;
  let json = std::fs::read_to_string(&manifest_path)?;
  let value: serde_json::Value = serde_json::from_str(&json)?;
  let sha = value["git_sha"].as_str().unwrap_or_default().to_string();
  std::fs::write(&manifest_path, json.replace(&sha, ""))?;

  let output = run_releasekit_unchecked(&ws.path, &["tag", "--manifest", manifest_path.to_str().unwrap()])?;
  assert!(!output.status.success());
  assert!(String::from_utf8_lossy(&output.stderr).contains("RK-TAG-MISSING-SHA"));
  assert!(ws.tags()?.is_empty());
  Ok(())
}
