//! Integration tests for version planning against real git history

use crate::helpers::TestWorkspace;
use anyhow::Result;
use chrono::TimeZone;
use releasekit::backends::git::SystemGit;
use releasekit::backends::Vcs;
use releasekit::version::{
  NO_CHANGES, VersionBump, VersionOptions, apply_versions, build_manifest, collect_commit_log, compute_versions,
  embed_in_pr_body, extract_from_pr_body,
};
use releasekit::workspace::python::PythonWorkspace;
use releasekit::workspace::Workspace;
use std::collections::BTreeMap;

const TAG_FORMAT: &str = "{name}-v{version}";

fn released_workspace() -> Result<TestWorkspace> {
  let ws = TestWorkspace::new()?;
  ws.add_package("core", "1.0.0", &[])?;
  ws.add_package("plugin", "1.0.0", &["core>=1.0.0"])?;
  ws.add_package("docs-site", "0.3.0", &[])?;
  ws.commit("feat: initial packages")?;
  ws.tag("core-v1.0.0")?;
  ws.tag("plugin-v1.0.0")?;
  ws.tag("docs-site-v0.3.0")?;
  Ok(ws)
}

#[test]
fn test_versions_from_history_with_propagation() -> Result<()> {
  let ws = released_workspace()?;
  ws.write_file("packages/core/src/core/api.py", "def new_api(): ...\n")?;
  ws.commit("feat: add new api")?;
  ws.write_file("packages/docs-site/README.md", "# docs\n\nMore words.\n")?;
  ws.commit("docs: expand readme")?;

  let git = SystemGit::open(&ws.path)?;
  let workspace = PythonWorkspace::new(&ws.path);
  let packages = workspace.discover(&[]);
  let log = collect_commit_log(&git, &packages, TAG_FORMAT, &ws.path)?;
  assert_eq!(log["core"].len(), 1);
  assert_eq!(log["plugin"].len(), 0);

  let versions = compute_versions(&packages, &log, &VersionOptions::default())?;
  let by_name: BTreeMap<&str, _> = versions.iter().map(|v| (v.name.as_str(), v)).collect();

  assert_eq!(by_name["core"].new_version, "1.1.0");
  assert_eq!(by_name["core"].bump, VersionBump::Minor);

  assert_eq!(by_name["plugin"].new_version, "1.0.1");
  assert_eq!(by_name["plugin"].bump, VersionBump::Patch);
  assert_eq!(by_name["plugin"].reason, "dependency bumped: core");

  assert!(by_name["docs-site"].skipped);
  assert_eq!(by_name["docs-site"].reason, NO_CHANGES);
  assert_eq!(by_name["docs-site"].new_version, "0.3.0");
  Ok(())
}

#[test]
fn test_breaking_change_footer_is_major() -> Result<()> {
  let ws = released_workspace()?;
  ws.write_file("packages/plugin/src/plugin/x.py", "x = 1\n")?;
  ws.commit("refactor: rework config\n\nBREAKING CHANGE: config keys renamed")?;

  let git = SystemGit::open(&ws.path)?;
  let packages = PythonWorkspace::new(&ws.path).discover(&[]);
  let log = collect_commit_log(&git, &packages, TAG_FORMAT, &ws.path)?;
  let versions = compute_versions(&packages, &log, &VersionOptions::default())?;
  let plugin = versions.iter().find(|v| v.name == "plugin").unwrap();
  assert_eq!(plugin.new_version, "2.0.0");
  Ok(())
}

#[test]
fn test_manifest_survives_pr_body() -> Result<()> {
  let ws = released_workspace()?;
  ws.write_file("packages/core/src/core/fix.py", "\n")?;
  ws.commit("fix: off by one")?;

  let git = SystemGit::open(&ws.path)?;
  let packages = PythonWorkspace::new(&ws.path).discover(&[]);
  let log = collect_commit_log(&git, &packages, TAG_FORMAT, &ws.path)?;
  let versions = compute_versions(&packages, &log, &VersionOptions::default())?;

  let created_at = chrono::Utc.with_ymd_and_hms(2026, 5, 4, 3, 2, 1).unwrap();
  let manifest = build_manifest(&git.head_sha()?, versions, "v1.0.1", created_at);
  assert_eq!(manifest.created_at, "2026-05-04T03:02:01Z");

  let body = embed_in_pr_body(&manifest)?;
  let parsed = extract_from_pr_body(&body)?;
  assert_eq!(parsed, manifest);
  assert_eq!(parsed.to_json()?, manifest.to_json()?);
  Ok(())
}

#[test]
fn test_apply_versions_rewrites_manifests() -> Result<()> {
  let ws = released_workspace()?;
  ws.write_file("packages/core/src/core/api.py", "\n")?;
  ws.commit("feat: api")?;

  let git = SystemGit::open(&ws.path)?;
  let workspace = PythonWorkspace::new(&ws.path);
  let packages = workspace.discover(&[]);
  let log = collect_commit_log(&git, &packages, TAG_FORMAT, &ws.path)?;
  let versions = compute_versions(&packages, &log, &VersionOptions::default())?;

  let before = ws.read_file("packages/core/pyproject.toml")?;
  let preview = apply_versions(&workspace, &packages, &versions, true)?;
  assert_eq!(ws.read_file("packages/core/pyproject.toml")?, before);

  let touched = apply_versions(&workspace, &packages, &versions, false)?;
  assert_eq!(preview, touched);
  assert!(ws.read_file("packages/core/pyproject.toml")?.contains("version = \"1.1.0\""));
  assert!(ws.read_file("packages/plugin/pyproject.toml")?.contains("core>=1.1.0"));
  Ok(())
}

#[test]
fn test_rewrite_version_twice_is_noop() -> Result<()> {
  let ws = released_workspace()?;
  let workspace = PythonWorkspace::new(&ws.path);
  let manifest = ws.path.join("packages/core/pyproject.toml");

  assert_eq!(workspace.rewrite_version(&manifest, "1.2.0")?, "1.0.0");
  let first = ws.read_file("packages/core/pyproject.toml")?;
  assert_eq!(workspace.rewrite_version(&manifest, "1.2.0")?, "1.2.0");
  assert_eq!(ws.read_file("packages/core/pyproject.toml")?, first);
  Ok(())
}
