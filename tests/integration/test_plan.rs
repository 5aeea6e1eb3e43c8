//! Integration tests for execution plans and `releasekit plan`

use crate::helpers::{TestWorkspace, run_releasekit};
use anyhow::Result;
use releasekit::plan::{ExecutionPlan, PlanStatus, build_plan};
use releasekit::version::{PackageVersion, ReleaseManifest, VersionBump};
use std::collections::BTreeSet;

fn released_workspace() -> Result<TestWorkspace> {
  let ws = TestWorkspace::new()?;
  ws.add_package("core", "1.0.0", &[])?;
  ws.add_package("plugin", "1.0.0", &["core>=1.0.0"])?;
  ws.add_package("tools", "0.2.0", &[])?;
  ws.commit("feat: initial packages")?;
  for tag in ["core-v1.0.0", "plugin-v1.0.0", "tools-v0.2.0"] {
    ws.tag(tag)?;
  }
  ws.write_file("packages/core/src/core/api.py", "\n")?;
  ws.commit("feat: api")?;
  Ok(ws)
}

#[test]
fn test_excluded_wins_over_already_published() {
  let versions = vec![PackageVersion {
    name: "core".to_string(),
    old_version: "1.0.0".to_string(),
    new_version: "1.1.0".to_string(),
    bump: VersionBump::Minor,
    skipped: false,
    reason: String::new(),
  }];
  let names: BTreeSet<String> = ["core".to_string()].into();
  let plan = build_plan(&versions, &[vec!["core".to_string()]], &names, &names, "abc");
  assert_eq!(plan.entries[0].status, PlanStatus::Excluded);
}

#[test]
fn test_cli_plan_json() -> Result<()> {
  let ws = released_workspace()?;
  let output = run_releasekit(&ws.path, &["plan", "--format", "json"])?;
  let plan = ExecutionPlan::from_json(&String::from_utf8_lossy(&output.stdout))?;

  let rows: Vec<(&str, usize, &str, PlanStatus)> = plan
    .entries
    .iter()
    .map(|e| (e.name.as_str(), e.level, e.next_version.as_str(), e.status))
    .collect();
  assert_eq!(
    rows,
    vec![
      ("core", 0, "1.1.0", PlanStatus::Included),
      ("tools", 0, "0.2.0", PlanStatus::Skipped),
      ("plugin", 1, "1.0.1", PlanStatus::Included),
    ]
  );
  Ok(())
}

#[test]
fn test_cli_plan_respects_exclude_publish() -> Result<()> {
  let ws = released_workspace()?;
  ws.write_file("releasekit.toml", "exclude_publish = [\"plugin\"]\n")?;
  ws.commit("chore: config")?;

  let output = run_releasekit(&ws.path, &["plan", "--format", "csv"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.starts_with("order,name,level"));
  assert!(stdout.contains("plugin,1,1.0.0,1.0.1,patch,excluded"), "got: {}", stdout);
  Ok(())
}

#[test]
fn test_cli_plan_writes_manifest_and_applies() -> Result<()> {
  let ws = released_workspace()?;
  let manifest_path = ws.path.join("release-manifest.json");
  run_releasekit(
    &ws.path,
    &["plan", "--manifest-out", manifest_path.to_str().unwrap(), "--apply"],
  )?;

  let manifest = ReleaseManifest::load(&manifest_path)?;
  assert_eq!(manifest.git_sha.len(), 40);
  assert_eq!(manifest.umbrella_tag, "v1.1.0");
  let bumped: Vec<&str> = manifest.bumped().iter().map(|p| p.name.as_str()).collect();
  assert_eq!(bumped, vec!["core", "plugin"]);

  assert!(ws.read_file("packages/core/pyproject.toml")?.contains("version = \"1.1.0\""));
  assert!(ws.read_file("packages/tools/pyproject.toml")?.contains("version = \"0.2.0\""));
  Ok(())
}

#[test]
fn test_cli_plan_flow() -> Result<()> {
  let ws = released_workspace()?;
  let output = run_releasekit(&ws.path, &["plan", "--format", "flow"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.starts_with("Level 0\n"), "got: {}", stdout);
  assert!(stdout.contains("plugin 1.0.0 → 1.0.1 [included]"), "got: {}", stdout);
  Ok(())
}
