//! Integration tests for discovery and the dependency graph

use crate::helpers::{TestWorkspace, run_releasekit, run_releasekit_unchecked};
use anyhow::Result;
use releasekit::core::error::ErrorCode;
use releasekit::graph::{build_graph, detect_cycles, topo_levels, topo_sort};
use releasekit::workspace::python::PythonWorkspace;
use releasekit::workspace::{Package, Workspace};
use std::collections::BTreeMap;

fn scenario_a() -> Result<TestWorkspace> {
  let ws = TestWorkspace::new()?;
  ws.add_package("core", "1.0.0", &[])?;
  ws.add_package("plugin-a", "1.0.0", &["core>=1.0.0"])?;
  ws.add_package("plugin-b", "1.0.0", &["core>=1.0.0", "plugin-a>=1.0.0"])?;
  ws.commit("feat: add packages")?;
  Ok(ws)
}

fn discover(ws: &TestWorkspace) -> Vec<Package> {
  PythonWorkspace::new(&ws.path).discover(&[])
}

#[test]
fn test_scenario_a_levels() -> Result<()> {
  let ws = scenario_a()?;
  let packages = discover(&ws);
  let graph = build_graph(&packages);

  let levels = topo_levels(&graph)?;
  assert_eq!(levels, vec![vec!["core"], vec!["plugin-a"], vec!["plugin-b"]]);

  let sorted = topo_sort(&graph, &packages)?;
  let names: Vec<Vec<&str>> = sorted
    .iter()
    .map(|level| level.iter().map(|p| p.name.as_str()).collect())
    .collect();
  assert_eq!(names, vec![vec!["core"], vec!["plugin-a"], vec!["plugin-b"]]);
  Ok(())
}

#[test]
fn test_levels_place_dependencies_first() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.add_package("base", "1.0.0", &[])?;
  ws.add_package("util", "1.0.0", &[])?;
  ws.add_package("io", "1.0.0", &["base"])?;
  ws.add_package("net", "1.0.0", &["base", "util"])?;
  ws.add_package("app", "1.0.0", &["io", "net", "requests>=2"])?;
  ws.commit("feat: packages")?;

  let packages = discover(&ws);
  let graph = build_graph(&packages);
  let levels = topo_levels(&graph)?;

  let level_of: BTreeMap<&str, usize> = levels
    .iter()
    .enumerate()
    .flat_map(|(i, names)| names.iter().map(move |n| (n.as_str(), i)))
    .collect();
  for pkg in &packages {
    let level = level_of[pkg.name.as_str()];
    if level == 0 {
      assert!(pkg.internal_deps.is_empty(), "{} at level 0 has deps", pkg.name);
    }
    for dep in &pkg.internal_deps {
      assert!(level_of[dep.as_str()] < level, "{} is not below {}", dep, pkg.name);
    }
  }
  assert_eq!(levels[0], vec!["base", "util"]);
  Ok(())
}

#[test]
fn test_cycles_reported_and_block_levels() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.add_package("a", "1.0.0", &["b"])?;
  ws.add_package("b", "1.0.0", &["a"])?;
  ws.add_package("c", "1.0.0", &["c"])?;
  ws.add_package("d", "1.0.0", &[])?;
  ws.commit("feat: cyclic packages")?;

  let graph = build_graph(&discover(&ws));
  let cycles = detect_cycles(&graph);
  assert!(!cycles.is_empty());
  for name in ["a", "b", "c"] {
    assert!(cycles.iter().any(|cycle| cycle.iter().any(|n| n == name)), "{} not in a cycle", name);
  }
  assert!(cycles.iter().all(|cycle| !cycle.iter().any(|n| n == "d")));

  let err = topo_levels(&graph).unwrap_err();
  assert_eq!(err.code(), Some(ErrorCode::GraphCycle));
  Ok(())
}

#[test]
fn test_acyclic_graph_has_no_cycles() -> Result<()> {
  let ws = scenario_a()?;
  assert!(detect_cycles(&build_graph(&discover(&ws))).is_empty());
  Ok(())
}

#[test]
fn test_cli_discover_json() -> Result<()> {
  let ws = scenario_a()?;
  let output = run_releasekit(&ws.path, &["discover", "--json"])?;
  let packages: Vec<Package> = serde_json::from_slice(&output.stdout)?;
  let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
  assert_eq!(names, vec!["core", "plugin-a", "plugin-b"]);
  Ok(())
}

#[test]
fn test_cli_graph_text() -> Result<()> {
  let ws = scenario_a()?;
  let output = run_releasekit(&ws.path, &["graph"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("Level 0: core"), "got: {}", stdout);
  assert!(stdout.contains("Level 2: plugin-b"), "got: {}", stdout);
  Ok(())
}

#[test]
fn test_cli_graph_fails_on_cycle() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.add_package("a", "1.0.0", &["b"])?;
  ws.add_package("b", "1.0.0", &["a"])?;
  ws.commit("feat: cycle")?;

  let output = run_releasekit_unchecked(&ws.path, &["graph"])?;
  assert!(!output.status.success());
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("RK-GRAPH-CYCLE"), "got: {}", stderr);
  Ok(())
}
