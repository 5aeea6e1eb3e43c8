//! Dependency-graph checks: cycles, self-dependencies, orphan internal deps

use super::result::CheckOutcome;
use super::trait_def::{Check, CheckContext, Severity};
use crate::core::error::ErrorCode;
use crate::graph::{detect_cycles, format_cycles};
use std::collections::BTreeMap;

/// Dependency cycles between packages (self-loops are reported separately)
pub struct CyclesCheck;

impl Check for CyclesCheck {
  fn name(&self) -> &'static str {
    "cycles"
  }

  fn description(&self) -> &'static str {
    "Detect dependency cycles between workspace packages"
  }

  fn severity(&self) -> Severity {
    Severity::Error
  }

  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome> {
    detect_cycles(ctx.graph)
      .into_iter()
      .filter(|cycle| cycle.len() > 1)
      .map(|cycle| {
        CheckOutcome::new(self.name(), format!("dependency cycle: {}", format_cycles(&[cycle])))
          .with_code(ErrorCode::GraphCycle)
      })
      .collect()
  }
}

/// Packages listing themselves as a dependency
pub struct SelfDependencyCheck;

impl Check for SelfDependencyCheck {
  fn name(&self) -> &'static str {
    "self-deps"
  }

  fn description(&self) -> &'static str {
    "Detect packages that depend on themselves"
  }

  fn severity(&self) -> Severity {
    Severity::Error
  }

  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome> {
    ctx
      .packages
      .iter()
      .filter(|p| p.internal_deps.contains(&p.name))
      .map(|p| {
        CheckOutcome::new(self.name(), format!("{} depends on itself", p.name))
          .with_code(ErrorCode::GraphSelfDependency)
          .with_location(&ctx.relative(&p.manifest_path), None)
      })
      .collect()
  }
}

/// Internal dependencies that cannot be satisfied from a registry
///
/// Either the dependency is not part of the checked package set, or a
/// publishable package depends on a package that is never published.
pub struct OrphanDependencyCheck;

impl Check for OrphanDependencyCheck {
  fn name(&self) -> &'static str {
    "orphan-deps"
  }

  fn description(&self) -> &'static str {
    "Detect internal dependencies that are missing or unpublishable"
  }

  fn severity(&self) -> Severity {
    Severity::Error
  }

  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome> {
    let by_name: BTreeMap<&str, bool> = ctx
      .packages
      .iter()
      .map(|p| (p.name.as_str(), p.is_publishable))
      .collect();

    let mut findings = Vec::new();
    for pkg in ctx.packages {
      for dep in pkg.internal_deps.iter().filter(|d| **d != pkg.name) {
        let message = match by_name.get(dep.as_str()) {
          None => format!("{} depends on {}, which is not a workspace package", pkg.name, dep),
          Some(false) if pkg.is_publishable => {
            format!("{} is published but depends on unpublished package {}", pkg.name, dep)
          }
          Some(_) => continue,
        };
        findings.push(
          CheckOutcome::new(self.name(), message)
            .with_code(ErrorCode::GraphOrphanDependency)
            .with_location(&ctx.relative(&pkg.manifest_path), None),
        );
      }
    }
    findings
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::checks::trait_def::CheckOptions;
  use crate::graph::build_graph;
  use crate::workspace::{Ecosystem, Package};
  use std::collections::BTreeSet;
  use std::path::{Path, PathBuf};

  fn pkg(name: &str, deps: &[&str], publishable: bool) -> Package {
    Package {
      name: name.to_string(),
      version: "1.0.0".to_string(),
      path: PathBuf::from("/ws").join(name),
      manifest_path: PathBuf::from("/ws").join(name).join("package.json"),
      internal_deps: deps.iter().map(|d| d.to_string()).collect(),
      external_deps: BTreeSet::new(),
      all_deps: deps.iter().map(|d| d.to_string()).collect(),
      is_publishable: publishable,
      metadata: Default::default(),
    }
  }

  fn run(check: &dyn Check, packages: &[Package]) -> Vec<CheckOutcome> {
    let graph = build_graph(packages);
    let options = CheckOptions::new(Ecosystem::Npm, Path::new("/ws"));
    check.run(&CheckContext {
      packages,
      graph: &graph,
      options: &options,
    })
  }

  #[test]
  fn test_check_names() {
    assert_eq!(CyclesCheck.name(), "cycles");
    assert_eq!(SelfDependencyCheck.name(), "self-deps");
    assert_eq!(OrphanDependencyCheck.name(), "orphan-deps");
  }

  #[test]
  fn test_cycles_exclude_self_loops() {
    let packages = vec![pkg("a", &["b"], true), pkg("b", &["a"], true), pkg("c", &["c"], true)];
    let findings = run(&CyclesCheck, &packages);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].message, "dependency cycle: a -> b -> a");

    let selfs = run(&SelfDependencyCheck, &packages);
    assert_eq!(selfs.len(), 1);
    assert_eq!(selfs[0].location.as_ref().unwrap().path, PathBuf::from("c/package.json"));
  }

  #[test]
  fn test_orphans() {
    let packages = vec![
      pkg("app", &["private-utils", "ghost"], true),
      pkg("private-utils", &[], false),
      pkg("tool", &["private-utils"], false),
    ];
    let findings = run(&OrphanDependencyCheck, &packages);
    let messages: Vec<_> = findings.iter().map(|f| f.message.as_str()).collect();
    assert_eq!(
      messages,
      vec![
        "app depends on ghost, which is not a workspace package",
        "app is published but depends on unpublished package private-utils",
      ]
    );
  }
}
