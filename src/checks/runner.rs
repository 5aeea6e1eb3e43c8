//! Health-check catalogue runner
//!
//! Checks are independent, so the catalogue fans out onto the rayon pool.
//! Results are merged back in catalogue order, which keeps output stable no
//! matter which check finishes first.

use super::consistency::{MetadataCheck, NamingCheck, VersionConsistencyCheck};
use super::files::{MissingFilesCheck, StaleArtifactsCheck, TypeMarkersCheck};
use super::graph_checks::{CyclesCheck, OrphanDependencyCheck, SelfDependencyCheck};
use super::result::PreflightResult;
use super::trait_def::{Check, CheckContext, CheckOptions, Severity};
use crate::graph::DependencyGraph;
use crate::workspace::Package;
use rayon::prelude::*;

/// Every catalogue check, in reporting order
pub fn default_checks() -> Vec<Box<dyn Check>> {
  vec![
    Box::new(CyclesCheck),
    Box::new(SelfDependencyCheck),
    Box::new(OrphanDependencyCheck),
    Box::new(MissingFilesCheck),
    Box::new(TypeMarkersCheck),
    Box::new(VersionConsistencyCheck),
    Box::new(NamingCheck),
    Box::new(MetadataCheck),
    Box::new(StaleArtifactsCheck),
  ]
}

/// Run a set of checks concurrently
pub fn run_catalogue(checks: &[Box<dyn Check>], ctx: &CheckContext<'_>) -> PreflightResult {
  let outcomes: Vec<_> = checks
    .par_iter()
    .map(|check| {
      tracing::debug!("running check {}", check.name());
      (check.name(), check.severity(), check.run(ctx))
    })
    .collect();

  let mut result = PreflightResult::new();
  for (name, severity, findings) in outcomes {
    if findings.is_empty() {
      result.pass(name);
      continue;
    }
    for finding in findings {
      match severity {
        Severity::Warning => result.warn(finding),
        Severity::Error => result.fail(finding),
      }
    }
  }
  result
}

/// Run the whole catalogue; no backend I/O
pub fn run_checks(packages: &[Package], graph: &DependencyGraph, options: &CheckOptions) -> PreflightResult {
  let ctx = CheckContext {
    packages,
    graph,
    options,
  };
  run_catalogue(&default_checks(), &ctx)
}
