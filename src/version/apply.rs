//! Write planned versions into manifests

use super::planner::PackageVersion;
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult, ResultExt};
use crate::workspace::{Package, Workspace};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Rewrite bumped packages' versions and their dependents' pins
///
/// Returns the manifests that were (or, with `dry_run`, would be) touched,
/// sorted. Dependency pins that are unpinned (`*`, `workspace:*`) are left alone.
pub fn apply_versions(
  workspace: &dyn Workspace,
  packages: &[Package],
  versions: &[PackageVersion],
  dry_run: bool,
) -> ReleaseResult<Vec<PathBuf>> {
  let by_name: BTreeMap<&str, &Package> = packages.iter().map(|p| (p.name.as_str(), p)).collect();
  let bumped: BTreeMap<&str, &str> = versions
    .iter()
    .filter(|v| v.is_bumped())
    .map(|v| (v.name.as_str(), v.new_version.as_str()))
    .collect();

  let mut touched = BTreeSet::new();

  for (&name, &new_version) in &bumped {
    let pkg = by_name.get(name).ok_or_else(|| {
      ReleaseError::coded(
        ErrorCode::GraphUnknownPackage,
        format!("planned version for unknown package '{}'", name),
      )
    })?;
    if dry_run {
      tracing::info!("[dry-run] {} {} → {}", name, pkg.version, new_version);
    } else {
      let old = workspace
        .rewrite_version(&pkg.manifest_path, new_version)
        .with_context(|| format!("Failed to bump {}", name))?;
      tracing::info!("{} {} → {}", name, old, new_version);
    }
    touched.insert(pkg.manifest_path.clone());
  }

  for pkg in packages {
    for dep in &pkg.internal_deps {
      let Some(&new_version) = bumped.get(dep.as_str()) else {
        continue;
      };
      if dep == &pkg.name {
        continue;
      }
      let changed = if dry_run {
        workspace.would_rewrite_dependency(&pkg.manifest_path, dep, new_version)
      } else {
        workspace.rewrite_dependency_version(&pkg.manifest_path, dep, new_version)
      }
      .with_context(|| format!("Failed to update {} in {}", dep, pkg.name))?;
      if changed {
        tracing::debug!("{}: {} pinned to {}", pkg.name, dep, new_version);
        touched.insert(pkg.manifest_path.clone());
      }
    }
  }

  Ok(touched.into_iter().collect())
}
