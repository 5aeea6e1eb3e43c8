//! Workspace context: build once, pass everywhere
//!
//! ```text
//! main.rs:
//!   WorkspaceContext::build() -> &WorkspaceContext
//!   |
//!   v
//! commands/plan.rs, check.rs, etc:
//!   fn run_*(ctx: &WorkspaceContext, ..)
//! ```
//!
//! Config, adapter, packages and graph are loaded once per process. Discovery
//! never fails, so a context over an empty or broken workspace simply has no
//! packages.

use crate::core::config::ReleaseKitConfig;
use crate::core::error::ReleaseResult;
use crate::graph::{DependencyGraph, build_graph};
use crate::workspace::{Ecosystem, Package, Workspace, detect_workspace};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared workspace-level data for every command
pub struct WorkspaceContext {
  /// Workspace root directory
  pub root: PathBuf,

  /// releasekit.toml, or defaults when absent
  pub config: Arc<ReleaseKitConfig>,

  /// Ecosystem adapter for this workspace
  pub workspace: Box<dyn Workspace>,

  /// Discovered packages, sorted by name
  pub packages: Vec<Package>,

  /// Internal dependency graph over `packages`
  pub graph: Arc<DependencyGraph>,
}

impl WorkspaceContext {
  /// Load config, pick the adapter, discover packages and build the graph
  ///
  /// `forced` takes precedence over the config's `ecosystem`.
  pub fn build(workspace_root: &Path, forced: Option<Ecosystem>) -> ReleaseResult<Self> {
    let root = workspace_root.to_path_buf();
    let config = ReleaseKitConfig::load_or_default(&root)?;
    let workspace = detect_workspace(&root, forced.or(config.ecosystem))?;
    let packages = workspace.discover(&config.exclude);
    let graph = build_graph(&packages);

    tracing::info!(
      "{} workspace at {}: {} package(s)",
      workspace.ecosystem(),
      root.display(),
      packages.len()
    );

    Ok(Self {
      root,
      config: Arc::new(config),
      workspace,
      packages,
      graph: Arc::new(graph),
    })
  }

  pub fn ecosystem(&self) -> Ecosystem {
    self.workspace.ecosystem()
  }

  /// Get workspace root as Path reference (convenience)
  pub fn workspace_root(&self) -> &Path {
    &self.root
  }

  /// Packages never published, from `exclude_publish` plus unpublishable manifests
  pub fn excluded_names(&self) -> std::collections::BTreeSet<String> {
    self
      .packages
      .iter()
      .filter(|p| !p.is_publishable)
      .map(|p| p.name.clone())
      .chain(self.config.exclude_publish.iter().cloned())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  #[test]
  fn test_build_python_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(
      root.join("pyproject.toml"),
      "[tool.uv.workspace]\nmembers = [\"packages/*\"]\n",
    )
    .unwrap();
    for (name, deps) in [("core", "[]"), ("plugin", "[\"core>=1.0\"]")] {
      let pkg = root.join("packages").join(name);
      fs::create_dir_all(&pkg).unwrap();
      fs::write(
        pkg.join("pyproject.toml"),
        format!("[project]\nname = \"{}\"\nversion = \"1.0.0\"\ndependencies = {}\n", name, deps),
      )
      .unwrap();
    }
    fs::write(root.join("releasekit.toml"), "exclude_publish = [\"plugin\"]\n").unwrap();

    let ctx = WorkspaceContext::build(root, None).unwrap();
    assert_eq!(ctx.ecosystem(), Ecosystem::Python);
    assert_eq!(ctx.packages.len(), 2);
    assert!(ctx.graph.dependencies("plugin").unwrap().contains("core"));
    assert!(ctx.excluded_names().contains("plugin"));
  }

  #[test]
  fn test_build_without_workspace_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(WorkspaceContext::build(dir.path(), None).is_err());
  }
}
