//! Check trait abstraction for the health-check catalogue
//!
//! Every catalogue check implements `Check`. Checks only read the discovered
//! packages, the dependency graph and the filesystem; none of them talks to a
//! backend, so the whole catalogue can run in parallel.

use super::result::CheckOutcome;
use crate::core::config::ReleaseKitConfig;
use crate::graph::DependencyGraph;
use crate::workspace::{Ecosystem, Package};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Severity level for a check's findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
  /// Non-blocking, but should be addressed
  Warning,
  /// Makes the result not ok
  Error,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Severity::Warning => write!(f, "WARN"),
      Severity::Error => write!(f, "ERROR"),
    }
  }
}

/// Knobs for the catalogue
#[derive(Debug, Clone)]
pub struct CheckOptions {
  pub ecosystem: Ecosystem,
  pub workspace_root: PathBuf,
  /// Package every plugin must share its version with
  pub core_package: Option<String>,
  /// Name prefix identifying plugins, e.g. `genkit-plugin-`
  pub plugin_prefix: Option<String>,
}

impl CheckOptions {
  pub fn new(ecosystem: Ecosystem, workspace_root: &Path) -> Self {
    Self {
      ecosystem,
      workspace_root: workspace_root.to_path_buf(),
      core_package: None,
      plugin_prefix: None,
    }
  }

  pub fn from_config(ecosystem: Ecosystem, workspace_root: &Path, config: &ReleaseKitConfig) -> Self {
    Self {
      core_package: config.core_package.clone(),
      plugin_prefix: config.plugin_prefix.clone(),
      ..Self::new(ecosystem, workspace_root)
    }
  }
}

/// Context passed to checks
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
  pub packages: &'a [Package],
  pub graph: &'a DependencyGraph,
  pub options: &'a CheckOptions,
}

impl CheckContext<'_> {
  pub fn publishable(&self) -> impl Iterator<Item = &Package> {
    self.packages.iter().filter(|p| p.is_publishable)
  }

  /// Path relative to the workspace root, for locations
  pub fn relative(&self, path: &Path) -> PathBuf {
    path
      .strip_prefix(&self.options.workspace_root)
      .unwrap_or(path)
      .to_path_buf()
  }
}

/// Health check trait
///
/// A check returns its findings; no findings means it passed.
pub trait Check: Send + Sync {
  /// Unique name for this check (kebab-case)
  fn name(&self) -> &'static str;

  /// Human-readable description of what this check validates
  fn description(&self) -> &'static str;

  /// Severity of this check's findings
  fn severity(&self) -> Severity {
    Severity::Warning
  }

  /// Run the check
  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome>;
}
