//! Workspace discovery across ecosystems
//!
//! Each ecosystem adapter implements [`Workspace`]: it parses the root and
//! member manifests into uniform [`Package`] records and knows how to rewrite
//! a version in place without disturbing the rest of the file.
//!
//! Currently supports:
//! - Rust (Cargo workspaces)
//! - Python (uv workspaces)
//! - JavaScript/TypeScript (npm/yarn/pnpm `workspaces`)
//! - Java (Maven multi-module, Gradle multi-project)
//! - Bazel (BUILD files with publishable rules)
//!
//! Discovery never fails: an unreadable or unparsable root manifest yields an
//! empty package list and a `tracing` warning.

pub mod bazel;
pub mod cargo;
pub mod gradle;
pub mod maven;
pub mod npm;
pub mod python;

use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported package ecosystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
  Cargo,
  Python,
  Npm,
  Bazel,
  Maven,
  Gradle,
}

impl Ecosystem {
  pub const ALL: [Ecosystem; 6] = [
    Ecosystem::Cargo,
    Ecosystem::Python,
    Ecosystem::Npm,
    Ecosystem::Bazel,
    Ecosystem::Maven,
    Ecosystem::Gradle,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Ecosystem::Cargo => "cargo",
      Ecosystem::Python => "python",
      Ecosystem::Npm => "npm",
      Ecosystem::Bazel => "bazel",
      Ecosystem::Maven => "maven",
      Ecosystem::Gradle => "gradle",
    }
  }

  /// Manifest file name members are discovered by
  pub fn manifest_filename(self) -> &'static str {
    match self {
      Ecosystem::Cargo => "Cargo.toml",
      Ecosystem::Python => "pyproject.toml",
      Ecosystem::Npm => "package.json",
      Ecosystem::Bazel => "BUILD.bazel",
      Ecosystem::Maven => "pom.xml",
      Ecosystem::Gradle => "build.gradle",
    }
  }
}

impl fmt::Display for Ecosystem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Ecosystem {
  type Err = ReleaseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ecosystem::ALL
      .into_iter()
      .find(|e| e.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| ReleaseError::coded(ErrorCode::ConfigInvalid, format!("unknown ecosystem '{}'", s)))
  }
}

/// Descriptive manifest fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
  pub description: Option<String>,
  pub license: Option<String>,
  pub repository: Option<String>,
  pub homepage: Option<String>,
}

impl PackageMetadata {
  /// Names of the fields registries expect but the manifest lacks
  pub fn missing_fields(&self) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if is_blank(&self.description) {
      missing.push("description");
    }
    if is_blank(&self.license) {
      missing.push("license");
    }
    if is_blank(&self.repository) && is_blank(&self.homepage) {
      missing.push("repository");
    }
    missing
  }
}

fn is_blank(field: &Option<String>) -> bool {
  field.as_deref().is_none_or(|s| s.trim().is_empty())
}

/// A discovered package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
  pub name: String,
  pub version: String,
  /// Package directory
  pub path: PathBuf,
  pub manifest_path: PathBuf,
  /// Dependencies that are packages of this workspace (may include itself)
  pub internal_deps: BTreeSet<String>,
  pub external_deps: BTreeSet<String>,
  pub all_deps: BTreeSet<String>,
  pub is_publishable: bool,
  #[serde(default)]
  pub metadata: PackageMetadata,
}

impl Package {
  /// Package directory relative to `root` (unchanged when outside it)
  pub fn relative_path(&self, root: &Path) -> PathBuf {
    self.path.strip_prefix(root).unwrap_or(&self.path).to_path_buf()
  }
}

/// A package as parsed from its manifest, before dependency classification
#[derive(Debug, Clone)]
pub(crate) struct RawPackage {
  pub name: String,
  pub version: String,
  pub path: PathBuf,
  pub manifest_path: PathBuf,
  pub deps: BTreeSet<String>,
  pub is_publishable: bool,
  pub metadata: PackageMetadata,
}

/// Ecosystem adapter
pub trait Workspace: Send + Sync {
  fn ecosystem(&self) -> Ecosystem;

  /// Workspace root directory
  fn root(&self) -> &Path;

  /// Discover packages, skipping directories matching `exclude` globs
  /// (relative to the root). Sorted by name; empty on failure.
  fn discover(&self, exclude: &[String]) -> Vec<Package>;

  /// Set the package version declared by `manifest_path` and return the
  /// previous one. Inherited versions are rewritten where they are declared.
  /// Rewriting to the current version leaves the file untouched.
  fn rewrite_version(&self, manifest_path: &Path, new_version: &str) -> ReleaseResult<String>;

  /// Re-pin `dep_name` to `new_version` in `manifest_path`, keeping the
  /// requirement operator. Returns whether anything changed.
  fn rewrite_dependency_version(&self, manifest_path: &Path, dep_name: &str, new_version: &str)
  -> ReleaseResult<bool>;

  /// Whether `rewrite_dependency_version` would change anything; writes nothing
  fn would_rewrite_dependency(&self, manifest_path: &Path, dep_name: &str, new_version: &str) -> ReleaseResult<bool>;
}

/// Pick the adapter for `root`
///
/// Tries adapters in order: Cargo → Python → npm → Maven → Gradle → Bazel,
/// unless `forced` names one.
pub fn detect_workspace(root: &Path, forced: Option<Ecosystem>) -> ReleaseResult<Box<dyn Workspace>> {
  if let Some(ecosystem) = forced {
    return Ok(adapter_for(ecosystem, root));
  }

  let order = [
    Ecosystem::Cargo,
    Ecosystem::Python,
    Ecosystem::Npm,
    Ecosystem::Maven,
    Ecosystem::Gradle,
    Ecosystem::Bazel,
  ];
  for ecosystem in order {
    if can_handle(ecosystem, root) {
      tracing::debug!("detected {} workspace at {}", ecosystem, root.display());
      return Ok(adapter_for(ecosystem, root));
    }
  }

  Err(ReleaseError::coded(
    ErrorCode::WorkspaceNotFound,
    format!("no supported workspace found at {}", root.display()),
  ))
}

fn can_handle(ecosystem: Ecosystem, root: &Path) -> bool {
  match ecosystem {
    Ecosystem::Cargo => cargo::CargoWorkspace::can_handle(root),
    Ecosystem::Python => python::PythonWorkspace::can_handle(root),
    Ecosystem::Npm => npm::NpmWorkspace::can_handle(root),
    Ecosystem::Maven => maven::MavenWorkspace::can_handle(root),
    Ecosystem::Gradle => gradle::GradleWorkspace::can_handle(root),
    Ecosystem::Bazel => bazel::BazelWorkspace::can_handle(root),
  }
}

fn adapter_for(ecosystem: Ecosystem, root: &Path) -> Box<dyn Workspace> {
  match ecosystem {
    Ecosystem::Cargo => Box::new(cargo::CargoWorkspace::new(root)),
    Ecosystem::Python => Box::new(python::PythonWorkspace::new(root)),
    Ecosystem::Npm => Box::new(npm::NpmWorkspace::new(root)),
    Ecosystem::Maven => Box::new(maven::MavenWorkspace::new(root)),
    Ecosystem::Gradle => Box::new(gradle::GradleWorkspace::new(root)),
    Ecosystem::Bazel => Box::new(bazel::BazelWorkspace::new(root)),
  }
}

/// Run an adapter's loader, degrading errors to an empty list
pub(crate) fn discover_or_warn(
  ecosystem: Ecosystem,
  root: &Path,
  load: impl FnOnce() -> ReleaseResult<Vec<RawPackage>>,
) -> Vec<Package> {
  match load() {
    Ok(raw) => classify(raw),
    Err(err) => {
      tracing::warn!("{} discovery failed at {}: {}", ecosystem, root.display(), err);
      Vec::new()
    }
  }
}

/// Split dependencies into internal/external by name lookup and sort by name
pub(crate) fn classify(raw: Vec<RawPackage>) -> Vec<Package> {
  let mut by_name: BTreeMap<String, RawPackage> = BTreeMap::new();
  for pkg in raw {
    if let Some(previous) = by_name.get(&pkg.name) {
      tracing::warn!(
        "duplicate package '{}' at {} (keeping {})",
        pkg.name,
        pkg.path.display(),
        previous.path.display()
      );
      continue;
    }
    by_name.insert(pkg.name.clone(), pkg);
  }

  let names: BTreeSet<String> = by_name.keys().cloned().collect();
  by_name
    .into_values()
    .map(|pkg| {
      let (internal, external): (BTreeSet<String>, BTreeSet<String>) =
        pkg.deps.iter().cloned().partition(|d| names.contains(d));
      Package {
        name: pkg.name,
        version: pkg.version,
        path: pkg.path,
        manifest_path: pkg.manifest_path,
        internal_deps: internal,
        external_deps: external,
        all_deps: pkg.deps,
        is_publishable: pkg.is_publishable,
        metadata: pkg.metadata,
      }
    })
    .collect()
}

/// Expand member globs into directories containing `manifest`
pub(crate) fn expand_members(root: &Path, patterns: &[String], manifest: &str) -> ReleaseResult<Vec<PathBuf>> {
  let mut dirs = BTreeSet::new();
  for pattern in patterns {
    let full = root.join(pattern);
    let full = full.to_string_lossy();
    for entry in glob::glob(&full)? {
      match entry {
        Ok(path) if path.join(manifest).is_file() => {
          dirs.insert(path);
        }
        Ok(_) => {}
        Err(err) => tracing::debug!("skipping unreadable member path: {}", err),
      }
    }
  }
  Ok(dirs.into_iter().collect())
}

/// Whether `dir` matches any exclude glob (relative to `root`)
pub(crate) fn is_excluded(root: &Path, dir: &Path, patterns: &[String]) -> bool {
  let relative = dir.strip_prefix(root).unwrap_or(dir);
  patterns.iter().any(|pattern| {
    glob::Pattern::new(pattern.trim_end_matches('/'))
      .map(|p| relative.ancestors().any(|a| !a.as_os_str().is_empty() && p.matches_path(a)))
      .unwrap_or(false)
  })
}

/// Replace the version in a requirement string, keeping its operator prefix
///
/// `"^1.0.0"` → `"^1.1.0"`, `"1.0"` → `"1.1.0"`. Returns `None` for
/// requirements that carry no version (`"*"`, `"workspace:*"`, paths).
pub(crate) fn repin(requirement: &str, new_version: &str) -> Option<String> {
  let trimmed = requirement.trim();
  let operator_len = trimmed
    .find(|c: char| !matches!(c, '^' | '~' | '=' | '<' | '>' | '!' | ' '))
    .unwrap_or(trimmed.len());
  let (operator, rest) = trimmed.split_at(operator_len);
  if !rest.starts_with(|c: char| c.is_ascii_digit()) || rest.contains([',', ' ', '|']) {
    return None;
  }
  Some(format!("{}{}", operator.trim_end(), new_version))
}

/// Write `content` only when it differs from what is on disk
pub(crate) fn write_if_changed(path: &Path, before: &str, after: &str) -> ReleaseResult<()> {
  if before != after {
    std::fs::write(path, after)?;
    tracing::debug!("rewrote {}", path.display());
  }
  Ok(())
}

/// Missing-manifest error for `path`
pub(crate) fn missing_version(path: &Path) -> ReleaseError {
  ReleaseError::coded(
    ErrorCode::WorkspaceVersionMissing,
    format!("no version declared in {}", path.display()),
  )
}
