//! Filesystem checks: required files, type markers, stale build artifacts

use super::result::CheckOutcome;
use super::trait_def::{Check, CheckContext};
use crate::core::error::ErrorCode;
use crate::workspace::{Ecosystem, Package};
use std::fs;
use std::path::{Path, PathBuf};

const LICENSE_FILES: [&str; 6] = ["LICENSE", "LICENSE.md", "LICENSE.txt", "LICENCE", "COPYING", "LICENSE-MIT"];
const README_FILES: [&str; 4] = ["README.md", "README.rst", "README.txt", "README"];

/// Directories skipped when searching a package for marker files
const SKIP_DIRS: [&str; 6] = [".venv", "node_modules", "target", "dist", "build", ".git"];

fn has_any(dir: &Path, names: &[&str]) -> bool {
  names.iter().any(|n| dir.join(n).is_file())
}

/// Publishable packages need a LICENSE (package or workspace root) and a README
pub struct MissingFilesCheck;

impl Check for MissingFilesCheck {
  fn name(&self) -> &'static str {
    "missing-files"
  }

  fn description(&self) -> &'static str {
    "Publishable packages ship a LICENSE and a README"
  }

  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome> {
    let root_license = has_any(&ctx.options.workspace_root, &LICENSE_FILES);
    let mut findings = Vec::new();
    for pkg in ctx.publishable() {
      if !root_license && !has_any(&pkg.path, &LICENSE_FILES) {
        findings.push(
          CheckOutcome::new(self.name(), format!("{} has no LICENSE file", pkg.name))
            .with_code(ErrorCode::PreflightMissingFile)
            .with_location(&ctx.relative(&pkg.path), None),
        );
      }
      if !has_any(&pkg.path, &README_FILES) {
        findings.push(
          CheckOutcome::new(self.name(), format!("{} has no README", pkg.name))
            .with_code(ErrorCode::PreflightMissingFile)
            .with_location(&ctx.relative(&pkg.path), None),
        );
      }
    }
    findings
  }
}

/// Python packages ship `py.typed`; npm packages declare `types`/`typings`
pub struct TypeMarkersCheck;

impl Check for TypeMarkersCheck {
  fn name(&self) -> &'static str {
    "type-markers"
  }

  fn description(&self) -> &'static str {
    "Typed packages declare their type information"
  }

  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome> {
    let (declares_types, hint): (fn(&Package) -> bool, &str) = match ctx.options.ecosystem {
      Ecosystem::Python => (python_declares_types, "add an empty py.typed next to __init__.py"),
      Ecosystem::Npm => (npm_declares_types, "set \"types\" in package.json"),
      _ => return Vec::new(),
    };

    ctx
      .publishable()
      .filter(|p| !declares_types(p))
      .map(|p| {
        CheckOutcome::new(self.name(), format!("{} has no type information", p.name))
          .with_code(ErrorCode::PreflightMissingTypes)
          .with_hint(hint)
          .with_location(&ctx.relative(&p.manifest_path), None)
      })
      .collect()
  }
}

/// Depth-limited search for a file name below `dir`
fn contains_file(dir: &Path, name: &str, depth: usize) -> bool {
  if dir.join(name).is_file() {
    return true;
  }
  if depth == 0 {
    return false;
  }
  let Ok(entries) = fs::read_dir(dir) else {
    return false;
  };
  entries.filter_map(Result::ok).any(|entry| {
    let path = entry.path();
    let skip = path
      .file_name()
      .and_then(|n| n.to_str())
      .is_some_and(|n| n.starts_with('.') || SKIP_DIRS.contains(&n));
    path.is_dir() && !skip && contains_file(&path, name, depth - 1)
  })
}

fn python_declares_types(pkg: &Package) -> bool {
  contains_file(&pkg.path, "py.typed", 4)
}

fn npm_declares_types(pkg: &Package) -> bool {
  let Ok(content) = fs::read_to_string(&pkg.manifest_path) else {
    return false;
  };
  let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) else {
    return false;
  };
  json.get("types").is_some() || json.get("typings").is_some() || pkg.path.join("index.d.ts").is_file()
}

/// Non-empty `dist/` directories left over from a previous build
pub fn stale_artifacts(workspace_root: &Path, packages: &[Package]) -> Vec<PathBuf> {
  let mut dirs: Vec<PathBuf> = std::iter::once(workspace_root.to_path_buf())
    .chain(packages.iter().map(|p| p.path.clone()))
    .map(|dir| dir.join("dist"))
    .filter(|dist| fs::read_dir(dist).is_ok_and(|mut entries| entries.next().is_some()))
    .collect();
  dirs.sort();
  dirs.dedup();
  dirs
}

/// Stale `dist/` artifacts would be uploaded alongside fresh ones
pub struct StaleArtifactsCheck;

impl Check for StaleArtifactsCheck {
  fn name(&self) -> &'static str {
    "stale-artifacts"
  }

  fn description(&self) -> &'static str {
    "No build artifacts are left in dist/ directories"
  }

  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome> {
    stale_artifacts(&ctx.options.workspace_root, ctx.packages)
      .into_iter()
      .map(|dir| {
        let relative = ctx.relative(&dir);
        CheckOutcome::new(self.name(), format!("{} contains old build artifacts", relative.display()))
          .with_code(ErrorCode::PreflightStaleArtifacts)
          .with_location(&relative, None)
      })
      .collect()
  }
}
