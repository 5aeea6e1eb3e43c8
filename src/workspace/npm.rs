//! npm / yarn / pnpm workspace adapter
//!
//! Members come from the root `package.json` `workspaces` field (array or
//! `{ "packages": [...] }`). Rewrites are targeted regex replacements so key
//! order and indentation of `package.json` are untouched.

use super::{
  Ecosystem, Package, PackageMetadata, RawPackage, Workspace, discover_or_warn, expand_members, is_excluded,
  missing_version, repin, write_if_changed,
};
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult, ResultExt};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// The first `"version": "..."` pair, which is the top-level one in practice
static VERSION_FIELD: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"("version"\s*:\s*")([^"]*)(")"#).expect("valid regex"));

/// Dependency sections whose entries may be re-pinned
const DEPENDENCY_SECTIONS: [&str; 4] = [
  "dependencies",
  "devDependencies",
  "peerDependencies",
  "optionalDependencies",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
  name: Option<String>,
  version: Option<String>,
  #[serde(default)]
  private: bool,
  description: Option<String>,
  license: Option<String>,
  homepage: Option<String>,
  repository: Option<Repository>,
  workspaces: Option<WorkspaceSpec>,
  #[serde(default)]
  dependencies: BTreeMap<String, String>,
  #[serde(default)]
  dev_dependencies: BTreeMap<String, String>,
  #[serde(default)]
  peer_dependencies: BTreeMap<String, String>,
  #[serde(default)]
  optional_dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Repository {
  Url(String),
  Object { url: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkspaceSpec {
  Array(Vec<String>),
  Object { packages: Vec<String> },
}

impl WorkspaceSpec {
  fn patterns(&self) -> &[String] {
    match self {
      WorkspaceSpec::Array(patterns) => patterns,
      WorkspaceSpec::Object { packages } => packages,
    }
  }
}

fn read_package_json(path: &Path) -> ReleaseResult<PackageJson> {
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
  serde_json::from_str(&content).map_err(|e| {
    ReleaseError::coded(
      ErrorCode::WorkspaceParse,
      format!("Failed to parse {}: {}", path.display(), e),
    )
  })
}

pub struct NpmWorkspace {
  root: PathBuf,
}

impl NpmWorkspace {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
    }
  }

  /// Root package.json has a `workspaces` field
  pub fn can_handle(root: &Path) -> bool {
    read_package_json(&root.join("package.json")).is_ok_and(|pkg| pkg.workspaces.is_some())
  }

  fn load(&self, exclude: &[String]) -> ReleaseResult<Vec<RawPackage>> {
    let root_json = read_package_json(&self.root.join("package.json"))?;
    let patterns: Vec<String> = root_json
      .workspaces
      .as_ref()
      .map(|w| w.patterns().to_vec())
      .unwrap_or_default();

    // `!pattern` entries are negations
    let (negated, members): (Vec<String>, Vec<String>) = patterns.into_iter().partition(|p| p.starts_with('!'));
    let mut excluded: Vec<String> = negated.iter().map(|p| p.trim_start_matches('!').to_string()).collect();
    excluded.extend(exclude.iter().cloned());

    let mut packages = Vec::new();
    for dir in expand_members(&self.root, &members, "package.json")? {
      if is_excluded(&self.root, &dir, &excluded) || dir.components().any(|c| c.as_os_str() == "node_modules") {
        continue;
      }
      let manifest_path = dir.join("package.json");
      match parse_member(&dir, &manifest_path) {
        Ok(pkg) => packages.push(pkg),
        Err(err) => tracing::warn!("skipping {}: {}", manifest_path.display(), err),
      }
    }
    Ok(packages)
  }

  /// Re-pin `dep_name`; with `write == false` only reports whether it would change
  fn repin_dependency(&self, manifest_path: &Path, dep_name: &str, new_version: &str, write: bool) -> ReleaseResult<bool> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let entry = Regex::new(&format!(r#"("{}"\s*:\s*")([^"]*)(")"#, regex::escape(dep_name)))
      .map_err(|e| ReleaseError::message(format!("invalid dependency name '{}': {}", dep_name, e)))?;

    let mut after = before.clone();
    for section in DEPENDENCY_SECTIONS {
      let Some(range) = section_range(&after, section) else {
        continue;
      };
      let block = &after[range.clone()];
      let rewritten = entry
        .replace_all(block, |caps: &regex::Captures| match repin(&caps[2], new_version) {
          Some(updated) => format!("{}{}{}", &caps[1], updated, &caps[3]),
          None => caps[0].to_string(),
        })
        .into_owned();
      after.replace_range(range, &rewritten);
    }

    if write {
      write_if_changed(manifest_path, &before, &after)?;
    }
    Ok(before != after)
  }
}

fn parse_member(dir: &Path, manifest_path: &Path) -> ReleaseResult<RawPackage> {
  let pkg = read_package_json(manifest_path)?;
  let name = pkg
    .name
    .ok_or_else(|| ReleaseError::coded(ErrorCode::WorkspaceParse, "package.json has no name"))?;
  let version = pkg.version.ok_or_else(|| missing_version(manifest_path))?;

  let deps: BTreeSet<String> = pkg
    .dependencies
    .into_keys()
    .chain(pkg.dev_dependencies.into_keys())
    .chain(pkg.peer_dependencies.into_keys())
    .chain(pkg.optional_dependencies.into_keys())
    .collect();

  Ok(RawPackage {
    name,
    version,
    path: dir.to_path_buf(),
    manifest_path: manifest_path.to_path_buf(),
    deps,
    is_publishable: !pkg.private,
    metadata: PackageMetadata {
      description: pkg.description,
      license: pkg.license,
      repository: pkg.repository.map(|r| match r {
        Repository::Url(url) | Repository::Object { url } => url,
      }),
      homepage: pkg.homepage,
    },
  })
}

/// Byte range of the `{ ... }` object following `"section":`
fn section_range(content: &str, section: &str) -> Option<std::ops::Range<usize>> {
  let key = format!("\"{}\"", section);
  let key_at = content.find(&key)?;
  let open = key_at + content[key_at..].find('{')?;
  let mut depth = 0usize;
  for (offset, c) in content[open..].char_indices() {
    match c {
      '{' => depth += 1,
      '}' => {
        depth -= 1;
        if depth == 0 {
          return Some(open..open + offset + 1);
        }
      }
      _ => {}
    }
  }
  None
}

impl Workspace for NpmWorkspace {
  fn ecosystem(&self) -> Ecosystem {
    Ecosystem::Npm
  }

  fn root(&self) -> &Path {
    &self.root
  }

  fn discover(&self, exclude: &[String]) -> Vec<Package> {
    discover_or_warn(Ecosystem::Npm, &self.root, || self.load(exclude))
  }

  fn rewrite_version(&self, manifest_path: &Path, new_version: &str) -> ReleaseResult<String> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let caps = VERSION_FIELD
      .captures(&before)
      .ok_or_else(|| missing_version(manifest_path))?;
    let old = caps[2].to_string();
    let after = VERSION_FIELD
      .replacen(&before, 1, |caps: &regex::Captures| {
        format!("{}{}{}", &caps[1], new_version, &caps[3])
      })
      .into_owned();
    write_if_changed(manifest_path, &before, &after)?;
    Ok(old)
  }

  fn rewrite_dependency_version(&self, manifest_path: &Path, dep_name: &str, new_version: &str) -> ReleaseResult<bool> {
    self.repin_dependency(manifest_path, dep_name, new_version, true)
  }

  fn would_rewrite_dependency(&self, manifest_path: &Path, dep_name: &str, new_version: &str) -> ReleaseResult<bool> {
    self.repin_dependency(manifest_path, dep_name, new_version, false)
  }
}
