//! Cargo workspace adapter
//!
//! Reads `[workspace] members` / `exclude`, resolves `version.workspace = true`
//! against `[workspace.package]`, and rewrites manifests with `toml_edit` so
//! comments and formatting survive.

use super::{
  Ecosystem, Package, PackageMetadata, RawPackage, Workspace, discover_or_warn, expand_members, is_excluded,
  missing_version, repin, write_if_changed,
};
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult, ResultExt};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, Value};

const DEPENDENCY_TABLES: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

pub struct CargoWorkspace {
  root: PathBuf,
}

impl CargoWorkspace {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
    }
  }

  /// Root Cargo.toml declares a `[workspace]`
  pub fn can_handle(root: &Path) -> bool {
    fs::read_to_string(root.join("Cargo.toml"))
      .ok()
      .and_then(|content| content.parse::<DocumentMut>().ok())
      .is_some_and(|doc| doc.contains_key("workspace"))
  }

  fn root_manifest(&self) -> PathBuf {
    self.root.join("Cargo.toml")
  }

  fn load(&self, exclude: &[String]) -> ReleaseResult<Vec<RawPackage>> {
    let root_doc = read_doc(&self.root_manifest())?;
    let workspace = root_doc
      .get("workspace")
      .and_then(Item::as_table_like)
      .ok_or_else(|| {
        ReleaseError::coded(
          ErrorCode::WorkspaceParse,
          format!("{} has no [workspace] table", self.root_manifest().display()),
        )
      })?;

    let members = string_array(workspace.get("members"));
    let mut excluded = string_array(workspace.get("exclude"));
    excluded.extend(exclude.iter().cloned());

    let mut dirs = expand_members(&self.root, &members, "Cargo.toml")?;
    if root_doc.contains_key("package") && !dirs.contains(&self.root) {
      dirs.insert(0, self.root.clone());
    }

    let inherited = workspace.get("package").and_then(Item::as_table_like);
    let mut packages = Vec::new();
    for dir in dirs {
      if dir != self.root && is_excluded(&self.root, &dir, &excluded) {
        tracing::debug!("excluding {}", dir.display());
        continue;
      }
      let manifest_path = dir.join("Cargo.toml");
      let doc = if dir == self.root {
        root_doc.clone()
      } else {
        match read_doc(&manifest_path) {
          Ok(doc) => doc,
          Err(err) => {
            tracing::warn!("skipping {}: {}", manifest_path.display(), err);
            continue;
          }
        }
      };
      match parse_member(&doc, &dir, &manifest_path, inherited) {
        Ok(pkg) => packages.push(pkg),
        Err(err) => tracing::warn!("skipping {}: {}", manifest_path.display(), err),
      }
    }
    Ok(packages)
  }

  /// Rewrite `[workspace.package] version` in the root manifest
  fn rewrite_inherited_version(&self, new_version: &str) -> ReleaseResult<String> {
    let path = self.root_manifest();
    let before = fs::read_to_string(&path)?;
    let mut doc: DocumentMut = before.parse()?;
    let item = doc
      .get_mut("workspace")
      .and_then(|w| w.get_mut("package"))
      .and_then(|p| p.get_mut("version"))
      .ok_or_else(|| missing_version(&path))?;
    let old = set_string(item, new_version).ok_or_else(|| missing_version(&path))?;
    write_if_changed(&path, &before, &doc.to_string())?;
    Ok(old)
  }

  /// Re-pin `dep_name` in `[workspace.dependencies]` of the root manifest
  fn rewrite_workspace_dependency(&self, dep_name: &str, new_version: &str, write: bool) -> ReleaseResult<bool> {
    let path = self.root_manifest();
    let before = fs::read_to_string(&path)?;
    let mut doc: DocumentMut = before.parse()?;
    let changed = doc
      .get_mut("workspace")
      .and_then(|w| w.get_mut("dependencies"))
      .and_then(|d| d.get_mut(dep_name))
      .is_some_and(|entry| repin_entry(entry, new_version) == Repinned::Changed);
    if write {
      write_if_changed(&path, &before, &doc.to_string())?;
    }
    Ok(changed)
  }

  /// Re-pin `dep_name`; with `write == false` only reports whether it would change
  fn repin_dependency(&self, manifest_path: &Path, dep_name: &str, new_version: &str, write: bool) -> ReleaseResult<bool> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let mut doc: DocumentMut = before.parse()?;

    let mut changed = false;
    let mut via_workspace = false;
    for table in DEPENDENCY_TABLES {
      let Some(entry) = doc.get_mut(table).and_then(|t| t.get_mut(dep_name)) else {
        continue;
      };
      match repin_entry(entry, new_version) {
        Repinned::Changed => changed = true,
        Repinned::Inherited => via_workspace = true,
        Repinned::Unchanged => {}
      }
    }
    if write {
      write_if_changed(manifest_path, &before, &doc.to_string())?;
    }

    if via_workspace && manifest_path != self.root_manifest() {
      changed |= self.rewrite_workspace_dependency(dep_name, new_version, write)?;
    }
    Ok(changed)
  }
}

impl Workspace for CargoWorkspace {
  fn ecosystem(&self) -> Ecosystem {
    Ecosystem::Cargo
  }

  fn root(&self) -> &Path {
    &self.root
  }

  fn discover(&self, exclude: &[String]) -> Vec<Package> {
    discover_or_warn(Ecosystem::Cargo, &self.root, || self.load(exclude))
  }

  fn rewrite_version(&self, manifest_path: &Path, new_version: &str) -> ReleaseResult<String> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let mut doc: DocumentMut = before.parse()?;
    let item = doc
      .get_mut("package")
      .and_then(|p| p.get_mut("version"))
      .ok_or_else(|| missing_version(manifest_path))?;

    if inherits_workspace(item) {
      return self.rewrite_inherited_version(new_version);
    }

    let old = set_string(item, new_version).ok_or_else(|| missing_version(manifest_path))?;
    write_if_changed(manifest_path, &before, &doc.to_string())?;
    Ok(old)
  }

  fn rewrite_dependency_version(&self, manifest_path: &Path, dep_name: &str, new_version: &str) -> ReleaseResult<bool> {
    self.repin_dependency(manifest_path, dep_name, new_version, true)
  }

  fn would_rewrite_dependency(&self, manifest_path: &Path, dep_name: &str, new_version: &str) -> ReleaseResult<bool> {
    self.repin_dependency(manifest_path, dep_name, new_version, false)
  }
}

fn read_doc(path: &Path) -> ReleaseResult<DocumentMut> {
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
  content
    .parse::<DocumentMut>()
    .map_err(ReleaseError::from)
    .with_context(|| format!("Failed to parse {}", path.display()))
}

fn string_array(item: Option<&Item>) -> Vec<String> {
  item
    .and_then(Item::as_array)
    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
    .unwrap_or_default()
}

/// `{ workspace = true }` or `version.workspace = true`
fn inherits_workspace(item: &Item) -> bool {
  item
    .as_table_like()
    .and_then(|t| t.get("workspace"))
    .and_then(Item::as_bool)
    .unwrap_or(false)
}

/// Read a string field, following workspace inheritance
fn field(
  package: &dyn toml_edit::TableLike,
  key: &str,
  inherited: Option<&dyn toml_edit::TableLike>,
) -> Option<String> {
  let item = package.get(key)?;
  if inherits_workspace(item) {
    return inherited?.get(key)?.as_str().map(str::to_string);
  }
  item.as_str().map(str::to_string)
}

fn parse_member(
  doc: &DocumentMut,
  dir: &Path,
  manifest_path: &Path,
  inherited: Option<&dyn toml_edit::TableLike>,
) -> ReleaseResult<RawPackage> {
  let package = doc
    .get("package")
    .and_then(Item::as_table_like)
    .ok_or_else(|| ReleaseError::coded(ErrorCode::WorkspaceParse, "no [package] table"))?;

  let name = package
    .get("name")
    .and_then(Item::as_str)
    .ok_or_else(|| ReleaseError::coded(ErrorCode::WorkspaceParse, "no package name"))?
    .to_string();
  let version = field(package, "version", inherited).ok_or_else(|| missing_version(manifest_path))?;

  // `publish = false` and `publish = []` both disable publishing
  let is_publishable = match package.get("publish") {
    Some(item) => item.as_bool().unwrap_or(true) && item.as_array().is_none_or(|a| !a.is_empty()),
    None => true,
  };

  let mut deps = BTreeSet::new();
  for table in DEPENDENCY_TABLES {
    let Some(entries) = doc.get(table).and_then(Item::as_table_like) else {
      continue;
    };
    for (key, entry) in entries.iter() {
      // `foo = { package = "real-name" }` renames
      let real = entry
        .as_table_like()
        .and_then(|t| t.get("package"))
        .and_then(Item::as_str)
        .unwrap_or(key);
      deps.insert(real.to_string());
    }
  }

  Ok(RawPackage {
    name,
    version,
    path: dir.to_path_buf(),
    manifest_path: manifest_path.to_path_buf(),
    deps,
    is_publishable,
    metadata: PackageMetadata {
      description: field(package, "description", inherited),
      license: field(package, "license", inherited),
      repository: field(package, "repository", inherited),
      homepage: field(package, "homepage", inherited),
    },
  })
}

/// Replace a string value keeping its surrounding whitespace/comments.
/// Returns the previous value, or `None` if `item` is not a string.
fn set_string(item: &mut Item, new_value: &str) -> Option<String> {
  let value = item.as_value_mut()?;
  let old = value.as_str()?.to_string();
  if old != new_value {
    let decor = value.decor().clone();
    let mut replacement = Value::from(new_value);
    *replacement.decor_mut() = decor;
    *value = replacement;
  }
  Some(old)
}

#[derive(Debug, PartialEq, Eq)]
enum Repinned {
  Changed,
  Unchanged,
  /// Entry is `{ workspace = true }`; the pin lives in the root manifest
  Inherited,
}

/// Re-pin a dependency entry: `"1.0"` or `{ version = "1.0", path = ".." }`
fn repin_entry(entry: &mut Item, new_version: &str) -> Repinned {
  if inherits_workspace(entry) {
    return Repinned::Inherited;
  }
  let target = if entry.as_str().is_some() {
    Some(entry)
  } else {
    entry.as_table_like_mut().and_then(|t| t.get_mut("version"))
  };
  let Some(target) = target else {
    return Repinned::Unchanged;
  };
  let Some(requirement) = target.as_str().map(str::to_string) else {
    return Repinned::Unchanged;
  };
  match repin(&requirement, new_version) {
    Some(updated) if updated != requirement => {
      set_string(target, &updated);
      Repinned::Changed
    }
    _ => Repinned::Unchanged,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
      &root.join("Cargo.toml"),
      r#"[workspace]
members = ["crates/*"]
exclude = ["crates/scratch"]

[workspace.package]
version = "0.3.0"
license = "MIT"

[workspace.dependencies]
core = { version = "0.3.0", path = "crates/core" }
"#,
    );
    write(
      &root.join("crates/core/Cargo.toml"),
      r#"[package]
name = "core"
version.workspace = true
license.workspace = true
description = "Core"

[dependencies]
serde = "1"
"#,
    );
    write(
      &root.join("crates/cli/Cargo.toml"),
      r#"[package]
name = "cli"
version = "1.2.0" # pinned
publish = false

[dependencies]
core = { workspace = true }

[dev-dependencies]
helper = { package = "test-helper", version = "0.1" }
"#,
    );
    write(
      &root.join("crates/scratch/Cargo.toml"),
      "[package]\nname = \"scratch\"\nversion = \"0.0.0\"\n",
    );
    dir
  }

  #[test]
  fn test_discover_members() {
    let dir = fixture();
    let ws = CargoWorkspace::new(dir.path());
    let packages = ws.discover(&[]);

    let names: Vec<_> = packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["cli", "core"]);

    let core = &packages[1];
    assert_eq!(core.version, "0.3.0");
    assert_eq!(core.metadata.license.as_deref(), Some("MIT"));
    assert!(core.is_publishable);
    assert!(core.external_deps.contains("serde"));

    let cli = &packages[0];
    assert!(!cli.is_publishable);
    assert!(cli.internal_deps.contains("core"));
    assert!(cli.external_deps.contains("test-helper"));
  }

  #[test]
  fn test_discover_with_exclude_glob() {
    let dir = fixture();
    let packages = CargoWorkspace::new(dir.path()).discover(&["crates/cli".to_string()]);
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].name, "core");
  }

  #[test]
  fn test_discover_broken_root_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("Cargo.toml"), "[workspace\nmembers = ");
    assert!(CargoWorkspace::new(dir.path()).discover(&[]).is_empty());
  }

  #[test]
  fn test_discover_skips_broken_member() {
    let dir = fixture();
    write(&dir.path().join("crates/broken/Cargo.toml"), "[package\nname = ");
    let packages = CargoWorkspace::new(dir.path()).discover(&[]);
    let names: Vec<_> = packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["cli", "core"]);
  }

  #[test]
  fn test_rewrite_version_preserves_comment() {
    let dir = fixture();
    let ws = CargoWorkspace::new(dir.path());
    let manifest = dir.path().join("crates/cli/Cargo.toml");

    assert_eq!(ws.rewrite_version(&manifest, "1.3.0").unwrap(), "1.2.0");
    let content = fs::read_to_string(&manifest).unwrap();
    assert!(content.contains("version = \"1.3.0\" # pinned"));
    assert!(content.contains("publish = false"));

    assert_eq!(ws.rewrite_version(&manifest, "1.3.0").unwrap(), "1.3.0");
    assert_eq!(fs::read_to_string(&manifest).unwrap(), content);
  }

  #[test]
  fn test_rewrite_inherited_version_updates_root() {
    let dir = fixture();
    let ws = CargoWorkspace::new(dir.path());
    let old = ws
      .rewrite_version(&dir.path().join("crates/core/Cargo.toml"), "0.4.0")
      .unwrap();
    assert_eq!(old, "0.3.0");
    let root = fs::read_to_string(dir.path().join("Cargo.toml")).unwrap();
    assert!(root.contains("version = \"0.4.0\"\nlicense = \"MIT\""));
  }

  #[test]
  fn test_rewrite_dependency_through_workspace_table() {
    let dir = fixture();
    let ws = CargoWorkspace::new(dir.path());
    let changed = ws
      .rewrite_dependency_version(&dir.path().join("crates/cli/Cargo.toml"), "core", "0.4.0")
      .unwrap();
    assert!(changed);
    let root = fs::read_to_string(dir.path().join("Cargo.toml")).unwrap();
    assert!(root.contains("core = { version = \"0.4.0\", path = \"crates/core\" }"));
  }

  #[test]
  fn test_rewrite_missing_dependency_is_noop() {
    let dir = fixture();
    let ws = CargoWorkspace::new(dir.path());
    let manifest = dir.path().join("crates/core/Cargo.toml");
    let before = fs::read_to_string(&manifest).unwrap();
    assert!(!ws.rewrite_dependency_version(&manifest, "cli", "9.9.9").unwrap());
    assert_eq!(fs::read_to_string(&manifest).unwrap(), before);
  }
}
