//! Python (uv workspace) adapter
//!
//! Members come from `[tool.uv.workspace] members` in the root
//! `pyproject.toml`. Package names are PEP 503-normalized so `My_Pkg` and
//! `my-pkg` refer to the same package. Versions must be static.

use super::{
  Ecosystem, Package, PackageMetadata, RawPackage, Workspace, discover_or_warn, expand_members, is_excluded,
  missing_version, write_if_changed,
};
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult, ResultExt};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use toml_edit::{DocumentMut, Item, Value};

/// Leading distribution name of a PEP 508 requirement
static REQUIREMENT_NAME: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\s*([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)").expect("valid regex"));

/// First pinning clause (`==`, `>=`, `~=`) of a requirement
static PIN_CLAUSE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(==|>=|~=)\s*([0-9][A-Za-z0-9.+!-]*)").expect("valid regex"));

/// Normalize a distribution name (PEP 503)
pub fn normalize_name(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  let mut last_dash = false;
  for c in name.trim().chars() {
    if matches!(c, '-' | '_' | '.') {
      if !last_dash {
        out.push('-');
      }
      last_dash = true;
    } else {
      out.push(c.to_ascii_lowercase());
      last_dash = false;
    }
  }
  out
}

/// Normalized distribution name of a requirement string
pub fn requirement_name(requirement: &str) -> Option<String> {
  REQUIREMENT_NAME
    .captures(requirement)
    .map(|caps| normalize_name(&caps[1]))
}

pub struct PythonWorkspace {
  root: PathBuf,
}

impl PythonWorkspace {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
    }
  }

  /// Root pyproject.toml declares `[tool.uv.workspace]`
  pub fn can_handle(root: &Path) -> bool {
    fs::read_to_string(root.join("pyproject.toml"))
      .ok()
      .and_then(|content| content.parse::<DocumentMut>().ok())
      .is_some_and(|doc| uv_workspace(&doc).is_some())
  }

  fn load(&self, exclude: &[String]) -> ReleaseResult<Vec<RawPackage>> {
    let root_manifest = self.root.join("pyproject.toml");
    let content = fs::read_to_string(&root_manifest)
      .with_context(|| format!("Failed to read {}", root_manifest.display()))?;
    let doc: DocumentMut = content.parse()?;
    let workspace = uv_workspace(&doc).ok_or_else(|| {
      ReleaseError::coded(
        ErrorCode::WorkspaceParse,
        format!("{} has no [tool.uv.workspace] table", root_manifest.display()),
      )
    })?;

    let members = string_array(workspace.get("members"));
    let mut excluded = string_array(workspace.get("exclude"));
    excluded.extend(exclude.iter().cloned());

    let mut packages = Vec::new();
    for dir in expand_members(&self.root, &members, "pyproject.toml")? {
      if is_excluded(&self.root, &dir, &excluded) {
        tracing::debug!("excluding {}", dir.display());
        continue;
      }
      let manifest_path = dir.join("pyproject.toml");
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
    let mut doc: DocumentMut = before.parse()?;
    let target = normalize_name(dep_name);

    let mut changed = false;
    let mut arrays: Vec<&mut toml_edit::Array> = Vec::new();
    if let Some(project) = doc.get_mut("project").and_then(Item::as_table_like_mut) {
      for (key, item) in project.iter_mut() {
        match key.get() {
          "dependencies" => arrays.extend(item.as_array_mut()),
          "optional-dependencies" => {
            if let Some(groups) = item.as_table_like_mut() {
              arrays.extend(groups.iter_mut().filter_map(|(_, g)| g.as_array_mut()));
            }
          }
          _ => {}
        }
      }
    }

    for array in arrays {
      for value in array.iter_mut() {
        let Some(requirement) = value.as_str() else {
          continue;
        };
        if requirement_name(requirement).as_deref() != Some(target.as_str()) {
          continue;
        }
        let updated = PIN_CLAUSE
          .replacen(requirement, 1, |caps: &regex::Captures| format!("{}{}", &caps[1], new_version))
          .into_owned();
        if updated != requirement {
          replace_keep_decor(value, &updated);
          changed = true;
        }
      }
    }

    if write {
      write_if_changed(manifest_path, &before, &doc.to_string())?;
    }
    Ok(changed)
  }
}

impl Workspace for PythonWorkspace {
  fn ecosystem(&self) -> Ecosystem {
    Ecosystem::Python
  }

  fn root(&self) -> &Path {
    &self.root
  }

  fn discover(&self, exclude: &[String]) -> Vec<Package> {
    discover_or_warn(Ecosystem::Python, &self.root, || self.load(exclude))
  }

  fn rewrite_version(&self, manifest_path: &Path, new_version: &str) -> ReleaseResult<String> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let mut doc: DocumentMut = before.parse()?;
    let value = doc
      .get_mut("project")
      .and_then(|p| p.get_mut("version"))
      .and_then(Item::as_value_mut)
      .ok_or_else(|| missing_version(manifest_path))?;
    let old = value
      .as_str()
      .map(str::to_string)
      .ok_or_else(|| missing_version(manifest_path))?;
    if old != new_version {
      replace_keep_decor(value, new_version);
    }
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

fn uv_workspace(doc: &DocumentMut) -> Option<&dyn toml_edit::TableLike> {
  doc
    .get("tool")?
    .get("uv")?
    .get("workspace")?
    .as_table_like()
}

fn string_array(item: Option<&Item>) -> Vec<String> {
  item
    .and_then(Item::as_array)
    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
    .unwrap_or_default()
}

fn replace_keep_decor(value: &mut Value, new_value: &str) {
  let decor = value.decor().clone();
  let mut replacement = Value::from(new_value);
  *replacement.decor_mut() = decor;
  *value = replacement;
}

fn parse_member(dir: &Path, manifest_path: &Path) -> ReleaseResult<RawPackage> {
  let content = fs::read_to_string(manifest_path)?;
  let doc: DocumentMut = content.parse()?;
  let project = doc
    .get("project")
    .and_then(Item::as_table_like)
    .ok_or_else(|| ReleaseError::coded(ErrorCode::WorkspaceParse, "no [project] table"))?;

  let name = project
    .get("name")
    .and_then(Item::as_str)
    .map(normalize_name)
    .ok_or_else(|| ReleaseError::coded(ErrorCode::WorkspaceParse, "no project name"))?;

  let version = project
    .get("version")
    .and_then(Item::as_str)
    .map(str::to_string)
    .ok_or_else(|| {
      let dynamic = string_array(project.get("dynamic"));
      if dynamic.iter().any(|d| d == "version") {
        ReleaseError::coded(
          ErrorCode::WorkspaceVersionMissing,
          format!("{} uses a dynamic version; declare it statically", manifest_path.display()),
        )
      } else {
        missing_version(manifest_path)
      }
    })?;

  let mut deps: BTreeSet<String> = string_array(project.get("dependencies"))
    .iter()
    .filter_map(|r| requirement_name(r))
    .collect();
  if let Some(groups) = project.get("optional-dependencies").and_then(Item::as_table_like) {
    for (_, group) in groups.iter() {
      deps.extend(string_array(Some(group)).iter().filter_map(|r| requirement_name(r)));
    }
  }

  let classifiers = string_array(project.get("classifiers"));
  let is_publishable = !classifiers.iter().any(|c| c.starts_with("Private ::"));

  let license = project.get("license").and_then(|item| {
    item
      .as_str()
      .or_else(|| item.as_table_like()?.get("text")?.as_str())
      .map(str::to_string)
  });
  let url = |keys: &[&str]| {
    let urls = project.get("urls")?.as_table_like()?;
    keys
      .iter()
      .find_map(|k| urls.iter().find(|(key, _)| key.eq_ignore_ascii_case(k)))
      .and_then(|(_, v)| v.as_str())
      .map(str::to_string)
  };

  Ok(RawPackage {
    name,
    version,
    path: dir.to_path_buf(),
    manifest_path: manifest_path.to_path_buf(),
    deps,
    is_publishable,
    metadata: PackageMetadata {
      description: project.get("description").and_then(Item::as_str).map(str::to_string),
      license,
      repository: url(&["Repository", "Source", "Source Code"]),
      homepage: url(&["Homepage", "Documentation"]),
    },
  })
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
      &root.join("pyproject.toml"),
      "[project]\nname = \"workspace\"\nversion = \"0.0.0\"\n\n[tool.uv.workspace]\nmembers = [\"packages/*\", \"plugins/*\"]\nexclude = [\"plugins/broken\"]\n",
    );
    write(
      &root.join("packages/genkit/pyproject.toml"),
      r#"[project]
name = "genkit"
version = "0.5.0"
description = "Core"
license = { text = "Apache-2.0" }
dependencies = ["pydantic>=2.0"]

[project.urls]
Repository = "https://example.com/genkit"
"#,
    );
    write(
      &root.join("plugins/genkit_plugin_foo/pyproject.toml"),
      r#"[project]
name = "Genkit_Plugin.Foo"
version = "0.5.0"
dependencies = [
  "genkit>=0.5.0",  # core
  "httpx",
]
"#,
    );
    write(
      &root.join("plugins/private/pyproject.toml"),
      "[project]\nname = \"internal\"\nversion = \"0.1.0\"\nclassifiers = [\"Private :: Do Not Upload\"]\n",
    );
    write(
      &root.join("plugins/broken/pyproject.toml"),
      "[project]\nname = \"broken\"\ndynamic = [\"version\"]\n",
    );
    dir
  }

  #[test]
  fn test_normalize_name() {
    assert_eq!(normalize_name("Genkit_Plugin.Foo"), "genkit-plugin-foo");
    assert_eq!(normalize_name("a__b"), "a-b");
    assert_eq!(requirement_name("pydantic[email]>=2.0; python_version>'3.9'").as_deref(), Some("pydantic"));
  }

  #[test]
  fn test_discover_uv_workspace() {
    let dir = fixture();
    let packages = PythonWorkspace::new(dir.path()).discover(&[]);
    let names: Vec<_> = packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["genkit", "genkit-plugin-foo", "internal"]);

    let genkit = &packages[0];
    assert_eq!(genkit.metadata.license.as_deref(), Some("Apache-2.0"));
    assert_eq!(genkit.metadata.repository.as_deref(), Some("https://example.com/genkit"));
    assert!(genkit.external_deps.contains("pydantic"));

    let plugin = &packages[1];
    assert!(plugin.internal_deps.contains("genkit"));
    assert!(plugin.external_deps.contains("httpx"));

    assert!(!packages[2].is_publishable);
  }

  #[test]
  fn test_dynamic_version_is_skipped_with_warning() {
    let dir = fixture();
    fs::remove_dir_all(dir.path().join("plugins/private")).unwrap();
    let root = dir.path().join("pyproject.toml");
    let content = fs::read_to_string(&root).unwrap().replace("exclude = [\"plugins/broken\"]\n", "");
    fs::write(&root, content).unwrap();

    let packages = PythonWorkspace::new(dir.path()).discover(&[]);
    assert!(packages.iter().all(|p| p.name != "broken"));
  }

  #[test]
  fn test_rewrite_version_idempotent() {
    let dir = fixture();
    let ws = PythonWorkspace::new(dir.path());
    let manifest = dir.path().join("packages/genkit/pyproject.toml");

    assert_eq!(ws.rewrite_version(&manifest, "0.6.0").unwrap(), "0.5.0");
    let first = fs::read_to_string(&manifest).unwrap();
    assert!(first.contains("version = \"0.6.0\"\ndescription = \"Core\""));

    assert_eq!(ws.rewrite_version(&manifest, "0.6.0").unwrap(), "0.6.0");
    assert_eq!(fs::read_to_string(&manifest).unwrap(), first);
  }

  #[test]
  fn test_rewrite_dependency_keeps_comment() {
    let dir = fixture();
    let ws = PythonWorkspace::new(dir.path());
    let manifest = dir.path().join("plugins/genkit_plugin_foo/pyproject.toml");

    assert!(ws.rewrite_dependency_version(&manifest, "genkit", "0.6.0").unwrap());
    let content = fs::read_to_string(&manifest).unwrap();
    assert!(content.contains("\"genkit>=0.6.0\",  # core"));
    assert!(content.contains("\"httpx\""));

    assert!(!ws.rewrite_dependency_version(&manifest, "genkit", "0.6.0").unwrap());
  }

  #[test]
  fn test_rewrite_version_missing() {
    let dir = fixture();
    let ws = PythonWorkspace::new(dir.path());
    let err = ws
      .rewrite_version(&dir.path().join("plugins/broken/pyproject.toml"), "1.0.0")
      .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::WorkspaceVersionMissing));
  }
}
