//! Gradle multi-project adapter
//!
//! Projects come from `include(...)` in `settings.gradle(.kts)`; `:a:b` maps
//! to directory `a/b`. A project's version is its build script's
//! `version = "..."`, falling back to the root `gradle.properties`.
//! Projects applying `maven-publish` are publishable.

use super::{
  Ecosystem, Package, PackageMetadata, RawPackage, Workspace, discover_or_warn, is_excluded, missing_version,
  repin, write_if_changed,
};
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult, ResultExt};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*include\b(.*)$").expect("valid regex"));

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("valid regex"));

static VERSION_LINE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"(?m)^(\s*version\s*=\s*["'])([^"']+)(["'])"#).expect("valid regex"));

static PROPERTIES_VERSION: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^(\s*version\s*[=:]\s*)(\S+)(\s*)$").expect("valid regex"));

static PROJECT_DEP: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"project\(\s*(?:path\s*[:=]\s*)?["']:?([^"']+)["']"#).expect("valid regex")
});

/// `"group:artifact:version"` coordinates
static COORDINATE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"["']([\w.\-]+):([\w.\-]+):([^"'@]+)["']"#).expect("valid regex"));

static DESCRIPTION: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"(?m)^\s*description\s*=\s*["']([^"']+)["']"#).expect("valid regex"));

const BUILD_SCRIPTS: [&str; 2] = ["build.gradle.kts", "build.gradle"];
const SETTINGS_SCRIPTS: [&str; 2] = ["settings.gradle.kts", "settings.gradle"];

pub struct GradleWorkspace {
  root: PathBuf,
}

impl GradleWorkspace {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
    }
  }

  /// A settings script exists at the root
  pub fn can_handle(root: &Path) -> bool {
    SETTINGS_SCRIPTS.iter().any(|s| root.join(s).is_file())
  }

  fn properties_path(&self) -> PathBuf {
    self.root.join("gradle.properties")
  }

  fn root_version(&self) -> Option<String> {
    let content = fs::read_to_string(self.properties_path()).ok()?;
    PROPERTIES_VERSION.captures(&content).map(|c| c[2].to_string())
  }

  fn load(&self, exclude: &[String]) -> ReleaseResult<Vec<RawPackage>> {
    let settings = SETTINGS_SCRIPTS
      .iter()
      .map(|s| self.root.join(s))
      .find(|p| p.is_file())
      .ok_or_else(|| ReleaseError::coded(ErrorCode::WorkspaceNotFound, "no settings.gradle(.kts)"))?;
    let content = fs::read_to_string(&settings).with_context(|| format!("Failed to read {}", settings.display()))?;

    let fallback = self.root_version();
    let mut packages = Vec::new();
    for project in included_projects(&content) {
      let dir = self.root.join(project.trim_start_matches(':').replace(':', "/"));
      if is_excluded(&self.root, &dir, exclude) {
        continue;
      }
      let Some(script) = BUILD_SCRIPTS.iter().map(|s| dir.join(s)).find(|p| p.is_file()) else {
        tracing::warn!("project {} has no build script", project);
        continue;
      };
      match parse_project(&project, &dir, &script, fallback.as_deref()) {
        Ok(pkg) => packages.push(pkg),
        Err(err) => tracing::warn!("skipping {}: {}", script.display(), err),
      }
    }
    Ok(packages)
  }

  /// Re-pin `dep_name`; with `write == false` only reports whether it would change
  fn repin_dependency(&self, manifest_path: &Path, dep_name: &str, new_version: &str, write: bool) -> ReleaseResult<bool> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let after = COORDINATE
      .replace_all(&before, |c: &regex::Captures| {
        if &c[2] != dep_name {
          return c[0].to_string();
        }
        let quote = &c[0][..1];
        match repin(&c[3], new_version) {
          Some(version) => format!("{q}{}:{}:{}{q}", &c[1], &c[2], version, q = quote),
          None => c[0].to_string(),
        }
      })
      .into_owned();
    if write {
      write_if_changed(manifest_path, &before, &after)?;
    }
    Ok(before != after)
  }
}

/// Project paths named by `include` statements
fn included_projects(settings: &str) -> Vec<String> {
  INCLUDE
    .captures_iter(settings)
    .flat_map(|caps| {
      QUOTED
        .captures_iter(caps.get(1).map_or("", |m| m.as_str()))
        .map(|q| q[1].to_string())
        .collect::<Vec<_>>()
    })
    .collect()
}

fn last_segment(project_path: &str) -> &str {
  project_path.rsplit(':').next().unwrap_or(project_path)
}

fn parse_project(project: &str, dir: &Path, script: &Path, fallback: Option<&str>) -> ReleaseResult<RawPackage> {
  let content = fs::read_to_string(script)?;
  let version = VERSION_LINE
    .captures(&content)
    .map(|c| c[2].to_string())
    .or_else(|| fallback.map(str::to_string))
    .ok_or_else(|| missing_version(script))?;

  let mut deps: BTreeSet<String> = PROJECT_DEP
    .captures_iter(&content)
    .map(|c| last_segment(&c[1]).to_string())
    .collect();
  deps.extend(COORDINATE.captures_iter(&content).map(|c| c[2].to_string()));

  let is_publishable = content.contains("maven-publish") || content.contains("publishing {");

  Ok(RawPackage {
    name: last_segment(project).to_string(),
    version,
    path: dir.to_path_buf(),
    manifest_path: script.to_path_buf(),
    deps,
    is_publishable,
    metadata: PackageMetadata {
      description: DESCRIPTION.captures(&content).map(|c| c[1].to_string()),
      ..PackageMetadata::default()
    },
  })
}

impl Workspace for GradleWorkspace {
  fn ecosystem(&self) -> Ecosystem {
    Ecosystem::Gradle
  }

  fn root(&self) -> &Path {
    &self.root
  }

  fn discover(&self, exclude: &[String]) -> Vec<Package> {
    discover_or_warn(Ecosystem::Gradle, &self.root, || self.load(exclude))
  }

  fn rewrite_version(&self, manifest_path: &Path, new_version: &str) -> ReleaseResult<String> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;

    if let Some(caps) = VERSION_LINE.captures(&before) {
      let old = caps[2].to_string();
      let after = VERSION_LINE
        .replacen(&before, 1, |c: &regex::Captures| format!("{}{}{}", &c[1], new_version, &c[3]))
        .into_owned();
      write_if_changed(manifest_path, &before, &after)?;
      return Ok(old);
    }

    // Inherited from gradle.properties
    let properties = self.properties_path();
    let before = fs::read_to_string(&properties).map_err(|_| missing_version(manifest_path))?;
    let caps = PROPERTIES_VERSION
      .captures(&before)
      .ok_or_else(|| missing_version(manifest_path))?;
    let old = caps[2].to_string();
    let after = PROPERTIES_VERSION
      .replacen(&before, 1, |c: &regex::Captures| format!("{}{}{}", &c[1], new_version, &c[3]))
      .into_owned();
    write_if_changed(&properties, &before, &after)?;
    Ok(old)
  }

  fn rewrite_dependency_version(&self, manifest_path: &Path, dep_name: &str, new_version: &str) -> ReleaseResult<bool> {
    self.repin_dependency(manifest_path, dep_name, new_version, true)
  }

  fn would_rewrite_dependency(&self, manifest_path: &Path, dep_name: &str, new_version: &str) -> ReleaseResult<bool> {
    self.repin_dependency(manifest_path, dep_name, new_version, false)
  }
}
