//! Maven multi-module adapter
//!
//! Modules come from `<modules>` in the root `pom.xml`. POMs are read with
//! targeted scans instead of a full XML parser: the project's own coordinates
//! are the elements that sit outside `<parent>`, `<dependencies>`, `<build>`
//! and the other nested sections.

use super::{
  Ecosystem, Package, PackageMetadata, RawPackage, Workspace, discover_or_warn, is_excluded, missing_version,
  write_if_changed,
};
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult, ResultExt};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static MODULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<module>\s*([^<]+?)\s*</module>").expect("valid regex"));

static DEPENDENCY: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?s)<dependency>.*?</dependency>").expect("valid regex"));

/// Sections whose children are not the project's own coordinates
const NESTED_SECTIONS: [&str; 13] = [
  "parent",
  "dependencies",
  "dependencyManagement",
  "build",
  "profiles",
  "reporting",
  "distributionManagement",
  "licenses",
  "scm",
  "developers",
  "organization",
  "issueManagement",
  "ciManagement",
];

/// Byte ranges of every `<tag>...</tag>` block
fn block_ranges(xml: &str, tag: &str) -> Vec<Range<usize>> {
  let open = format!("<{}>", tag);
  let close = format!("</{}>", tag);
  let mut ranges = Vec::new();
  let mut cursor = 0;
  while let Some(start) = xml[cursor..].find(&open).map(|i| cursor + i) {
    let Some(end) = xml[start..].find(&close).map(|i| start + i + close.len()) else {
      break;
    };
    ranges.push(start..end);
    cursor = end;
  }
  ranges
}

/// Range of the text content of the first top-level `<tag>`
fn top_level_element(xml: &str, tag: &str) -> Option<Range<usize>> {
  let nested: Vec<Range<usize>> = NESTED_SECTIONS.iter().flat_map(|s| block_ranges(xml, s)).collect();
  element_outside(xml, tag, &nested)
}

fn element_outside(xml: &str, tag: &str, nested: &[Range<usize>]) -> Option<Range<usize>> {
  let open = format!("<{}>", tag);
  let close = format!("</{}>", tag);
  let mut cursor = 0;
  while let Some(start) = xml[cursor..].find(&open).map(|i| cursor + i) {
    let content_start = start + open.len();
    let content_end = content_start + xml[content_start..].find(&close)?;
    if !nested.iter().any(|r| r.contains(&start)) {
      return Some(content_start..content_end);
    }
    cursor = content_end;
  }
  None
}

/// Text of the first `<tag>` inside `block`
fn child_text<'a>(block: &'a str, tag: &str) -> Option<&'a str> {
  let open = format!("<{}>", tag);
  let close = format!("</{}>", tag);
  let start = block.find(&open)? + open.len();
  let end = start + block[start..].find(&close)?;
  Some(block[start..end].trim())
}

fn text<'a>(xml: &'a str, range: Option<Range<usize>>) -> Option<&'a str> {
  range.map(|r| xml[r].trim()).filter(|s| !s.is_empty())
}

fn parent_version(xml: &str) -> Option<&str> {
  let parent = block_ranges(xml, "parent").into_iter().next()?;
  child_text(&xml[parent], "version")
}

pub struct MavenWorkspace {
  root: PathBuf,
}

impl MavenWorkspace {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
    }
  }

  /// Root pom.xml declares `<modules>`
  pub fn can_handle(root: &Path) -> bool {
    fs::read_to_string(root.join("pom.xml")).is_ok_and(|xml| xml.contains("<modules>"))
  }

  fn root_pom(&self) -> PathBuf {
    self.root.join("pom.xml")
  }

  fn load(&self, exclude: &[String]) -> ReleaseResult<Vec<RawPackage>> {
    let root_pom = self.root_pom();
    let xml = fs::read_to_string(&root_pom).with_context(|| format!("Failed to read {}", root_pom.display()))?;
    if !xml.contains("<project") {
      return Err(ReleaseError::coded(
        ErrorCode::WorkspaceParse,
        format!("{} has no <project> element", root_pom.display()),
      ));
    }

    let mut packages = Vec::new();
    for module in self.module_dirs(&self.root, &xml) {
      if is_excluded(&self.root, &module, exclude) {
        continue;
      }
      let pom = module.join("pom.xml");
      match parse_module(&module, &pom) {
        Ok(pkg) => packages.push(pkg),
        Err(err) => tracing::warn!("skipping {}: {}", pom.display(), err),
      }
    }
    Ok(packages)
  }

  /// Module directories, recursing into aggregator modules
  fn module_dirs(&self, dir: &Path, xml: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for caps in MODULE.captures_iter(xml) {
      let module = dir.join(&caps[1]);
      let pom = module.join("pom.xml");
      let Ok(child) = fs::read_to_string(&pom) else {
        tracing::warn!("module {} has no readable pom.xml", module.display());
        continue;
      };
      dirs.push(module.clone());
      if child.contains("<modules>") {
        dirs.extend(self.module_dirs(&module, &child));
      }
    }
    dirs
  }

  /// Re-pin `dep_name`; with `write == false` only reports whether it would change
  fn repin_dependency(&self, manifest_path: &Path, dep_name: &str, new_version: &str, write: bool) -> ReleaseResult<bool> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;

    let mut after = before.clone();
    // Walk matches back to front so earlier offsets stay valid
    let matches: Vec<Range<usize>> = DEPENDENCY.find_iter(&before).map(|m| m.range()).collect();
    for range in matches.into_iter().rev() {
      let block = &before[range.clone()];
      if child_text(block, "artifactId") != Some(dep_name) {
        continue;
      }
      let Some(version) = element_outside(block, "version", &[]) else {
        continue;
      };
      // Property references are resolved elsewhere
      if block[version.clone()].trim().starts_with("${") {
        continue;
      }
      after.replace_range(range.start + version.start..range.start + version.end, new_version);
    }

    if write {
      write_if_changed(manifest_path, &before, &after)?;
    }
    Ok(before != after)
  }
}

fn parse_module(dir: &Path, pom: &Path) -> ReleaseResult<RawPackage> {
  let xml = fs::read_to_string(pom)?;
  let artifact = text(&xml, top_level_element(&xml, "artifactId"))
    .ok_or_else(|| ReleaseError::coded(ErrorCode::WorkspaceParse, "no <artifactId>"))?
    .to_string();
  let version = text(&xml, top_level_element(&xml, "version"))
    .or_else(|| parent_version(&xml))
    .ok_or_else(|| missing_version(pom))?
    .to_string();
  let packaging = text(&xml, top_level_element(&xml, "packaging")).unwrap_or("jar");

  let managed = block_ranges(&xml, "dependencyManagement");
  let deps: BTreeSet<String> = block_ranges(&xml, "dependencies")
    .into_iter()
    .filter(|r| !managed.iter().any(|m| m.contains(&r.start)))
    .flat_map(|r| {
      DEPENDENCY
        .find_iter(&xml[r])
        .filter_map(|m| child_text(m.as_str(), "artifactId").map(str::to_string))
        .collect::<Vec<_>>()
    })
    .collect();

  let license = block_ranges(&xml, "licenses")
    .into_iter()
    .next()
    .and_then(|r| child_text(&xml[r], "name").map(str::to_string));
  let repository = block_ranges(&xml, "scm")
    .into_iter()
    .next()
    .and_then(|r| child_text(&xml[r], "url").map(str::to_string));

  Ok(RawPackage {
    name: artifact,
    version,
    path: dir.to_path_buf(),
    manifest_path: pom.to_path_buf(),
    deps,
    is_publishable: packaging != "pom",
    metadata: PackageMetadata {
      description: text(&xml, top_level_element(&xml, "description")).map(str::to_string),
      license,
      repository,
      homepage: text(&xml, top_level_element(&xml, "url")).map(str::to_string),
    },
  })
}

impl Workspace for MavenWorkspace {
  fn ecosystem(&self) -> Ecosystem {
    Ecosystem::Maven
  }

  fn root(&self) -> &Path {
    &self.root
  }

  fn discover(&self, exclude: &[String]) -> Vec<Package> {
    discover_or_warn(Ecosystem::Maven, &self.root, || self.load(exclude))
  }

  fn rewrite_version(&self, manifest_path: &Path, new_version: &str) -> ReleaseResult<String> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;

    if let Some(range) = top_level_element(&before, "version") {
      let old = before[range.clone()].trim().to_string();
      let mut after = before.clone();
      after.replace_range(range, new_version);
      write_if_changed(manifest_path, &before, &after)?;
      return Ok(old);
    }

    // Inherited: bump the parent POM and the <parent><version> reference
    let root_pom = self.root_pom();
    if manifest_path == root_pom {
      return Err(missing_version(manifest_path));
    }
    let old = self.rewrite_version(&root_pom, new_version)?;
    if let Some(parent) = block_ranges(&before, "parent").into_iter().next() {
      let block = &before[parent.clone()];
      if let Some(version) = element_outside(block, "version", &[]) {
        let mut after = before.clone();
        after.replace_range(parent.start + version.start..parent.start + version.end, new_version);
        write_if_changed(manifest_path, &before, &after)?;
      }
    }
    Ok(old)
  }

  fn rewrite_dependency_version(&self, manifest_path: &Path, dep_name: &str, new_version: &str) -> ReleaseResult<bool> {
    self.repin_dependency(manifest_path, dep_name, new_version, true)
  }

  fn would_rewrite_dependency(&self, manifest_path: &Path, dep_name: &str, new_version: &str) -> ReleaseResult<bool> {
    self.repin_dependency(manifest_path, dep_name, new_version, false)
  }
}
