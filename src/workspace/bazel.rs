//! Bazel adapter
//!
//! A package is a publish-capable rule (`java_export`, `maven_export`,
//! `py_wheel`, `npm_package`, `pkg_npm`, or `rust_library` tagged
//! `"publish"`) with literal `name` and `version` attributes. Dependencies
//! are the `//path:target` labels in its `deps`.

use super::{
  Ecosystem, Package, PackageMetadata, RawPackage, Workspace, discover_or_warn, is_excluded, missing_version,
  write_if_changed,
};
use crate::core::error::{ReleaseResult, ResultExt};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Rule invocation start; the body runs to the matching `)`
static RULE_START: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\b(java_export|maven_export|py_wheel|npm_package|pkg_npm|rust_library)\s*\(").expect("valid regex")
});

static NAME_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bname\s*=\s*"([^"]+)""#).expect("valid regex"));

static VERSION_ATTR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"(\bversion\s*=\s*")([^"]+)(")"#).expect("valid regex"));

static LIST_ATTR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?s)\b(deps|tags)\s*=\s*\[(.*?)\]").expect("valid regex"));

static STRING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("valid regex"));

const BUILD_FILES: [&str; 2] = ["BUILD.bazel", "BUILD"];
const MARKERS: [&str; 3] = ["MODULE.bazel", "WORKSPACE.bazel", "WORKSPACE"];

/// Directories never containing source packages
const SKIP_DIRS: [&str; 3] = [".git", "node_modules", "target"];

#[derive(Debug)]
struct Rule {
  kind: String,
  /// Byte range of the argument list
  body: Range<usize>,
}

/// Find publish-capable rule invocations, matching parentheses to bound each body
fn rules(content: &str) -> Vec<Rule> {
  RULE_START
    .captures_iter(content)
    .filter_map(|caps| {
      let whole = caps.get(0)?;
      let open = whole.end();
      let mut depth = 1usize;
      let mut in_string = false;
      for (offset, c) in content[open..].char_indices() {
        match c {
          '"' => in_string = !in_string,
          '(' if !in_string => depth += 1,
          ')' if !in_string => {
            depth -= 1;
            if depth == 0 {
              return Some(Rule {
                kind: caps[1].to_string(),
                body: open..open + offset,
              });
            }
          }
          _ => {}
        }
      }
      None
    })
    .collect()
}

fn list_attr(body: &str, attr: &str) -> Vec<String> {
  LIST_ATTR
    .captures_iter(body)
    .filter(|c| &c[1] == attr)
    .flat_map(|c| STRING.captures_iter(&c[2]).map(|s| s[1].to_string()).collect::<Vec<_>>())
    .collect()
}

/// Target name of a label: `//a/b:c` → `c`, `//a/b` → `b`, `:c` → `c`
fn label_target(label: &str) -> &str {
  match label.rsplit_once(':') {
    Some((_, target)) => target,
    None => label.trim_end_matches('/').rsplit('/').next().unwrap_or(label),
  }
}

fn rule_name(body: &str) -> Option<String> {
  NAME_ATTR.captures(body).map(|c| c[1].to_string())
}

fn is_publishable_rule(rule: &Rule, body: &str) -> bool {
  rule.kind != "rust_library" || list_attr(body, "tags").iter().any(|t| t == "publish")
}

pub struct BazelWorkspace {
  root: PathBuf,
}

impl BazelWorkspace {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
    }
  }

  /// A MODULE.bazel or WORKSPACE marker exists at the root
  pub fn can_handle(root: &Path) -> bool {
    MARKERS.iter().any(|m| root.join(m).is_file())
  }

  fn load(&self, exclude: &[String]) -> ReleaseResult<Vec<RawPackage>> {
    let mut build_files = Vec::new();
    collect_build_files(&self.root, &mut build_files)?;

    let mut packages = Vec::new();
    for build in build_files {
      let Some(dir) = build.parent() else {
        continue;
      };
      if is_excluded(&self.root, dir, exclude) {
        continue;
      }
      let content = fs::read_to_string(&build).with_context(|| format!("Failed to read {}", build.display()))?;
      for rule in rules(&content) {
        let body = &content[rule.body.clone()];
        if !is_publishable_rule(&rule, body) {
          continue;
        }
        let Some(name) = rule_name(body) else {
          continue;
        };
        let Some(version) = VERSION_ATTR.captures(body).map(|c| c[2].to_string()) else {
          tracing::debug!("{} in {} has no literal version", name, build.display());
          continue;
        };
        let deps: BTreeSet<String> = list_attr(body, "deps")
          .iter()
          .map(|label| label_target(label).to_string())
          .filter(|target| target != &name)
          .collect();
        packages.push(RawPackage {
          name,
          version,
          path: dir.to_path_buf(),
          manifest_path: build.clone(),
          deps,
          is_publishable: true,
          metadata: PackageMetadata::default(),
        });
      }
    }
    Ok(packages)
  }
}

fn collect_build_files(dir: &Path, out: &mut Vec<PathBuf>) -> ReleaseResult<()> {
  if let Some(build) = BUILD_FILES.iter().map(|f| dir.join(f)).find(|p| p.is_file()) {
    out.push(build);
  }
  let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
    .filter_map(|e| e.ok().map(|e| e.path()))
    .filter(|p| p.is_dir())
    .collect();
  entries.sort();
  for entry in entries {
    let name = entry.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.starts_with("bazel-") || SKIP_DIRS.contains(&name) {
      continue;
    }
    collect_build_files(&entry, out)?;
  }
  Ok(())
}

impl Workspace for BazelWorkspace {
  fn ecosystem(&self) -> Ecosystem {
    Ecosystem::Bazel
  }

  fn root(&self) -> &Path {
    &self.root
  }

  fn discover(&self, exclude: &[String]) -> Vec<Package> {
    discover_or_warn(Ecosystem::Bazel, &self.root, || self.load(exclude))
  }

  /// Rewrites the first publishable rule of the BUILD file
  fn rewrite_version(&self, manifest_path: &Path, new_version: &str) -> ReleaseResult<String> {
    let before = fs::read_to_string(manifest_path)
      .with_context(|| format!("Failed to read {}", manifest_path.display()))?;

    let rule = rules(&before)
      .into_iter()
      .find(|r| is_publishable_rule(r, &before[r.body.clone()]))
      .ok_or_else(|| missing_version(manifest_path))?;
    let body = &before[rule.body.clone()];
    let caps = VERSION_ATTR.captures(body).ok_or_else(|| missing_version(manifest_path))?;
    let value = caps.get(2).ok_or_else(|| missing_version(manifest_path))?;
    let old = value.as_str().to_string();

    let mut after = before.clone();
    let start = rule.body.start + value.start();
    after.replace_range(start..start + value.len(), new_version);
    write_if_changed(manifest_path, &before, &after)?;
    Ok(old)
  }

  /// Bazel deps are labels without versions
  fn rewrite_dependency_version(&self, _manifest_path: &Path, _dep_name: &str, _new_version: &str) -> ReleaseResult<bool> {
    Ok(false)
  }

  fn would_rewrite_dependency(&self, _manifest_path: &Path, _dep_name: &str, _new_version: &str) -> ReleaseResult<bool> {
    Ok(false)
  }
}
