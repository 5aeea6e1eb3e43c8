//! Release manifest: the record handed from the release PR to the tag step
//!
//! The manifest is embedded in the release PR body as fenced JSON between two
//! marker comments; after merge, the tag orchestrator reads it back.

use super::planner::PackageVersion;
use crate::core::config::format_tag;
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_START: &str = "<!-- releasekit:manifest:start -->";
pub const MANIFEST_END: &str = "<!-- releasekit:manifest:end -->";

/// Versions planned for one release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
  pub git_sha: String,
  #[serde(default)]
  pub umbrella_tag: String,
  pub packages: Vec<PackageVersion>,
  pub created_at: String,
}

impl ReleaseManifest {
  /// Packages whose version changes
  pub fn bumped(&self) -> Vec<&PackageVersion> {
    self.packages.iter().filter(|p| p.is_bumped()).collect()
  }

  /// Pretty JSON with fixed field order
  pub fn to_json(&self) -> ReleaseResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Parse and validate a manifest
  pub fn from_json(json: &str) -> ReleaseResult<Self> {
    let manifest: Self = serde_json::from_str(json).map_err(|e| {
      ReleaseError::coded(ErrorCode::TagManifestInvalid, format!("malformed release manifest: {}", e))
    })?;
    if manifest.git_sha.trim().is_empty() {
      return Err(ReleaseError::coded(
        ErrorCode::TagMissingSha,
        "release manifest has no git_sha",
      ));
    }
    Ok(manifest)
  }

  pub fn load(path: &Path) -> ReleaseResult<Self> {
    let content = std::fs::read_to_string(path).map_err(|e| {
      ReleaseError::coded(
        ErrorCode::TagManifestInvalid,
        format!("cannot read manifest {}: {}", path.display(), e),
      )
    })?;
    Self::from_json(&content)
  }

  pub fn save(&self, path: &Path) -> ReleaseResult<()> {
    let mut json = self.to_json()?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
  }
}

/// Assemble a manifest; `created_at` is rendered as RFC 3339 (seconds, `Z`)
pub fn build_manifest(
  git_sha: &str,
  versions: Vec<PackageVersion>,
  umbrella_tag: &str,
  created_at: DateTime<Utc>,
) -> ReleaseManifest {
  ReleaseManifest {
    git_sha: git_sha.to_string(),
    umbrella_tag: umbrella_tag.to_string(),
    packages: versions,
    created_at: created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
  }
}

/// Umbrella tag for a release: the core package's new version when it is
/// bumped, otherwise the highest bumped version. `None` when nothing is bumped.
pub fn umbrella_tag(versions: &[PackageVersion], core_package: Option<&str>, format: &str) -> Option<String> {
  let bumped: Vec<&PackageVersion> = versions.iter().filter(|v| v.is_bumped()).collect();
  let core = core_package.and_then(|core| bumped.iter().find(|v| v.name == core));
  let version = match core {
    Some(core) => core.new_version.clone(),
    None => bumped
      .iter()
      .filter_map(|v| semver::Version::parse(&v.new_version).ok())
      .max()?
      .to_string(),
  };
  Some(format_tag(format, "", &version))
}

/// Release PR body: a summary table followed by the embedded manifest
pub fn embed_in_pr_body(manifest: &ReleaseManifest) -> ReleaseResult<String> {
  let mut body = String::from("## Release\n\n");
  let bumped = manifest.bumped();
  if bumped.is_empty() {
    body.push_str("No packages are bumped.\n");
  } else {
    body.push_str("| Package | Version | Bump |\n|---|---|---|\n");
    for pkg in bumped {
      body.push_str(&format!(
        "| {} | {} → {} | {} |\n",
        pkg.name, pkg.old_version, pkg.new_version, pkg.bump
      ));
    }
  }
  body.push('\n');
  body.push_str(MANIFEST_START);
  body.push_str("\n```json\n");
  body.push_str(&manifest.to_json()?);
  body.push_str("\n```\n");
  body.push_str(MANIFEST_END);
  body.push('\n');
  Ok(body)
}

/// Extract the manifest embedded by [`embed_in_pr_body`]
pub fn extract_from_pr_body(body: &str) -> ReleaseResult<ReleaseManifest> {
  let missing = || ReleaseError::coded(ErrorCode::TagManifestInvalid, "PR body has no embedded release manifest");

  let start = body.find(MANIFEST_START).ok_or_else(missing)? + MANIFEST_START.len();
  let end = body[start..].find(MANIFEST_END).ok_or_else(missing)? + start;
  let block = body[start..end].trim();

  let json = block
    .strip_prefix("```json")
    .or_else(|| block.strip_prefix("```"))
    .and_then(|rest| rest.strip_suffix("```"))
    .unwrap_or(block);
  ReleaseManifest::from_json(json.trim())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::version::VersionBump;
  use chrono::TimeZone;

  fn version(name: &str, old: &str, new: &str, bump: VersionBump) -> PackageVersion {
    PackageVersion {
      name: name.to_string(),
      old_version: old.to_string(),
      new_version: new.to_string(),
      bump,
      skipped: old == new,
      reason: String::new(),
    }
  }

  fn manifest() -> ReleaseManifest {
    build_manifest(
      "abc123",
      vec![
        version("genkit", "0.5.0", "0.6.0", VersionBump::Minor),
        version("genkit-plugin-a", "0.1.0", "0.1.0", VersionBump::None),
      ],
      "v0.6.0",
      Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    )
  }

  #[test]
  fn test_created_at_format_and_bumped() {
    let m = manifest();
    assert_eq!(m.created_at, "2026-03-01T12:00:00Z");
    let bumped: Vec<_> = m.bumped().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(bumped, vec!["genkit"]);
  }

  #[test]
  fn test_json_is_stable() {
    let m = manifest();
    let json = m.to_json().unwrap();
    let again = ReleaseManifest::from_json(&json).unwrap();
    assert_eq!(again, m);
    assert_eq!(again.to_json().unwrap(), json);
    assert!(json.find("\"git_sha\"").unwrap() < json.find("\"created_at\"").unwrap());
  }

  #[test]
  fn test_pr_body_embedding() {
    let m = manifest();
    let body = embed_in_pr_body(&m).unwrap();
    assert!(body.contains("| genkit | 0.5.0 → 0.6.0 | minor |"));
    assert!(!body.contains("| genkit-plugin-a |"));

    let wrapped = format!("Some preamble\n\n{}\n\nTrailing notes", body);
    assert_eq!(extract_from_pr_body(&wrapped).unwrap(), m);
  }

  #[test]
  fn test_extract_errors() {
    let err = extract_from_pr_body("just a PR").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TagManifestInvalid));

    let bad = format!("{}\n```json\n{{not json\n```\n{}", MANIFEST_START, MANIFEST_END);
    assert_eq!(extract_from_pr_body(&bad).unwrap_err().code(), Some(ErrorCode::TagManifestInvalid));

    let no_sha = format!(
      "{}\n```json\n{{\"git_sha\": \"\", \"packages\": [], \"created_at\": \"x\"}}\n```\n{}",
      MANIFEST_START, MANIFEST_END
    );
    assert_eq!(extract_from_pr_body(&no_sha).unwrap_err().code(), Some(ErrorCode::TagMissingSha));
  }

  #[test]
  fn test_umbrella_tag_prefers_core() {
    let versions = vec![
      version("genkit", "0.5.0", "0.6.0", VersionBump::Minor),
      version("plugin", "1.0.0", "1.0.1", VersionBump::Patch),
    ];
    assert_eq!(umbrella_tag(&versions, Some("genkit"), "v{version}").as_deref(), Some("v0.6.0"));
    assert_eq!(umbrella_tag(&versions, None, "v{version}").as_deref(), Some("v1.0.1"));
    assert_eq!(umbrella_tag(&versions[..0], None, "v{version}"), None);
  }
}
