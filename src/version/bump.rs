//! Semver bump levels

use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Release number of one to three parts, then an optional qualifier
/// (`1.0-SNAPSHOT`, `1.0.0a1`, `2.1.dev3`)
static LOOSE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(\d+(?:\.\d+){0,2})(?:[-.]?([0-9A-Za-z][0-9A-Za-z.-]*))?$").expect("valid regex")
});

/// Version bump level, ordered `None < Patch < Minor < Major`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
  /// No bump needed (no relevant changes)
  #[default]
  None,
  /// Patch version bump (bug fixes)
  Patch,
  /// Minor version bump (new features)
  Minor,
  /// Major version bump (breaking changes)
  Major,
}

impl VersionBump {
  pub fn as_str(self) -> &'static str {
    match self {
      VersionBump::None => "none",
      VersionBump::Patch => "patch",
      VersionBump::Minor => "minor",
      VersionBump::Major => "major",
    }
  }

  /// Apply bump to a semver version
  ///
  /// Strict semver, also below 1.0: a major bump of `0.4.2` is `1.0.0`.
  /// A pre-release is promoted to its release when the bump does not go
  /// past it (`1.0.0-rc.1` + patch = `1.0.0`). Build metadata is dropped.
  pub fn apply(self, version: &semver::Version) -> semver::Version {
    let pre = !version.pre.is_empty();
    let (major, minor, patch) = (version.major, version.minor, version.patch);
    match self {
      VersionBump::None => version.clone(),
      VersionBump::Major if pre && minor == 0 && patch == 0 => semver::Version::new(major, 0, 0),
      VersionBump::Major => semver::Version::new(major + 1, 0, 0),
      VersionBump::Minor if pre && patch == 0 => semver::Version::new(major, minor, 0),
      VersionBump::Minor => semver::Version::new(major, minor + 1, 0),
      VersionBump::Patch if pre => semver::Version::new(major, minor, patch),
      VersionBump::Patch => semver::Version::new(major, minor, patch + 1),
    }
  }
}

impl fmt::Display for VersionBump {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Parse a manifest version
///
/// Short forms are padded (`1.2` → `1.2.0`). Maven qualifiers and PEP 440
/// pre-release segments become semver pre-release identifiers
/// (`1.0-SNAPSHOT` → `1.0.0-SNAPSHOT`, `1.0.0a1` → `1.0.0-a1`).
pub fn parse_version(version: &str) -> ReleaseResult<semver::Version> {
  let trimmed = version.trim().trim_start_matches('v');
  if let Ok(parsed) = semver::Version::parse(trimmed) {
    return Ok(parsed);
  }

  let invalid = || {
    ReleaseError::coded(
      ErrorCode::VersionInvalid,
      format!("'{}' is not a semantic version", version),
    )
  };
  let caps = LOOSE_VERSION.captures(trimmed).ok_or_else(invalid)?;
  let release: Vec<&str> = caps[1].split('.').collect();
  let mut normalized = release.join(".");
  for _ in release.len()..3 {
    normalized.push_str(".0");
  }
  if let Some(qualifier) = caps.get(2) {
    normalized.push('-');
    normalized.push_str(qualifier.as_str());
  }
  semver::Version::parse(&normalized).map_err(|_| invalid())
}

/// Bump a version string
pub fn bump_version(version: &str, bump: VersionBump) -> ReleaseResult<String> {
  if bump == VersionBump::None {
    return Ok(version.to_string());
  }
  Ok(bump.apply(&parse_version(version)?).to_string())
}
