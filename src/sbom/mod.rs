//! Software bill of materials for a release
//!
//! Components are derived 1:1 from the release manifest's packages. Output is
//! deterministic: timestamps come from the manifest's `created_at` and the
//! document serial number is derived from a SHA-256 of the manifest JSON.
//!
//! # Formats
//!
//! - CycloneDX 1.5 JSON (`sbom.cdx.json`)
//! - SPDX 2.3 JSON (`sbom.spdx.json`)

mod cyclonedx;
mod spdx;

use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::version::ReleaseManifest;
use crate::workspace::{Ecosystem, Package};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Value SPDX uses for fields with no information
pub const NOASSERTION: &str = "NOASSERTION";

/// SBOM output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SbomFormat {
  CycloneDx,
  Spdx,
}

impl SbomFormat {
  pub const ALL: [SbomFormat; 2] = [SbomFormat::CycloneDx, SbomFormat::Spdx];

  pub fn as_str(self) -> &'static str {
    match self {
      SbomFormat::CycloneDx => "cyclonedx",
      SbomFormat::Spdx => "spdx",
    }
  }

  /// File name used by `write_sbom`
  pub fn file_name(self) -> &'static str {
    match self {
      SbomFormat::CycloneDx => "sbom.cdx.json",
      SbomFormat::Spdx => "sbom.spdx.json",
    }
  }
}

impl fmt::Display for SbomFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for SbomFormat {
  type Err = ReleaseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "cyclonedx" | "cdx" => Ok(SbomFormat::CycloneDx),
      "spdx" => Ok(SbomFormat::Spdx),
      other => Err(ReleaseError::with_help(
        format!("unknown SBOM format '{}'", other),
        "expected 'cyclonedx' or 'spdx'",
      )),
    }
  }
}

/// One released package as it appears in an SBOM
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SbomComponent {
  pub name: String,
  pub version: String,
  pub purl: String,
  pub license_id: Option<String>,
  pub supplier: Option<String>,
  pub description: Option<String>,
  /// Names of other components this one depends on
  pub dependencies: Vec<String>,
}

/// Package URL for `name@version` in `ecosystem`
///
/// Scoped npm names (`@scope/pkg`) are kept verbatim. Maven and Gradle names
/// of the form `group:artifact` become `pkg:maven/group/artifact@v`.
pub fn purl(ecosystem: Ecosystem, name: &str, version: &str) -> String {
  match ecosystem {
    Ecosystem::Python => format!("pkg:pypi/{}@{}", name, version),
    Ecosystem::Npm => format!("pkg:npm/{}@{}", name, version),
    Ecosystem::Cargo => format!("pkg:cargo/{}@{}", name, version),
    Ecosystem::Maven | Ecosystem::Gradle => match name.split_once(':') {
      Some((group, artifact)) => format!("pkg:maven/{}/{}@{}", group, artifact, version),
      None => format!("pkg:maven/{}@{}", name, version),
    },
    Ecosystem::Bazel => format!("pkg:generic/{}@{}", name, version),
  }
}

/// Build components from a manifest
///
/// `packages`, when given, supplies descriptions and the dependency edges
/// between released packages.
pub fn components(
  manifest: &ReleaseManifest,
  ecosystem: Ecosystem,
  license_id: Option<&str>,
  supplier: Option<&str>,
  packages: &[Package],
) -> Vec<SbomComponent> {
  let by_name: BTreeMap<&str, &Package> = packages.iter().map(|p| (p.name.as_str(), p)).collect();
  let released: Vec<&str> = manifest.packages.iter().map(|p| p.name.as_str()).collect();

  manifest
    .packages
    .iter()
    .map(|entry| {
      let version = if entry.new_version.is_empty() {
        entry.old_version.clone()
      } else {
        entry.new_version.clone()
      };
      let package = by_name.get(entry.name.as_str());
      let dependencies = package
        .map(|p| {
          p.internal_deps
            .iter()
            .filter(|d| **d != p.name && released.contains(&d.as_str()))
            .cloned()
            .collect()
        })
        .unwrap_or_default();

      SbomComponent {
        purl: purl(ecosystem, &entry.name, &version),
        name: entry.name.clone(),
        version,
        license_id: license_id.map(str::to_string),
        supplier: supplier.map(str::to_string),
        description: package.and_then(|p| p.metadata.description.clone()),
        dependencies,
      }
    })
    .collect()
}

/// Deterministic document identity derived from the manifest
fn manifest_digest(manifest: &ReleaseManifest) -> ReleaseResult<String> {
  let json = manifest.to_json()?;
  Ok(format!("{:x}", Sha256::digest(json.as_bytes())))
}

/// Render an SBOM for `manifest`
pub fn generate_sbom(
  manifest: &ReleaseManifest,
  format: SbomFormat,
  ecosystem: Ecosystem,
  license_id: Option<&str>,
  supplier: Option<&str>,
) -> ReleaseResult<String> {
  generate_sbom_with_packages(manifest, format, ecosystem, license_id, supplier, &[])
}

/// Same as [`generate_sbom`], enriched with discovered package data
pub fn generate_sbom_with_packages(
  manifest: &ReleaseManifest,
  format: SbomFormat,
  ecosystem: Ecosystem,
  license_id: Option<&str>,
  supplier: Option<&str>,
  packages: &[Package],
) -> ReleaseResult<String> {
  let components = components(manifest, ecosystem, license_id, supplier, packages);
  let digest = manifest_digest(manifest)?;
  let document = match format {
    SbomFormat::CycloneDx => cyclonedx::document(manifest, &components, &digest, supplier),
    SbomFormat::Spdx => spdx::document(manifest, &components, &digest, supplier),
  };
  let mut out = serde_json::to_string_pretty(&document)?;
  out.push('\n');
  Ok(out)
}

/// Write both formats into `dir`; returns the written paths
pub fn write_sbom(
  dir: &Path,
  manifest: &ReleaseManifest,
  ecosystem: Ecosystem,
  license_id: Option<&str>,
  supplier: Option<&str>,
  packages: &[Package],
) -> ReleaseResult<Vec<PathBuf>> {
  std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
  let mut written = Vec::new();
  for format in SbomFormat::ALL {
    let content = generate_sbom_with_packages(manifest, format, ecosystem, license_id, supplier, packages)?;
    let path = dir.join(format.file_name());
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("wrote {} SBOM to {}", format, path.display());
    written.push(path);
  }
  Ok(written)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::version::{PackageVersion, VersionBump, build_manifest};
  use chrono::TimeZone;
  use std::collections::BTreeSet;

  fn version(name: &str, old: &str, new: &str) -> PackageVersion {
    PackageVersion {
      name: name.to_string(),
      old_version: old.to_string(),
      new_version: new.to_string(),
      bump: VersionBump::Minor,
      skipped: false,
      reason: String::new(),
    }
  }

  fn manifest() -> ReleaseManifest {
    build_manifest(
      "abc123",
      vec![version("genkit", "0.4.0", "0.5.0"), version("genkit-plugin-x", "0.1.0", "")],
      "v0.5.0",
      chrono::Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    )
  }

  #[test]
  fn test_purls() {
    assert_eq!(purl(Ecosystem::Python, "genkit", "0.5.0"), "pkg:pypi/genkit@0.5.0");
    assert_eq!(purl(Ecosystem::Npm, "@genkit-ai/core", "1.0.0"), "pkg:npm/@genkit-ai/core@1.0.0");
    assert_eq!(purl(Ecosystem::Cargo, "serde", "1.0.0"), "pkg:cargo/serde@1.0.0");
    assert_eq!(
      purl(Ecosystem::Maven, "com.example:core", "2.0.0"),
      "pkg:maven/com.example/core@2.0.0"
    );
    assert_eq!(purl(Ecosystem::Gradle, "core", "2.0.0"), "pkg:maven/core@2.0.0");
    assert_eq!(purl(Ecosystem::Bazel, "//lib:core", "1.0.0"), "pkg:generic///lib:core@1.0.0");
  }

  #[test]
  fn test_components_version_fallback_and_deps() {
    let package = |name: &str, deps: &[&str]| Package {
      name: name.to_string(),
      version: "0.0.0".to_string(),
      path: PathBuf::from(name),
      manifest_path: PathBuf::from(name).join("pyproject.toml"),
      internal_deps: deps.iter().map(|d| d.to_string()).collect(),
      external_deps: BTreeSet::new(),
      all_deps: deps.iter().map(|d| d.to_string()).collect(),
      is_publishable: true,
      metadata: Default::default(),
    };
    let packages = vec![package("genkit", &[]), package("genkit-plugin-x", &["genkit", "unreleased"])];

    let components = components(&manifest(), Ecosystem::Python, Some("Apache-2.0"), None, &packages);
    assert_eq!(components[0].version, "0.5.0");
    assert_eq!(components[1].version, "0.1.0");
    assert_eq!(components[1].purl, "pkg:pypi/genkit-plugin-x@0.1.0");
    assert_eq!(components[1].dependencies, vec!["genkit"]);
    assert_eq!(components[0].license_id.as_deref(), Some("Apache-2.0"));
  }

  #[test]
  fn test_output_is_deterministic() {
    let a = generate_sbom(&manifest(), SbomFormat::CycloneDx, Ecosystem::Python, None, None).unwrap();
    let b = generate_sbom(&manifest(), SbomFormat::CycloneDx, Ecosystem::Python, None, None).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn test_write_sbom_writes_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("sbom");
    let written = write_sbom(&out, &manifest(), Ecosystem::Python, None, None, &[]).unwrap();
    assert_eq!(written, vec![out.join("sbom.cdx.json"), out.join("sbom.spdx.json")]);
    assert!(written.iter().all(|p| p.is_file()));
  }

  #[test]
  fn test_format_parsing() {
    assert_eq!("CycloneDX".parse::<SbomFormat>().unwrap(), SbomFormat::CycloneDx);
    assert_eq!("spdx".parse::<SbomFormat>().unwrap(), SbomFormat::Spdx);
    assert!("xml".parse::<SbomFormat>().is_err());
  }
}
