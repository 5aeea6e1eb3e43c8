//! Integration tests for SBOM generation

use crate::helpers::{TestWorkspace, run_releasekit, run_releasekit_unchecked};
use anyhow::Result;
use chrono::TimeZone;
use releasekit::sbom::{NOASSERTION, SbomFormat, generate_sbom};
use releasekit::version::{PackageVersion, ReleaseManifest, VersionBump, build_manifest};
use releasekit::workspace::Ecosystem;
use serde_json::Value;

fn genkit_manifest() -> ReleaseManifest {
  build_manifest(
    "0123456789abcdef0123456789abcdef01234567",
    vec![PackageVersion {
      name: "genkit".to_string(),
      old_version: "0.4.0".to_string(),
      new_version: "0.5.0".to_string(),
      bump: VersionBump::Minor,
      skipped: false,
      reason: "1 releasable commit(s) (minor)".to_string(),
    }],
    "v0.5.0",
    chrono::Utc.with_ymd_and_hms(2026, 4, 1, 8, 30, 0).unwrap(),
  )
}

#[test]
fn test_scenario_c_cyclonedx() -> Result<()> {
  let doc = generate_sbom(&genkit_manifest(), SbomFormat::CycloneDx, Ecosystem::Python, None, None)?;
  assert!(doc.contains("pkg:pypi/genkit@0.5.0"));

  let value: Value = serde_json::from_str(&doc)?;
  assert_eq!(value["bomFormat"], "CycloneDX");
  assert_eq!(value["specVersion"], "1.5");
  assert_eq!(value["metadata"]["timestamp"], "2026-04-01T08:30:00Z");
  assert!(value["serialNumber"].as_str().unwrap().starts_with("urn:uuid:"));
  assert_eq!(value["components"][0]["name"], "genkit");
  assert_eq!(value["components"][0]["version"], "0.5.0");
  assert!(value["components"][0].get("licenses").is_none());
  Ok(())
}

#[test]
fn test_scenario_d_spdx() -> Result<()> {
  let doc = generate_sbom(&genkit_manifest(), SbomFormat::Spdx, Ecosystem::Python, None, None)?;
  assert!(doc.contains("SPDXRef-genkit"));
  assert!(doc.contains(NOASSERTION));

  let value: Value = serde_json::from_str(&doc)?;
  assert_eq!(value["spdxVersion"], "SPDX-2.3");
  assert_eq!(value["name"], "releasekit-v0.5.0");
  assert_eq!(value["creationInfo"]["created"], "2026-04-01T08:30:00Z");
  let package = &value["packages"][0];
  assert_eq!(package["licenseDeclared"], NOASSERTION);
  assert_eq!(package["supplier"], NOASSERTION);
  assert_eq!(package["externalRefs"][0]["referenceLocator"], "pkg:pypi/genkit@0.5.0");
  assert_eq!(value["relationships"][0]["relationshipType"], "DESCRIBES");
  Ok(())
}

#[test]
fn test_license_and_supplier_recorded() -> Result<()> {
  let manifest = genkit_manifest();
  let cdx = generate_sbom(&manifest, SbomFormat::CycloneDx, Ecosystem::Python, Some("Apache-2.0"), Some("Example Inc."))?;
  let value: Value = serde_json::from_str(&cdx)?;
  assert_eq!(value["components"][0]["licenses"][0]["license"]["id"], "Apache-2.0");
  assert_eq!(value["metadata"]["supplier"]["name"], "Example Inc.");

  let spdx = generate_sbom(&manifest, SbomFormat::Spdx, Ecosystem::Python, Some("Apache-2.0"), Some("Example Inc."))?;
  let value: Value = serde_json::from_str(&spdx)?;
  assert_eq!(value["packages"][0]["licenseConcluded"], "Apache-2.0");
  assert_eq!(value["packages"][0]["supplier"], "Organization: Example Inc.");
  Ok(())
}

#[test]
fn test_same_manifest_same_document() -> Result<()> {
  let a = generate_sbom(&genkit_manifest(), SbomFormat::Spdx, Ecosystem::Python, None, None)?;
  let b = generate_sbom(&genkit_manifest(), SbomFormat::Spdx, Ecosystem::Python, None, None)?;
  assert_eq!(a, b);
  Ok(())
}

fn workspace_with_manifest() -> Result<(TestWorkspace, std::path::PathBuf)> {
  let ws = TestWorkspace::new()?;
  ws.add_package("core", "1.1.0", &[])?;
  ws.add_package("plugin", "1.0.1", &["core>=1.1.0"])?;
  ws.write_file("releasekit.toml", "[sbom]\nlicense = \"Apache-2.0\"\nsupplier = \"Example Inc.\"\n")?;
  let sha = ws.commit("chore: release")?;

  let manifest = build_manifest(
    &sha,
    vec![
      PackageVersion {
        name: "core".to_string(),
        old_version: "1.0.0".to_string(),
        new_version: "1.1.0".to_string(),
        bump: VersionBump::Minor,
        skipped: false,
        reason: String::new(),
      },
      PackageVersion {
        name: "plugin".to_string(),
        old_version: "1.0.0".to_string(),
        new_version: "1.0.1".to_string(),
        bump: VersionBump::Patch,
        skipped: false,
        reason: "dependency bumped: core".to_string(),
      },
    ],
    "v1.1.0",
    chrono::Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap(),
  );
  let path = ws.path.join("release-manifest.json");
  manifest.save(&path)?;
  Ok((ws, path))
}

#[test]
fn test_cli_sbom_writes_both_formats() -> Result<()> {
  let (ws, manifest_path) = workspace_with_manifest()?;
  run_releasekit(&ws.path, &["sbom", "--manifest", manifest_path.to_str().unwrap()])?;

  let cdx: Value = serde_json::from_str(&ws.read_file("dist/sbom.cdx.json")?)?;
  let spdx: Value = serde_json::from_str(&ws.read_file("dist/sbom.spdx.json")?)?;

  assert_eq!(cdx["components"].as_array().map(Vec::len), Some(2));
  assert_eq!(cdx["components"][0]["description"], "The core package");
  let plugin_deps = &cdx["dependencies"][1];
  assert_eq!(plugin_deps["ref"], "pkg:pypi/plugin@1.0.1");
  assert_eq!(plugin_deps["dependsOn"], serde_json::json!(["pkg:pypi/core@1.1.0"]));

  let depends_on: Vec<&Value> = spdx["relationships"]
    .as_array()
    .unwrap()
    .iter()
    .filter(|r| r["relationshipType"] == "DEPENDS_ON")
    .collect();
  assert_eq!(depends_on.len(), 1);
  assert_eq!(depends_on[0]["spdxElementId"], "SPDXRef-plugin");
  assert_eq!(depends_on[0]["relatedSpdxElement"], "SPDXRef-core");
  assert_eq!(spdx["packages"][0]["licenseDeclared"], "Apache-2.0");
  Ok(())
}

#[test]
fn test_cli_sbom_prints_single_format() -> Result<()> {
  let (ws, manifest_path) = workspace_with_manifest()?;
  let output = run_releasekit(
    &ws.path,
    &["sbom", "--manifest", manifest_path.to_str().unwrap(), "--format", "spdx"],
  )?;
  let doc: Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(doc["spdxVersion"], "SPDX-2.3");
  assert!(!ws.path.join("dist").exists());

  let output = run_releasekit_unchecked(
    &ws.path,
    &["sbom", "--manifest", manifest_path.to_str().unwrap(), "--format", "xml"],
  )?;
  assert!(!output.status.success());
  Ok(())
}
