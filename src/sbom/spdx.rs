//! SPDX 2.3 JSON

use super::{NOASSERTION, SbomComponent};
use crate::version::ReleaseManifest;
use serde_json::{Value, json};

pub const SPDX_VERSION: &str = "SPDX-2.3";
pub const DOCUMENT_ID: &str = "SPDXRef-DOCUMENT";

/// `SPDXRef-` id for a package; characters outside `[A-Za-z0-9.-]` become `-`
pub fn spdx_id(name: &str) -> String {
  let sanitized: String = name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '-' })
    .collect();
  format!("SPDXRef-{}", sanitized)
}

fn or_noassertion(value: Option<&str>) -> String {
  value.unwrap_or(NOASSERTION).to_string()
}

fn package(c: &SbomComponent) -> Value {
  let mut value = json!({
    "SPDXID": spdx_id(&c.name),
    "name": c.name,
    "versionInfo": c.version,
    "downloadLocation": NOASSERTION,
    "supplier": c.supplier.as_ref().map(|s| format!("Organization: {}", s)).unwrap_or_else(|| NOASSERTION.to_string()),
    "licenseConcluded": or_noassertion(c.license_id.as_deref()),
    "licenseDeclared": or_noassertion(c.license_id.as_deref()),
    "copyrightText": NOASSERTION,
    "filesAnalyzed": false,
    "externalRefs": [{
      "referenceCategory": "PACKAGE-MANAGER",
      "referenceType": "purl",
      "referenceLocator": c.purl,
    }],
  });
  if let Some(description) = &c.description {
    value["description"] = json!(description);
  }
  value
}

pub(super) fn document(
  manifest: &ReleaseManifest,
  components: &[SbomComponent],
  digest: &str,
  supplier: Option<&str>,
) -> Value {
  let name = if manifest.umbrella_tag.is_empty() {
    format!("releasekit-{}", manifest.git_sha.chars().take(12).collect::<String>())
  } else {
    format!("releasekit-{}", manifest.umbrella_tag)
  };

  let mut creators = vec![format!("Tool: {}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))];
  if let Some(supplier) = supplier {
    creators.push(format!("Organization: {}", supplier));
  }

  let mut relationships: Vec<Value> = components
    .iter()
    .map(|c| {
      json!({
        "spdxElementId": DOCUMENT_ID,
        "relationshipType": "DESCRIBES",
        "relatedSpdxElement": spdx_id(&c.name),
      })
    })
    .collect();
  for c in components {
    for dep in &c.dependencies {
      relationships.push(json!({
        "spdxElementId": spdx_id(&c.name),
        "relationshipType": "DEPENDS_ON",
        "relatedSpdxElement": spdx_id(dep),
      }));
    }
  }

  json!({
    "spdxVersion": SPDX_VERSION,
    "dataLicense": "CC0-1.0",
    "SPDXID": DOCUMENT_ID,
    "name": name,
    "documentNamespace": format!("https://spdx.org/spdxdocs/{}-{}", name, digest),
    "creationInfo": {
      "created": manifest.created_at,
      "creators": creators,
    },
    "packages": components.iter().map(package).collect::<Vec<_>>(),
    "relationships": relationships,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_spdx_id_sanitizes() {
    assert_eq!(spdx_id("genkit"), "SPDXRef-genkit");
    assert_eq!(spdx_id("@genkit-ai/core"), "SPDXRef--genkit-ai-core");
    assert_eq!(spdx_id("my_pkg.v2"), "SPDXRef-my-pkg.v2");
  }

  #[test]
  fn test_document_name_from_multibyte_sha() {
    let manifest = crate::version::build_manifest("ääääääääääääää", Vec::new(), "", chrono::Utc::now());
    let doc = document(&manifest, &[], "digest", None);
    assert_eq!(doc["name"], format!("releasekit-{}", "ä".repeat(12)));
  }
}
