//! CycloneDX 1.5 JSON

use super::SbomComponent;
use crate::version::ReleaseManifest;
use serde_json::{Value, json};

pub const SPEC_VERSION: &str = "1.5";

/// RFC 4122 style UUID (version 5 layout) built from a hex digest
fn serial_number(digest: &str) -> String {
  let h: Vec<char> = digest.chars().chain(std::iter::repeat('0')).take(32).collect();
  let part = |range: std::ops::Range<usize>| -> String { h[range].iter().collect() };
  let variant = ['8', '9', 'a', 'b'][h[16].to_digit(16).unwrap_or(0) as usize & 3];
  format!(
    "urn:uuid:{}-{}-5{}-{}{}-{}",
    part(0..8),
    part(8..12),
    part(13..16),
    variant,
    part(17..20),
    part(20..32)
  )
}

fn component(c: &SbomComponent) -> Value {
  let mut value = json!({
    "type": "library",
    "bom-ref": c.purl,
    "name": c.name,
    "version": c.version,
    "purl": c.purl,
  });
  if let Some(description) = &c.description {
    value["description"] = json!(description);
  }
  if let Some(license) = &c.license_id {
    value["licenses"] = json!([{ "license": { "id": license } }]);
  }
  if let Some(supplier) = &c.supplier {
    value["supplier"] = json!({ "name": supplier });
  }
  value
}

pub(super) fn document(
  manifest: &ReleaseManifest,
  components: &[SbomComponent],
  digest: &str,
  supplier: Option<&str>,
) -> Value {
  let purl_of = |name: &str| components.iter().find(|c| c.name == name).map(|c| c.purl.clone());

  let dependencies: Vec<Value> = components
    .iter()
    .map(|c| {
      let depends_on: Vec<String> = c.dependencies.iter().filter_map(|d| purl_of(d)).collect();
      json!({ "ref": c.purl, "dependsOn": depends_on })
    })
    .collect();

  let mut metadata = json!({
    "timestamp": manifest.created_at,
    "tools": {
      "components": [{
        "type": "application",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
      }]
    },
  });
  if let Some(supplier) = supplier {
    metadata["supplier"] = json!({ "name": supplier });
  }

  json!({
    "bomFormat": "CycloneDX",
    "specVersion": SPEC_VERSION,
    "serialNumber": serial_number(digest),
    "version": 1,
    "metadata": metadata,
    "components": components.iter().map(component).collect::<Vec<_>>(),
    "dependencies": dependencies,
  })
}
