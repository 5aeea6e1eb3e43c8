//! `releasekit sbom` - Write SBOM documents for a release manifest

use crate::core::context::WorkspaceContext;
use crate::core::error::ReleaseResult;
use crate::sbom::{SbomFormat, generate_sbom_with_packages, write_sbom};
use crate::version::ReleaseManifest;
use std::path::{Path, PathBuf};

/// Run the sbom command
///
/// With `format` set, the document is printed to stdout; otherwise both
/// formats are written into `out_dir`.
pub fn run_sbom(
  ctx: &WorkspaceContext,
  manifest_path: &Path,
  format: Option<String>,
  out_dir: Option<PathBuf>,
) -> ReleaseResult<()> {
  let manifest = ReleaseManifest::load(manifest_path)?;
  let sbom = &ctx.config.sbom;
  let license = sbom.license.as_deref();
  let supplier = sbom.supplier.as_deref();

  if let Some(format) = format {
    let format: SbomFormat = format.parse()?;
    let doc = generate_sbom_with_packages(&manifest, format, ctx.ecosystem(), license, supplier, &ctx.packages)?;
    print!("{}", doc);
    return Ok(());
  }

  let dir = out_dir.unwrap_or_else(|| ctx.root.join("dist"));
  for path in write_sbom(&dir, &manifest, ctx.ecosystem(), license, supplier, &ctx.packages)? {
    println!("{}", path.display());
  }
  Ok(())
}
