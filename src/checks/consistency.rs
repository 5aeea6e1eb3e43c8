//! Consistency checks: plugin versions, directory naming, manifest metadata

use super::result::CheckOutcome;
use super::trait_def::{Check, CheckContext};
use crate::core::error::ErrorCode;
use crate::workspace::{Ecosystem, Package};

/// Plugins release in lockstep with the core package
pub struct VersionConsistencyCheck;

impl Check for VersionConsistencyCheck {
  fn name(&self) -> &'static str {
    "version-consistency"
  }

  fn description(&self) -> &'static str {
    "Plugin versions match the core package version"
  }

  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome> {
    let Some(core_name) = ctx.options.core_package.as_deref() else {
      return Vec::new();
    };
    let Some(core) = ctx.packages.iter().find(|p| p.name == core_name) else {
      tracing::debug!("core package {} not discovered", core_name);
      return Vec::new();
    };

    ctx
      .publishable()
      .filter(|p| p.name != core.name)
      .filter(|p| is_plugin(p, core, ctx.options.plugin_prefix.as_deref()))
      .filter(|p| p.version != core.version)
      .map(|p| {
        CheckOutcome::new(
          self.name(),
          format!("{} is at {} but {} is at {}", p.name, p.version, core.name, core.version),
        )
        .with_code(ErrorCode::PreflightVersionMismatch)
        .with_location(&ctx.relative(&p.manifest_path), None)
      })
      .collect()
  }
}

/// With a prefix, plugins are named by it; otherwise they depend on the core
fn is_plugin(pkg: &Package, core: &Package, prefix: Option<&str>) -> bool {
  match prefix {
    Some(prefix) => pkg.name.starts_with(prefix),
    None => pkg.internal_deps.contains(&core.name),
  }
}

/// `My_Pkg.name` → `my-pkg-name`
fn normalize(name: &str) -> String {
  name.to_lowercase().replace(['_', '.'], "-")
}

/// Package directories are named after the package
///
/// Accepted: the full name, the name without `plugin_prefix`, or the part
/// after an npm scope (`@acme/core` in `core/`).
pub struct NamingCheck;

impl Check for NamingCheck {
  fn name(&self) -> &'static str {
    "naming"
  }

  fn description(&self) -> &'static str {
    "Package directory names match package names"
  }

  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome> {
    // Bazel targets are not named after their directory
    if ctx.options.ecosystem == Ecosystem::Bazel {
      return Vec::new();
    }

    let mut findings = Vec::new();
    for pkg in ctx.packages {
      if pkg.path == ctx.options.workspace_root {
        continue;
      }
      let Some(dir) = pkg.path.file_name().and_then(|n| n.to_str()) else {
        continue;
      };
      let dir = normalize(dir);
      let name = normalize(&pkg.name);
      let unscoped = name.rsplit('/').next().unwrap_or(&name).to_string();
      let unprefixed = ctx
        .options
        .plugin_prefix
        .as_deref()
        .and_then(|prefix| name.strip_prefix(&normalize(prefix)).map(str::to_string));

      if dir == name || dir == unscoped || unprefixed.as_deref() == Some(dir.as_str()) {
        continue;
      }
      findings.push(
        CheckOutcome::new(
          self.name(),
          format!("{} lives in directory '{}'", pkg.name, ctx.relative(&pkg.path).display()),
        )
        .with_code(ErrorCode::PreflightNaming)
        .with_location(&ctx.relative(&pkg.path), None),
      );
    }
    findings
  }
}

/// Publishable packages carry description, license and repository metadata
pub struct MetadataCheck;

impl Check for MetadataCheck {
  fn name(&self) -> &'static str {
    "metadata"
  }

  fn description(&self) -> &'static str {
    "Publishable manifests have complete metadata"
  }

  fn run(&self, ctx: &CheckContext<'_>) -> Vec<CheckOutcome> {
    // Bazel rules carry no package metadata
    if ctx.options.ecosystem == Ecosystem::Bazel {
      return Vec::new();
    }

    ctx
      .publishable()
      .filter_map(|p| {
        let missing = p.metadata.missing_fields();
        if missing.is_empty() {
          return None;
        }
        Some(
          CheckOutcome::new(self.name(), format!("{} is missing {}", p.name, missing.join(", ")))
            .with_code(ErrorCode::PreflightMetadata)
            .with_location(&ctx.relative(&p.manifest_path), None),
        )
      })
      .collect()
  }
}
