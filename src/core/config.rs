//! releasekit configuration (releasekit.toml)
//!
//! Every field has a default, so a workspace without a config file behaves
//! exactly like one with an empty file.
//!
//! ```toml
//! ecosystem = "python"
//! exclude = ["samples/*"]
//! exclude_publish = ["internal-tools"]
//! min_bump = "patch"
//! tag_format = "{name}-v{version}"
//! umbrella_tag_format = "v{version}"
//! core_package = "genkit"
//! plugin_prefix = "genkit-plugin-"
//!
//! [overrides]
//! genkit = "minor"
//!
//! [sbom]
//! license = "Apache-2.0"
//! supplier = "Example Inc."
//! ```

use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult, ResultExt};
use crate::version::VersionBump;
use crate::workspace::Ecosystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for releasekit
/// Searched in order: releasekit.toml, .releasekit.toml, .config/releasekit.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseKitConfig {
  /// Force an ecosystem instead of auto-detecting it
  pub ecosystem: Option<Ecosystem>,

  /// Glob patterns (relative to the workspace root) of package directories to ignore
  pub exclude: Vec<String>,

  /// Package names that are discovered and planned but never published
  pub exclude_publish: Vec<String>,

  /// Minimum bump applied to any package with a releasable change
  pub min_bump: VersionBump,

  /// Manual per-package bump overrides
  pub overrides: BTreeMap<String, VersionBump>,

  /// Per-package tag format; placeholders `{name}` and `{version}`
  pub tag_format: String,

  /// Umbrella tag format; placeholder `{version}` (version of `core_package`, or highest bumped)
  pub umbrella_tag_format: String,

  /// Branch release PRs are merged into
  pub release_branch: String,

  /// Package whose version plugins must track
  pub core_package: Option<String>,

  /// Name prefix identifying plugin packages
  pub plugin_prefix: Option<String>,

  pub labels: LabelConfig,
  pub sbom: SbomConfig,
  pub registry: RegistryConfig,
}

/// Labels used on release PRs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
  pub pending: String,
  pub tagged: String,
}

impl Default for LabelConfig {
  fn default() -> Self {
    Self {
      pending: "autorelease: pending".to_string(),
      tagged: "autorelease: tagged".to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SbomConfig {
  /// SPDX license identifier applied to every component
  pub license: Option<String>,
  /// Organization name recorded as supplier
  pub supplier: Option<String>,
}

/// Registry polling bounds (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
  pub poll_interval_secs: u64,
  pub poll_timeout_secs: u64,
}

impl Default for RegistryConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs: 5,
      poll_timeout_secs: 300,
    }
  }
}

impl Default for ReleaseKitConfig {
  fn default() -> Self {
    Self {
      ecosystem: None,
      exclude: Vec::new(),
      exclude_publish: Vec::new(),
      min_bump: VersionBump::None,
      overrides: BTreeMap::new(),
      tag_format: "{name}-v{version}".to_string(),
      umbrella_tag_format: "v{version}".to_string(),
      release_branch: "main".to_string(),
      core_package: None,
      plugin_prefix: None,
      labels: LabelConfig::default(),
      sbom: SbomConfig::default(),
      registry: RegistryConfig::default(),
    }
  }
}

impl ReleaseKitConfig {
  /// Find config file in search order
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = [
      path.join("releasekit.toml"),
      path.join(".releasekit.toml"),
      path.join(".config").join("releasekit.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from the workspace root
  pub fn load(path: &Path) -> ReleaseResult<Self> {
    let config_path = Self::find_config_path(path).ok_or_else(|| {
      ReleaseError::coded(
        ErrorCode::ConfigNotFound,
        format!("no releasekit.toml found in {}", path.display()),
      )
    })?;

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    Self::parse(&content).with_context(|| format!("Invalid config in {}", config_path.display()))
  }

  /// Load config, falling back to defaults when no file exists
  pub fn load_or_default(path: &Path) -> ReleaseResult<Self> {
    match Self::load(path) {
      Err(err) if err.code() == Some(ErrorCode::ConfigNotFound) => {
        tracing::debug!("no releasekit.toml under {}, using defaults", path.display());
        Ok(Self::default())
      }
      other => other,
    }
  }

  /// Parse and validate config text
  pub fn parse(content: &str) -> ReleaseResult<Self> {
    let config: ReleaseKitConfig = toml_edit::de::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Validate field values
  pub fn validate(&self) -> ReleaseResult<()> {
    if !self.tag_format.contains("{version}") {
      return Err(ReleaseError::coded(
        ErrorCode::ConfigInvalid,
        format!("tag_format '{}' must contain {{version}}", self.tag_format),
      ));
    }
    if !self.tag_format.contains("{name}") {
      return Err(ReleaseError::coded(
        ErrorCode::ConfigInvalid,
        format!("tag_format '{}' must contain {{name}}", self.tag_format),
      ));
    }
    if !self.umbrella_tag_format.contains("{version}") {
      return Err(ReleaseError::coded(
        ErrorCode::ConfigInvalid,
        format!("umbrella_tag_format '{}' must contain {{version}}", self.umbrella_tag_format),
      ));
    }
    if self.labels.pending.is_empty() || self.labels.tagged.is_empty() || self.labels.pending == self.labels.tagged {
      return Err(ReleaseError::coded(
        ErrorCode::ConfigInvalid,
        "labels.pending and labels.tagged must be distinct and non-empty",
      ));
    }
    if self.registry.poll_interval_secs == 0 || self.registry.poll_timeout_secs == 0 {
      return Err(ReleaseError::coded(
        ErrorCode::ConfigInvalid,
        "registry poll interval and timeout must be positive",
      ));
    }
    for pattern in &self.exclude {
      glob::Pattern::new(pattern)?;
    }
    Ok(())
  }

  /// Format a per-package tag
  pub fn format_tag(&self, name: &str, version: &str) -> String {
    format_tag(&self.tag_format, name, version)
  }
}

/// Substitute `{name}` and `{version}` in a tag format
pub fn format_tag(format: &str, name: &str, version: &str) -> String {
  format.replace("{name}", name).replace("{version}", version)
}
