//! Fail-fast preflight before a release
//!
//! Steps run in a fixed order. A blocking failure stops the run immediately
//! and is returned as `ReleaseError::Blocked` carrying everything recorded so
//! far; warnings never stop it.
//!
//! | Step                 | Blocking |
//! |----------------------|----------|
//! | release-lock         | yes      |
//! | clean-worktree       | yes      |
//! | lockfile             | yes      |
//! | shallow-clone        | no       |
//! | cycles               | yes      |
//! | forge                | no       |
//! | stale-artifacts      | yes      |
//! | trusted-publishing   | no (CI only) |
//! | version-conflicts    | yes (skippable; registry errors fail open) |

use super::files::stale_artifacts;
use super::result::{CheckOutcome, PreflightResult};
use crate::backends::{Forge, PackageManager, Registry, Vcs};
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use crate::core::lock::{LOCK_FILE, ReleaseLock};
use crate::graph::{DependencyGraph, detect_cycles, format_cycles};
use crate::version::PackageVersion;
use crate::workspace::Package;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Variables signalling a CI environment
const CI_VARS: [&str; 3] = ["CI", "GITHUB_ACTIONS", "GITLAB_CI"];

/// Long-lived registry credentials
const TOKEN_VARS: [&str; 7] = [
  "PYPI_TOKEN",
  "UV_PUBLISH_TOKEN",
  "TWINE_PASSWORD",
  "NPM_TOKEN",
  "NODE_AUTH_TOKEN",
  "CARGO_REGISTRY_TOKEN",
  "OSSRH_PASSWORD",
];

/// OIDC identity sources for trusted publishing
const OIDC_VARS: [&str; 2] = ["ACTIONS_ID_TOKEN_REQUEST_URL", "CI_JOB_JWT_V2"];

/// Everything preflight looks at
pub struct PreflightContext<'a> {
  pub vcs: &'a dyn Vcs,
  pub pm: &'a dyn PackageManager,
  pub forge: Option<&'a dyn Forge>,
  pub registry: &'a dyn Registry,
  pub packages: &'a [Package],
  pub graph: &'a DependencyGraph,
  pub versions: &'a [PackageVersion],
  pub workspace_root: &'a Path,
  pub dry_run: bool,
  pub skip_version_check: bool,
  /// Environment snapshot (see [`env_snapshot`])
  pub env: BTreeMap<String, String>,
}

/// The environment variables preflight inspects
pub fn env_snapshot() -> BTreeMap<String, String> {
  CI_VARS
    .iter()
    .chain(TOKEN_VARS.iter())
    .chain(OIDC_VARS.iter())
    .filter_map(|name| std::env::var(name).ok().map(|value| (name.to_string(), value)))
    .collect()
}

fn is_set(env: &BTreeMap<String, String>, name: &str) -> bool {
  env.get(name).is_some_and(|v| !v.trim().is_empty() && v != "false" && v != "0")
}

/// Record a blocking failure and stop
fn block(mut result: PreflightResult, outcome: CheckOutcome) -> ReleaseError {
  let check = outcome.name.clone();
  let info = outcome.to_info(ErrorCode::PreflightVersionConflict);
  result.fail(outcome);
  ReleaseError::Blocked {
    check,
    info,
    result: Box::new(result),
  }
}

/// Run the preflight pipeline
pub fn run_preflight(ctx: PreflightContext<'_>) -> ReleaseResult<PreflightResult> {
  let mut result = PreflightResult::new();
  if ctx.dry_run {
    tracing::info!("preflight (dry run)");
  }

  // 0. Another run mid-release
  if ReleaseLock::is_held(ctx.workspace_root) {
    let path = ctx.workspace_root.join(LOCK_FILE);
    return Err(block(
      result,
      CheckOutcome::new("release-lock", format!("another release run holds {}", path.display()))
        .with_code(ErrorCode::StateLocked)
        .with_location(Path::new(LOCK_FILE), None),
    ));
  }
  result.pass("release-lock");

  // 1. Clean working tree
  if !ctx.vcs.is_clean()? {
    return Err(block(
      result,
      CheckOutcome::new("clean-worktree", "working tree has uncommitted changes")
        .with_code(ErrorCode::PreflightDirtyWorktree),
    ));
  }
  result.pass("clean-worktree");

  // 2. Lockfile freshness
  let lock = ctx.pm.lock(true, None, ctx.workspace_root)?;
  if !lock.success {
    let detail = lock.stderr.trim();
    let message = if detail.is_empty() {
      format!("lockfile is out of date ({})", lock.command)
    } else {
      format!("lockfile is out of date: {}", detail)
    };
    return Err(block(
      result,
      CheckOutcome::new("lockfile", message).with_code(ErrorCode::PreflightLockfileStale),
    ));
  }
  result.pass("lockfile");

  // 3. Shallow clone
  if ctx.vcs.is_shallow()? {
    result.warn(
      CheckOutcome::new("shallow-clone", "repository is a shallow clone; history may be incomplete")
        .with_code(ErrorCode::PreflightShallowClone),
    );
  } else {
    result.pass("shallow-clone");
  }

  // 4. Cycles
  let cycles = detect_cycles(ctx.graph);
  if !cycles.is_empty() {
    return Err(block(
      result,
      CheckOutcome::new("cycles", format!("dependency cycle: {}", format_cycles(&cycles)))
        .with_code(ErrorCode::GraphCycle),
    ));
  }
  result.pass("cycles");

  // 5. Forge
  match ctx.forge {
    None => {
      tracing::debug!("no forge configured, skipping availability check");
      result.pass("forge");
    }
    Some(forge) if forge.is_available() => result.pass("forge"),
    Some(forge) => result.warn(
      CheckOutcome::new("forge", format!("{} is not available; releases and labels will be skipped", forge.name()))
        .with_code(ErrorCode::PreflightForgeUnavailable),
    ),
  }

  // 6. Stale dist/ artifacts
  let stale = stale_artifacts(ctx.workspace_root, ctx.packages);
  if !stale.is_empty() {
    let dirs: Vec<String> = stale
      .iter()
      .map(|d| d.strip_prefix(ctx.workspace_root).unwrap_or(d).display().to_string())
      .collect();
    return Err(block(
      result,
      CheckOutcome::new("stale-artifacts", format!("old build artifacts in {}", dirs.join(", ")))
        .with_code(ErrorCode::PreflightStaleArtifacts),
    ));
  }
  result.pass("stale-artifacts");

  // 7. Trusted publishing (CI only)
  if CI_VARS.iter().any(|v| is_set(&ctx.env, v)) {
    let tokens: Vec<&str> = TOKEN_VARS.iter().copied().filter(|v| is_set(&ctx.env, v)).collect();
    if tokens.is_empty() {
      result.pass("trusted-publishing");
    } else {
      let oidc = OIDC_VARS.iter().any(|v| is_set(&ctx.env, v));
      let mut outcome = CheckOutcome::new(
        "trusted-publishing",
        format!("long-lived credentials in the environment: {}", tokens.join(", ")),
      )
      .with_code(ErrorCode::SecurityLongLivedToken);
      if oidc {
        outcome = outcome.with_hint("an OIDC identity is available; remove the tokens and use trusted publishing");
      }
      result.warn(outcome);
    }
  }

  // 8. Registry version conflicts
  if ctx.skip_version_check {
    tracing::info!("skipping registry version check");
    result.pass("version-conflicts");
    return Ok(result);
  }
  check_version_conflicts(&ctx, result)
}

fn check_version_conflicts(ctx: &PreflightContext<'_>, mut result: PreflightResult) -> ReleaseResult<PreflightResult> {
  let publishable: BTreeSet<&str> = ctx
    .packages
    .iter()
    .filter(|p| p.is_publishable)
    .map(|p| p.name.as_str())
    .collect();
  let candidates: Vec<&PackageVersion> = ctx
    .versions
    .iter()
    .filter(|v| v.is_bumped() && publishable.contains(v.name.as_str()))
    .collect();

  let registry = ctx.registry;
  let lookups: Vec<(&PackageVersion, ReleaseResult<bool>)> = candidates
    .par_iter()
    .map(|v| (*v, registry.check_published(&v.name, &v.new_version)))
    .collect();

  let mut conflicts = Vec::new();
  for (version, lookup) in lookups {
    match lookup {
      Ok(true) => conflicts.push(format!("{}@{}", version.name, version.new_version)),
      Ok(false) => {}
      Err(err) => result.warn(CheckOutcome::new(
        "version-conflicts",
        format!("could not query {} for {}: {}", ctx.registry.name(), version.name, err),
      )),
    }
  }

  if !conflicts.is_empty() {
    return Err(block(
      result,
      CheckOutcome::new(
        "version-conflicts",
        format!("already published on {}: {}", ctx.registry.name(), conflicts.join(", ")),
      )
      .with_code(ErrorCode::PreflightVersionConflict),
    ));
  }
  result.pass("version-conflicts");
  Ok(result)
}
