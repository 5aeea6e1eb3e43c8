//! Post-merge tagging and platform release
//!
//! # Steps
//!
//! ```text
//! find-manifest → tag-packages → tag-umbrella → push-tags
//!   → create-platform-release → swap-labels
//! ```
//!
//! Tag creation is all-or-nothing: when one tag fails (or the push fails),
//! every tag created by this run is deleted again. Tags that already existed
//! are left alone and reported as skipped, so a re-run after a partial
//! failure picks up where it stopped.
//!
//! With `dry_run` the control flow and the returned `TagResult` are the same,
//! but nothing is created, pushed or labelled.

mod platform;

use crate::backends::{Forge, PrFilter, PrState, PullRequest, Vcs};
use crate::core::config::{ReleaseKitConfig, format_tag};
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use crate::core::lock::ReleaseLock;
use crate::version::{ReleaseManifest, extract_from_pr_body};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use platform::release_notes;

/// Where the release manifest comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
  /// A manifest JSON file on disk
  File(PathBuf),
  /// The most recently merged release PR on the release branch
  PullRequest,
}

/// Everything the tag orchestrator needs
pub struct TagContext<'a> {
  pub vcs: &'a dyn Vcs,
  pub forge: Option<&'a dyn Forge>,
  pub config: &'a ReleaseKitConfig,
  pub workspace_root: &'a Path,
  pub source: ManifestSource,
  pub dry_run: bool,
}

/// Outcome of a tag run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagResult {
  pub ok: bool,
  pub dry_run: bool,
  /// Tags created by this run (or that would be, in a dry run)
  pub created: Vec<String>,
  /// Tags that already existed
  pub skipped: Vec<String>,
  /// Platform releases created
  pub releases: Vec<String>,
  pub pr_number: Option<u64>,
  /// Step name → what happened
  pub steps: BTreeMap<String, String>,
}

impl TagResult {
  fn step(&mut self, name: &str, detail: impl Into<String>) {
    let detail = detail.into();
    tracing::info!("{}: {}", name, detail);
    self.steps.insert(name.to_string(), detail);
  }
}

/// Find the manifest, create and push tags, create the platform release, swap labels
pub fn tag_release(ctx: TagContext<'_>) -> ReleaseResult<TagResult> {
  let mut result = TagResult {
    dry_run: ctx.dry_run,
    ..TagResult::default()
  };

  let _lock = if ctx.dry_run {
    None
  } else {
    Some(ReleaseLock::acquire(ctx.workspace_root)?)
  };

  let (manifest, pr) = find_manifest(&ctx)?;
  result.pr_number = pr.as_ref().map(|p| p.number);
  result.step(
    "find-manifest",
    match &pr {
      Some(pr) => format!("release PR #{} at {}", pr.number, manifest.git_sha),
      None => format!("manifest at {}", manifest.git_sha),
    },
  );

  let bumped = manifest.bumped();
  if bumped.is_empty() {
    result.step("tag-packages", "no bumped packages, nothing to tag");
    result.ok = true;
    return Ok(result);
  }

  let mut wanted: Vec<(String, String)> = bumped
    .iter()
    .map(|p| {
      (
        format_tag(&ctx.config.tag_format, &p.name, &p.new_version),
        format!("Release {} {}", p.name, p.new_version),
      )
    })
    .collect();
  let package_tags = wanted.len();
  if !manifest.umbrella_tag.is_empty() {
    wanted.push((manifest.umbrella_tag.clone(), format!("Release {}", manifest.umbrella_tag)));
  }

  create_tags(&ctx, &manifest, &wanted, &mut result)?;
  let created_packages = result.created.iter().filter(|t| **t != manifest.umbrella_tag).count();
  result.step(
    "tag-packages",
    format!("{} created, {} already present", created_packages, package_tags - created_packages),
  );
  if !manifest.umbrella_tag.is_empty() {
    let umbrella = if result.created.contains(&manifest.umbrella_tag) {
      "created"
    } else {
      "already present"
    };
    result.step("tag-umbrella", format!("{} {}", manifest.umbrella_tag, umbrella));
  }

  push_tags(&ctx, &mut result)?;

  let released = platform::create_release(&ctx, &manifest, &mut result);
  if released {
    platform::swap_labels(&ctx, pr.as_ref(), &mut result);
  }
  result.ok = released;
  Ok(result)
}

fn find_manifest(ctx: &TagContext<'_>) -> ReleaseResult<(ReleaseManifest, Option<PullRequest>)> {
  match &ctx.source {
    ManifestSource::File(path) => Ok((ReleaseManifest::load(path)?, None)),
    ManifestSource::PullRequest => {
      let forge = ctx.forge.ok_or_else(|| {
        ReleaseError::coded(ErrorCode::TagNoReleasePr, "no forge configured to look up the release PR")
      })?;
      let filter = PrFilter {
        label: Some(ctx.config.labels.pending.clone()),
        state: PrState::Merged,
        base: Some(ctx.config.release_branch.clone()),
        limit: 20,
      };
      let pr = forge
        .list_prs(&filter)?
        .into_iter()
        .filter(|pr| pr.merged_at.is_some())
        .max_by(|a, b| a.merged_at.cmp(&b.merged_at))
        .ok_or_else(|| {
          ReleaseError::coded(
            ErrorCode::TagNoReleasePr,
            format!(
              "no merged PR labelled '{}' on {}",
              ctx.config.labels.pending, ctx.config.release_branch
            ),
          )
        })?;
      let manifest = extract_from_pr_body(&pr.body)?;
      Ok((manifest, Some(pr)))
    }
  }
}

fn create_tags(
  ctx: &TagContext<'_>,
  manifest: &ReleaseManifest,
  wanted: &[(String, String)],
  result: &mut TagResult,
) -> ReleaseResult<()> {
  for (tag, message) in wanted {
    if ctx.vcs.tag_exists(tag)? {
      tracing::info!("tag {} already exists, skipping", tag);
      result.skipped.push(tag.clone());
      continue;
    }
    if ctx.dry_run {
      tracing::info!("[dry-run] would create tag {} at {}", tag, manifest.git_sha);
      result.created.push(tag.clone());
      continue;
    }
    if let Err(err) = ctx.vcs.tag(tag, message, Some(&manifest.git_sha)) {
      rollback(ctx.vcs, &result.created);
      result.created.clear();
      return Err(err);
    }
    result.created.push(tag.clone());
  }
  Ok(())
}

fn push_tags(ctx: &TagContext<'_>, result: &mut TagResult) -> ReleaseResult<()> {
  if result.created.is_empty() {
    result.step("push-tags", "nothing to push");
    return Ok(());
  }
  if ctx.dry_run {
    result.step("push-tags", format!("[dry-run] would push {} tag(s)", result.created.len()));
    return Ok(());
  }
  if let Err(err) = ctx.vcs.push(true) {
    rollback(ctx.vcs, &result.created);
    result.created.clear();
    return Err(err);
  }
  result.step("push-tags", format!("pushed {} tag(s)", result.created.len()));
  Ok(())
}

/// Delete tags created by this run; failures are logged, the original error wins
fn rollback(vcs: &dyn Vcs, created: &[String]) {
  for tag in created.iter().rev() {
    match vcs.delete_tag(tag, false) {
      Ok(()) => tracing::warn!("rolled back tag {}", tag),
      Err(err) => tracing::warn!("failed to roll back tag {}: {}", tag, err),
    }
  }
}
