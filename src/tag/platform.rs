//! Forge-side steps of a tag run: platform release and label swap
//!
//! Each step checks the forge's capabilities first. A missing capability (or
//! no forge at all) is logged and the step is skipped.

use super::{TagContext, TagResult};
use crate::backends::{Forge, PullRequest, ReleaseRequest};
use crate::core::config::format_tag;
use crate::version::ReleaseManifest;
use std::collections::BTreeMap;

/// How many recent releases are checked for ones left by an earlier run
const RELEASE_LOOKUP_LIMIT: usize = 100;

/// Markdown release notes listing every bumped package
pub fn release_notes(manifest: &ReleaseManifest) -> String {
  let mut body = String::from("## Packages\n\n");
  for package in manifest.bumped() {
    body.push_str(&format!(
      "- **{}** {} → {} ({})\n",
      package.name, package.old_version, package.new_version, package.bump
    ));
  }
  body.push_str(&format!("\nCommit: `{}`\n", manifest.git_sha));
  body
}

/// Tags that get a platform release: the umbrella tag when there is one,
/// otherwise each bumped package's tag
///
/// Derived from the manifest, not from what this run created, so a re-run
/// after a failed release still targets the same tags.
fn release_tags(ctx: &TagContext<'_>, manifest: &ReleaseManifest) -> Vec<String> {
  if manifest.umbrella_tag.is_empty() {
    manifest
      .bumped()
      .iter()
      .map(|p| format_tag(&ctx.config.tag_format, &p.name, &p.new_version))
      .collect()
  } else {
    vec![manifest.umbrella_tag.clone()]
  }
}

fn is_prerelease(tag: &str) -> bool {
  let parses_as_pre = |s: &str| semver::Version::parse(s).is_ok_and(|v| !v.pre.is_empty());
  parses_as_pre(tag) || tag.match_indices('v').any(|(i, _)| parses_as_pre(&tag[i + 1..]))
}

/// Returns false when a release could not be created
pub(super) fn create_release(ctx: &TagContext<'_>, manifest: &ReleaseManifest, result: &mut TagResult) -> bool {
  const STEP: &str = "create-platform-release";

  let Some(forge) = usable_forge(ctx.forge) else {
    result.step(STEP, "no forge available, skipping");
    return true;
  };
  let caps = forge.capabilities();
  if !caps.releases {
    result.step(STEP, format!("{} has no releases, skipping", forge.name()));
    return true;
  }

  let tags = release_tags(ctx, manifest);
  if tags.is_empty() {
    result.step(STEP, "no tags to release");
    return true;
  }

  // Tag → draft flag for releases left by earlier runs
  let existing: BTreeMap<String, bool> = match forge.list_releases(RELEASE_LOOKUP_LIMIT) {
    Ok(releases) => releases.into_iter().map(|r| (r.tag, r.draft)).collect(),
    Err(err) => {
      tracing::warn!("could not list {} releases: {}", forge.name(), err);
      BTreeMap::new()
    }
  };

  let body = release_notes(manifest);
  let mut present = 0;
  for tag in &tags {
    match existing.get(tag) {
      Some(false) => {
        tracing::info!("release {} already exists", tag);
        present += 1;
        continue;
      }
      Some(true) if caps.draft_releases => {
        if ctx.dry_run {
          tracing::info!("[dry-run] would publish draft release {}", tag);
        } else if let Err(err) = forge.publish_release(tag) {
          tracing::error!("failed to publish draft release {}: {}", tag, err);
          result.step(STEP, format!("failed for {}: {}", tag, err));
          return false;
        }
        result.releases.push(tag.clone());
        continue;
      }
      _ => {}
    }

    let request = ReleaseRequest {
      tag: tag.clone(),
      title: tag.clone(),
      body: body.clone(),
      draft: caps.draft_releases,
      prerelease: is_prerelease(tag),
    };
    if ctx.dry_run {
      tracing::info!("[dry-run] would create {} release {}", forge.name(), tag);
      result.releases.push(tag.clone());
      continue;
    }
    if !caps.draft_releases {
      tracing::info!("{} has no draft releases, publishing {} directly", forge.name(), tag);
    }
    let published = forge.create_release(&request).and_then(|info| {
      if caps.draft_releases {
        forge.publish_release(&info.tag)?;
      }
      Ok(info)
    });
    match published {
      Ok(info) => {
        tracing::info!("released {}{}", tag, info.url.map(|u| format!(" ({})", u)).unwrap_or_default());
        result.releases.push(tag.clone());
      }
      Err(err) => {
        tracing::error!("failed to create release {}: {}", tag, err);
        result.step(STEP, format!("failed for {}: {}", tag, err));
        return false;
      }
    }
  }
  result.step(
    STEP,
    format!(
      "{} release(s) on {}, {} already present",
      result.releases.len(),
      forge.name(),
      present
    ),
  );
  true
}

/// Move the release PR from the pending label to the tagged label
pub(super) fn swap_labels(ctx: &TagContext<'_>, pr: Option<&PullRequest>, result: &mut TagResult) {
  const STEP: &str = "swap-labels";

  let Some(pr) = pr else {
    result.step(STEP, "manifest not from a release PR, skipping");
    return;
  };
  let Some(forge) = usable_forge(ctx.forge) else {
    result.step(STEP, "no forge available, skipping");
    return;
  };
  if !forge.capabilities().labels {
    result.step(STEP, format!("{} has no labels, skipping", forge.name()));
    return;
  }

  let labels = &ctx.config.labels;
  if ctx.dry_run {
    result.step(
      STEP,
      format!("[dry-run] would relabel #{} '{}' → '{}'", pr.number, labels.pending, labels.tagged),
    );
    return;
  }
  // Add first: a failed swap still leaves the pending label for the next run
  let swapped = forge
    .add_labels(pr.number, std::slice::from_ref(&labels.tagged))
    .and_then(|()| forge.remove_labels(pr.number, std::slice::from_ref(&labels.pending)));
  match swapped {
    Ok(()) => result.step(STEP, format!("#{} '{}' → '{}'", pr.number, labels.pending, labels.tagged)),
    Err(err) => {
      tracing::warn!("label swap on #{} failed: {}", pr.number, err);
      result.step(STEP, format!("failed on #{}: {}", pr.number, err));
    }
  }
}

fn usable_forge<'a>(forge: Option<&'a dyn Forge>) -> Option<&'a dyn Forge> {
  let forge = forge?;
  if forge.is_available() {
    Some(forge)
  } else {
    tracing::warn!("{} is not available", forge.name());
    None
  }
}
