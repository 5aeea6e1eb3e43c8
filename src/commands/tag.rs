//! `releasekit tag` - Tag a merged release
//!
//! The binary ships no forge client, so the manifest comes from a file and
//! the platform-release and label steps are skipped.

use crate::backends::git::SystemGit;
use crate::core::context::WorkspaceContext;
use crate::core::error::{ExitCode, ReleaseResult};
use crate::tag::{ManifestSource, TagContext, tag_release};
use std::path::PathBuf;

/// Run the tag command
pub fn run_tag(ctx: &WorkspaceContext, manifest: PathBuf, dry_run: bool, json: bool) -> ReleaseResult<()> {
  let git = SystemGit::open(ctx.workspace_root())?;
  let result = tag_release(TagContext {
    vcs: &git,
    forge: None,
    config: &ctx.config,
    workspace_root: ctx.workspace_root(),
    source: ManifestSource::File(manifest),
    dry_run,
  })?;

  if json {
    println!("{}", serde_json::to_string_pretty(&result)?);
  } else {
    let prefix = if dry_run { "DRY RUN: " } else { "" };
    for (step, detail) in &result.steps {
      println!("{}{:<24} {}", prefix, step, detail);
    }
    for tag in &result.created {
      println!("  + {}", tag);
    }
    for tag in &result.skipped {
      println!("  = {} (exists)", tag);
    }
  }

  if !result.ok {
    std::process::exit(ExitCode::System.as_i32());
  }
  Ok(())
}
