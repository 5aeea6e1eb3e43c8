//! `releasekit plan` - Compute versions and render the execution plan
//!
//! Reads history since each package's last release tag, computes the next
//! versions and prints the plan. Optionally writes the release manifest, the
//! release PR body, and (with `--apply`) rewrites the manifests on disk.

use crate::backends::git::SystemGit;
use crate::backends::Vcs;
use crate::core::context::WorkspaceContext;
use crate::core::error::{ReleaseError, ReleaseResult};
use crate::graph::topo_levels;
use crate::plan::build_plan;
use crate::version::{
  VersionOptions, apply_versions, build_manifest, collect_commit_log, compute_versions, embed_in_pr_body,
  umbrella_tag,
};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Output format for the plan command
#[derive(Debug, Clone, Copy)]
enum OutputFormat {
  Table,
  Json,
  Csv,
  Flow,
}

impl OutputFormat {
  fn from_str(s: &str) -> ReleaseResult<Self> {
    match s.to_lowercase().as_str() {
      "table" | "text" => Ok(Self::Table),
      "json" => Ok(Self::Json),
      "csv" => Ok(Self::Csv),
      "flow" | "ascii" => Ok(Self::Flow),
      _ => Err(ReleaseError::message(format!(
        "Unknown format '{}'. Valid formats: table, json, csv, flow",
        s
      ))),
    }
  }
}

/// Options for the plan command
#[derive(Debug, Clone, Default)]
pub struct PlanArgs {
  pub format: String,
  /// Write the release manifest JSON here
  pub manifest_out: Option<PathBuf>,
  /// Print the release PR body (summary + embedded manifest)
  pub pr_body: bool,
  /// Rewrite manifests with the planned versions
  pub apply: bool,
}

/// Run the plan command
pub fn run_plan(ctx: &WorkspaceContext, args: PlanArgs) -> ReleaseResult<()> {
  let format = OutputFormat::from_str(&args.format)?;
  let git = SystemGit::open(ctx.workspace_root())?;

  let log = collect_commit_log(&git, &ctx.packages, &ctx.config.tag_format, ctx.workspace_root())?;
  let versions = compute_versions(&ctx.packages, &log, &VersionOptions::from_config(&ctx.config))?;
  let levels = topo_levels(&ctx.graph)?;
  let sha = git.head_sha()?;
  let plan = build_plan(&versions, &levels, &ctx.excluded_names(), &BTreeSet::new(), &sha);

  match format {
    OutputFormat::Table => print!("{}", plan.to_table()),
    OutputFormat::Json => println!("{}", plan.to_json()?),
    OutputFormat::Csv => print!("{}", plan.to_csv()),
    OutputFormat::Flow => print!("{}", plan.to_ascii_flow()),
  }

  if args.manifest_out.is_some() || args.pr_body {
    let umbrella = umbrella_tag(
      &versions,
      ctx.config.core_package.as_deref(),
      &ctx.config.umbrella_tag_format,
    )
    .unwrap_or_default();
    let manifest = build_manifest(&sha, versions.clone(), &umbrella, chrono::Utc::now());

    if let Some(path) = &args.manifest_out {
      manifest.save(path)?;
      eprintln!("Wrote release manifest to {}", path.display());
    }
    if args.pr_body {
      println!();
      println!("{}", embed_in_pr_body(&manifest)?);
    }
  }

  if args.apply {
    let touched = apply_versions(ctx.workspace.as_ref(), &ctx.packages, &versions, false)?;
    eprintln!("Updated {} manifest(s):", touched.len());
    for path in &touched {
      eprintln!("  {}", path.strip_prefix(&ctx.root).unwrap_or(path).display());
    }
  }

  Ok(())
}
