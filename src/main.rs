use clap::{Parser, Subcommand};
use releasekit::commands;
use releasekit::commands::plan::PlanArgs;
use releasekit::core::context::WorkspaceContext;
use releasekit::core::error::{ReleaseError, print_error};
use releasekit::workspace::Ecosystem;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Release orchestration for polyglot workspaces
#[derive(Parser)]
#[command(name = "releasekit")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Workspace root (default: current directory)
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Force an ecosystem instead of auto-detecting it
  #[arg(long, global = true)]
  ecosystem: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Inspection
  // ============================================================================
  /// List discovered packages
  Discover {
    /// Output packages in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Show dependency levels and cycles
  Graph {
    /// Output format: text (default), json, dot
    #[arg(long, default_value = "text")]
    format: String,
  },

  /// Run the health-check catalogue
  Check {
    /// Output results in JSON format
    #[arg(long)]
    json: bool,
    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
  },

  // ============================================================================
  // Release
  // ============================================================================
  /// Compute next versions and show the execution plan
  Plan {
    /// Output format: table (default), json, csv, flow
    #[arg(long, default_value = "table")]
    format: String,
    /// Write the release manifest JSON to this path
    #[arg(long)]
    manifest_out: Option<PathBuf>,
    /// Print the release PR body with the embedded manifest
    #[arg(long)]
    pr_body: bool,
    /// Rewrite manifests with the planned versions
    #[arg(long)]
    apply: bool,
  },

  /// Create and push release tags from a manifest
  Tag {
    /// Release manifest JSON
    #[arg(long)]
    manifest: PathBuf,
    /// Show what would happen without making changes
    #[arg(long)]
    dry_run: bool,
    /// Output the result in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Generate SBOM documents for a release manifest
  Sbom {
    /// Release manifest JSON
    #[arg(long)]
    manifest: PathBuf,
    /// Print one format (cyclonedx, spdx) to stdout instead of writing files
    #[arg(long)]
    format: Option<String>,
    /// Directory for sbom.cdx.json / sbom.spdx.json (default: dist/)
    #[arg(long)]
    out_dir: Option<PathBuf>,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

/// Log to stderr; `RELEASEKIT_LOG` takes an `EnvFilter` directive (default `info`)
fn init_tracing() {
  let filter = EnvFilter::try_from_env("RELEASEKIT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .init();
}

fn main() {
  init_tracing();
  let cli = Cli::parse();

  let workspace_root = match cli.root {
    Some(root) => root,
    None => match std::env::current_dir() {
      Ok(dir) => dir,
      Err(e) => handle_error(ReleaseError::from(e).context("Failed to get current directory")),
    },
  };

  let forced = match cli.ecosystem.as_deref().map(str::parse::<Ecosystem>).transpose() {
    Ok(forced) => forced,
    Err(e) => handle_error(e),
  };

  let ctx = match WorkspaceContext::build(&workspace_root, forced) {
    Ok(ctx) => ctx,
    Err(e) => handle_error(e),
  };

  let result = match cli.command {
    Commands::Discover { json } => commands::run_discover(&ctx, json),
    Commands::Graph { format } => commands::run_graph(&ctx, format),
    Commands::Check { json, strict } => commands::run_check(&ctx, json, strict),
    Commands::Plan {
      format,
      manifest_out,
      pr_body,
      apply,
    } => commands::run_plan(
      &ctx,
      PlanArgs {
        format,
        manifest_out,
        pr_body,
        apply,
      },
    ),
    Commands::Tag {
      manifest,
      dry_run,
      json,
    } => commands::run_tag(&ctx, manifest, dry_run, json),
    Commands::Sbom {
      manifest,
      format,
      out_dir,
    } => commands::run_sbom(&ctx, &manifest, format, out_dir),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: ReleaseError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
