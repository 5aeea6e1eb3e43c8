//! `releasekit check` - Run the health-check catalogue
//!
//! Exits with the validation exit code when any check fails, or when any
//! check warns and `--strict` is set.

use crate::checks::{CheckOptions, run_checks};
use crate::core::context::WorkspaceContext;
use crate::core::error::{ExitCode, Level, ReleaseResult};

/// Run the check command
pub fn run_check(ctx: &WorkspaceContext, json: bool, strict: bool) -> ReleaseResult<()> {
  let options = CheckOptions::from_config(ctx.ecosystem(), ctx.workspace_root(), &ctx.config);
  let result = run_checks(&ctx.packages, &ctx.graph, &options);

  if json {
    println!("{}", serde_json::to_string_pretty(&result)?);
  } else {
    for name in &result.passed {
      println!("  ✓ {}", name);
    }
    for warning in &result.warnings {
      eprintln!("{}", warning.render(Level::Warning));
    }
    for failure in &result.failed {
      eprintln!("{}", failure.render(Level::Error));
    }
    println!();
    println!(
      "{} passed, {} warning(s), {} failed",
      result.passed.len(),
      result.warnings.len(),
      result.failed.len()
    );
  }

  if !result.ok() || (strict && !result.warnings.is_empty()) {
    std::process::exit(ExitCode::Validation.as_i32());
  }
  Ok(())
}
