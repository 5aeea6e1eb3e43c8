//! `releasekit discover` - List workspace packages

use crate::core::context::WorkspaceContext;
use crate::core::error::ReleaseResult;

/// Run the discover command
pub fn run_discover(ctx: &WorkspaceContext, json: bool) -> ReleaseResult<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(&ctx.packages)?);
    return Ok(());
  }

  println!("{} workspace: {} package(s)", ctx.ecosystem(), ctx.packages.len());
  println!();
  let width = ctx.packages.iter().map(|p| p.name.len()).max().unwrap_or(0);
  for pkg in &ctx.packages {
    let publish = if pkg.is_publishable { "" } else { "  (private)" };
    println!(
      "  {:<width$}  {:<10}  {}{}",
      pkg.name,
      pkg.version,
      pkg.relative_path(&ctx.root).display(),
      publish,
      width = width
    );
    if !pkg.internal_deps.is_empty() {
      let deps: Vec<&str> = pkg.internal_deps.iter().map(String::as_str).collect();
      println!("  {:<width$}  └─ {}", "", deps.join(", "), width = width);
    }
  }
  Ok(())
}
