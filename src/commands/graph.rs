//! `releasekit graph` - Show dependency levels and cycles

use crate::core::context::WorkspaceContext;
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use crate::graph::{detect_cycles, format_cycles, topo_levels};

/// Output format for the graph command
#[derive(Debug, Clone, Copy)]
enum OutputFormat {
  Text,
  Json,
  Dot,
}

impl OutputFormat {
  fn from_str(s: &str) -> ReleaseResult<Self> {
    match s.to_lowercase().as_str() {
      "text" => Ok(Self::Text),
      "json" => Ok(Self::Json),
      "dot" => Ok(Self::Dot),
      _ => Err(ReleaseError::message(format!(
        "Unknown format '{}'. Valid formats: text, json, dot",
        s
      ))),
    }
  }
}

/// Run the graph command
pub fn run_graph(ctx: &WorkspaceContext, format: String) -> ReleaseResult<()> {
  let format = OutputFormat::from_str(&format)?;

  if let OutputFormat::Dot = format {
    print!("{}", ctx.graph.to_dot());
    return Ok(());
  }

  let cycles = detect_cycles(&ctx.graph);
  if !cycles.is_empty() {
    return Err(ReleaseError::coded(
      ErrorCode::GraphCycle,
      format!("dependency cycles: {}", format_cycles(&cycles)),
    ));
  }
  let levels = topo_levels(&ctx.graph)?;

  match format {
    OutputFormat::Json => {
      let value = serde_json::json!({
        "levels": levels,
        "edges": ctx.graph.edges(),
      });
      println!("{}", serde_json::to_string_pretty(&value)?);
    }
    _ => {
      println!("Dependency levels ({} packages)", ctx.graph.len());
      println!("================");
      for (i, level) in levels.iter().enumerate() {
        println!("Level {}: {}", i, level.join(", "));
      }
    }
  }
  Ok(())
}
