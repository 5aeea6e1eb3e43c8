//! Plan renderers; pure projections of an `ExecutionPlan`

use super::{ExecutionPlan, PlanEntry, PlanStatus};
use crate::core::error::ReleaseResult;

const HEADERS: [&str; 8] = ["#", "Package", "Level", "Current", "Next", "Bump", "Status", "Reason"];

fn row(entry: &PlanEntry) -> [String; 8] {
  [
    entry.order.to_string(),
    entry.name.clone(),
    entry.level.to_string(),
    entry.current_version.clone(),
    entry.next_version.clone(),
    entry.bump.to_string(),
    entry.status.to_string(),
    entry.reason.clone(),
  ]
}

fn csv_field(field: &str) -> String {
  if field.contains([',', '"', '\n']) {
    format!("\"{}\"", field.replace('"', "\"\""))
  } else {
    field.to_string()
  }
}

impl ExecutionPlan {
  /// Serialize to JSON
  pub fn to_json(&self) -> ReleaseResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Deserialize from JSON
  pub fn from_json(json: &str) -> ReleaseResult<Self> {
    Ok(serde_json::from_str(json)?)
  }

  /// Aligned text table
  pub fn to_table(&self) -> String {
    let rows: Vec<[String; 8]> = self.entries.iter().map(row).collect();
    let mut widths = HEADERS.map(str::len);
    for r in &rows {
      for (w, cell) in widths.iter_mut().zip(r.iter()) {
        *w = (*w).max(cell.chars().count());
      }
    }

    let line = |cells: &[String]| -> String {
      let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect();
      padded.join("  ").trim_end().to_string()
    };

    let mut out = format!("Plan {} @ {}\n", self.id(), short_sha(&self.git_sha));
    out.push_str(&line(&HEADERS.map(String::from)[..]));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for r in &rows {
      out.push_str(&line(&r[..]));
      out.push('\n');
    }

    let counts: Vec<String> = self.counts().iter().map(|(k, v)| format!("{} {}", v, k)).collect();
    if !counts.is_empty() {
      out.push_str(&format!("\n{}\n", counts.join(", ")));
    }
    out
  }

  /// RFC 4180 CSV with a header row
  pub fn to_csv(&self) -> String {
    let mut out = String::from("order,name,level,current_version,next_version,bump,status,reason\n");
    for entry in &self.entries {
      let fields = [
        entry.order.to_string(),
        entry.name.clone(),
        entry.level.to_string(),
        entry.current_version.clone(),
        entry.next_version.clone(),
        entry.bump.to_string(),
        entry.status.to_string(),
        entry.reason.clone(),
      ];
      let fields: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
      out.push_str(&fields.join(","));
      out.push('\n');
    }
    out
  }

  /// Level-by-level flow, publish order top to bottom
  ///
  /// ```text
  /// Level 0
  ///   ├─ core 1.0.0 → 1.1.0 [included]
  ///   └─ util [dependency_only]
  ///       │
  ///       ▼
  /// Level 1
  ///   └─ plugin 1.0.0 → 1.0.1 [included]
  /// ```
  pub fn to_ascii_flow(&self) -> String {
    let max_level = self.entries.iter().map(|e| e.level).max();
    let Some(max_level) = max_level else {
      return "(empty plan)\n".to_string();
    };

    let mut out = String::new();
    for level in 0..=max_level {
      let entries: Vec<&PlanEntry> = self.entries.iter().filter(|e| e.level == level).collect();
      if entries.is_empty() {
        continue;
      }
      if level > 0 {
        out.push_str("      │\n      ▼\n");
      }
      out.push_str(&format!("Level {}\n", level));
      for (i, entry) in entries.iter().enumerate() {
        let branch = if i + 1 == entries.len() { "└─" } else { "├─" };
        out.push_str(&format!("  {} {}\n", branch, flow_label(entry)));
      }
    }
    out
  }
}

fn flow_label(entry: &PlanEntry) -> String {
  let versions = match entry.status {
    PlanStatus::DependencyOnly => String::new(),
    PlanStatus::Included => format!(" {} → {}", entry.current_version, entry.next_version),
    _ => format!(" {}", entry.current_version),
  };
  format!("{}{} [{}]", entry.name, versions, entry.status)
}

fn short_sha(sha: &str) -> String {
  sha.chars().take(12).collect()
}

#[cfg(test)]
mod tests {
  use crate::plan::{ExecutionPlan, build_plan};
  use crate::version::{PackageVersion, VersionBump};
  use std::collections::BTreeSet;

  fn plan() -> ExecutionPlan {
    let versions = vec![
      PackageVersion {
        name: "core".to_string(),
        old_version: "1.0.0".to_string(),
        new_version: "1.1.0".to_string(),
        bump: VersionBump::Minor,
        skipped: false,
        reason: "feat, fix".to_string(),
      },
      PackageVersion {
        name: "plugin".to_string(),
        old_version: "1.0.0".to_string(),
        new_version: "1.0.1".to_string(),
        bump: VersionBump::Patch,
        skipped: false,
        reason: "dependency bumped: core".to_string(),
      },
    ];
    let levels = vec![
      vec!["core".to_string(), "util".to_string()],
      vec!["plugin".to_string()],
    ];
    build_plan(&versions, &levels, &BTreeSet::new(), &BTreeSet::new(), "0123456789abcdef")
  }

  #[test]
  fn test_table() {
    let table = plan().to_table();
    let lines: Vec<&str> = table.lines().collect();
    assert!(lines[0].starts_with("Plan "));
    assert!(lines[0].ends_with("@ 0123456789ab"));
    assert!(lines[1].starts_with("#  Package  Level  Current  Next"));
    assert!(table.contains("core     0      1.0.0    1.1.0  minor  included"));
    assert!(table.contains("1 dependency_only, 2 included"));
  }

  #[test]
  fn test_table_header_with_multibyte_sha() {
    let mut plan = plan();
    plan.git_sha = "ßßßßßßßßßßßßßß".to_string();
    let table = plan.to_table();
    assert!(table.lines().next().unwrap().ends_with("@ ßßßßßßßßßßßß"));
  }

  #[test]
  fn test_csv_quotes_fields() {
    let csv = plan().to_csv();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "order,name,level,current_version,next_version,bump,status,reason");
    assert_eq!(lines[1], "1,core,0,1.0.0,1.1.0,minor,included,\"feat, fix\"");
    assert_eq!(lines[2], "2,util,0,,,none,dependency_only,no planned version");
  }

  #[test]
  fn test_ascii_flow() {
    let flow = plan().to_ascii_flow();
    assert_eq!(
      flow,
      "Level 0\n  ├─ core 1.0.0 → 1.1.0 [included]\n  └─ util [dependency_only]\n      │\n      ▼\nLevel 1\n  └─ plugin 1.0.0 → 1.0.1 [included]\n"
    );
  }

  #[test]
  fn test_json_round_trip() {
    let plan = plan();
    let json = plan.to_json().unwrap();
    assert_eq!(ExecutionPlan::from_json(&json).unwrap(), plan);
    assert!(json.contains("\"status\": \"dependency_only\""));
  }
}
