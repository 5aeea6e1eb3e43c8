//! Check outcomes and the accumulated preflight result

use crate::core::error::{ErrorCode, ErrorInfo, Level, render_diagnostic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Source location a finding points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
  pub path: PathBuf,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line: Option<usize>,
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.line {
      Some(line) => write!(f, "{}:{}", self.path.display(), line),
      None => write!(f, "{}", self.path.display()),
    }
  }
}

/// One finding of a named check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
  /// Check name (kebab-case)
  pub name: String,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hint: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<Location>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<ErrorCode>,
}

impl CheckOutcome {
  pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      message: message.into(),
      hint: None,
      location: None,
      code: None,
    }
  }

  /// Attach an error code; its default hint is used unless a hint is set
  pub fn with_code(mut self, code: ErrorCode) -> Self {
    self.code = Some(code);
    self
  }

  pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
    self.hint = Some(hint.into());
    self
  }

  pub fn with_location(mut self, path: &Path, line: Option<usize>) -> Self {
    self.location = Some(Location {
      path: path.to_path_buf(),
      line,
    });
    self
  }

  fn effective_hint(&self) -> Option<String> {
    self
      .hint
      .clone()
      .or_else(|| self.code.map(|c| c.hint().to_string()))
  }

  /// Convert into an `ErrorInfo`, using `fallback` when uncoded
  pub fn to_info(&self, fallback: ErrorCode) -> ErrorInfo {
    let info = ErrorInfo::new(self.code.unwrap_or(fallback), self.message.clone());
    match &self.hint {
      Some(hint) => info.with_hint(hint.clone()),
      None => info,
    }
  }

  /// Render in compiler-diagnostic style
  pub fn render(&self, level: Level) -> String {
    let mut out = match self.code {
      Some(code) => {
        let mut info = ErrorInfo::new(code, format!("{}: {}", self.name, self.message));
        if let Some(hint) = self.effective_hint() {
          info = info.with_hint(hint);
        }
        render_diagnostic(level, &info)
      }
      None => {
        let label = match level {
          Level::Error => "error",
          Level::Warning => "warning",
        };
        let mut out = format!("{}: {}: {}", label, self.name, self.message);
        if let Some(hint) = &self.hint {
          out.push_str(&format!("\n  = hint: {}", hint));
        }
        out
      }
    };
    if let Some(location) = &self.location {
      out.push_str(&format!("\n  --> {}", location));
    }
    out
  }
}

/// Accumulated results of a check run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightResult {
  /// Names of checks that passed
  pub passed: Vec<String>,
  pub warnings: Vec<CheckOutcome>,
  pub failed: Vec<CheckOutcome>,
}

impl PreflightResult {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn pass(&mut self, name: impl Into<String>) {
    self.passed.push(name.into());
  }

  pub fn warn(&mut self, outcome: CheckOutcome) {
    tracing::warn!("{}: {}", outcome.name, outcome.message);
    self.warnings.push(outcome);
  }

  pub fn fail(&mut self, outcome: CheckOutcome) {
    tracing::debug!("{} failed: {}", outcome.name, outcome.message);
    self.failed.push(outcome);
  }

  /// No check failed
  pub fn ok(&self) -> bool {
    self.failed.is_empty()
  }

  /// Append another result, keeping order
  pub fn merge(&mut self, other: PreflightResult) {
    self.passed.extend(other.passed);
    self.warnings.extend(other.warnings);
    self.failed.extend(other.failed);
  }

  /// Failure messages keyed by check name
  pub fn errors(&self) -> BTreeMap<String, String> {
    keyed(&self.failed)
  }

  /// Warning messages keyed by check name
  pub fn warnings_map(&self) -> BTreeMap<String, String> {
    keyed(&self.warnings)
  }
}

/// Several findings of one check are joined with `; `
fn keyed(outcomes: &[CheckOutcome]) -> BTreeMap<String, String> {
  let mut map: BTreeMap<String, String> = BTreeMap::new();
  for outcome in outcomes {
    map
      .entry(outcome.name.clone())
      .and_modify(|m| {
        m.push_str("; ");
        m.push_str(&outcome.message);
      })
      .or_insert_with(|| outcome.message.clone());
  }
  map
}
