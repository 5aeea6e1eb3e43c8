//! Conventional-commit classification
//!
//! | Message                                         | Bump  |
//! |-------------------------------------------------|-------|
//! | `<type>!:` or `BREAKING CHANGE:` footer         | major |
//! | `feat`                                          | minor |
//! | `fix`, `perf`, `revert`                         | patch |
//! | `docs`, `chore`, `ci`, `test`, `style`, `build`, `refactor`, other | none |

use super::bump::VersionBump;
use crate::backends::Commit;
use regex::Regex;
use std::sync::LazyLock;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(?P<type>[A-Za-z]+)(?:\((?P<scope>[^)]*)\))?(?P<bang>!)?:\s*(?P<description>.*)$").expect("valid regex")
});

static BREAKING_FOOTER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^BREAKING[ -]CHANGE:").expect("valid regex"));

/// A parsed conventional-commit header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalCommit {
  pub kind: String,
  pub scope: Option<String>,
  pub description: String,
  pub breaking: bool,
}

impl ConventionalCommit {
  /// Parse a full commit message; `None` for non-conventional messages
  pub fn parse(message: &str) -> Option<Self> {
    let header = message.lines().next().unwrap_or("").trim();
    let caps = HEADER.captures(header)?;
    Some(Self {
      kind: caps["type"].to_lowercase(),
      scope: caps.name("scope").map(|m| m.as_str().to_string()),
      description: caps["description"].to_string(),
      breaking: caps.name("bang").is_some() || BREAKING_FOOTER.is_match(message),
    })
  }

  pub fn bump(&self) -> VersionBump {
    if self.breaking {
      return VersionBump::Major;
    }
    match self.kind.as_str() {
      "feat" => VersionBump::Minor,
      "fix" | "perf" | "revert" => VersionBump::Patch,
      _ => VersionBump::None,
    }
  }
}

/// Bump implied by a single commit message
pub fn bump_for_message(message: &str) -> VersionBump {
  ConventionalCommit::parse(message).map_or(VersionBump::None, |c| c.bump())
}

/// Highest bump across commits
pub fn bump_for_commits(commits: &[Commit]) -> VersionBump {
  commits
    .iter()
    .map(|c| bump_for_message(&c.message()))
    .max()
    .unwrap_or(VersionBump::None)
}
