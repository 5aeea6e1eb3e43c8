//! Error types for releasekit with stable codes, hints and exit codes
//!
//! Every recoverable failure in the release pipeline is described by an
//! [`ErrorInfo`]: a stable [`ErrorCode`] (rendered as `RK-<AREA>-<REASON>`),
//! a message, and a hint telling the user what to do next. The same codes are
//! used for preflight findings, so a CI log can be grepped for one code
//! regardless of which stage produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Exit codes for releasekit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, network, I/O)
  System = 2,
  /// Validation failure (preflight blocked, checks failed)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Stable error/warning codes, grouped by pipeline area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ErrorCode {
  ConfigNotFound,
  ConfigInvalid,
  WorkspaceNotFound,
  WorkspaceParse,
  WorkspaceNoPackages,
  WorkspaceVersionMissing,
  WorkspaceDependencyMissing,
  GraphCycle,
  GraphSelfDependency,
  GraphOrphanDependency,
  GraphUnknownPackage,
  VersionInvalid,
  VersionNoTag,
  PreflightDirtyWorktree,
  PreflightLockfileStale,
  PreflightShallowClone,
  PreflightForgeUnavailable,
  PreflightStaleArtifacts,
  PreflightVersionConflict,
  PreflightMissingFile,
  PreflightMissingTypes,
  PreflightVersionMismatch,
  PreflightNaming,
  PreflightMetadata,
  BuildFailed,
  PublishFailed,
  PublishTimeout,
  PublishChecksum,
  TagNoReleasePr,
  TagManifestInvalid,
  TagMissingSha,
  TagCreateFailed,
  TagPushFailed,
  SecurityLongLivedToken,
  StateLocked,
  StateLockIo,
}

impl ErrorCode {
  /// All codes, in declaration order.
  pub const ALL: &'static [ErrorCode] = &[
    ErrorCode::ConfigNotFound,
    ErrorCode::ConfigInvalid,
    ErrorCode::WorkspaceNotFound,
    ErrorCode::WorkspaceParse,
    ErrorCode::WorkspaceNoPackages,
    ErrorCode::WorkspaceVersionMissing,
    ErrorCode::WorkspaceDependencyMissing,
    ErrorCode::GraphCycle,
    ErrorCode::GraphSelfDependency,
    ErrorCode::GraphOrphanDependency,
    ErrorCode::GraphUnknownPackage,
    ErrorCode::VersionInvalid,
    ErrorCode::VersionNoTag,
    ErrorCode::PreflightDirtyWorktree,
    ErrorCode::PreflightLockfileStale,
    ErrorCode::PreflightShallowClone,
    ErrorCode::PreflightForgeUnavailable,
    ErrorCode::PreflightStaleArtifacts,
    ErrorCode::PreflightVersionConflict,
    ErrorCode::PreflightMissingFile,
    ErrorCode::PreflightMissingTypes,
    ErrorCode::PreflightVersionMismatch,
    ErrorCode::PreflightNaming,
    ErrorCode::PreflightMetadata,
    ErrorCode::BuildFailed,
    ErrorCode::PublishFailed,
    ErrorCode::PublishTimeout,
    ErrorCode::PublishChecksum,
    ErrorCode::TagNoReleasePr,
    ErrorCode::TagManifestInvalid,
    ErrorCode::TagMissingSha,
    ErrorCode::TagCreateFailed,
    ErrorCode::TagPushFailed,
    ErrorCode::SecurityLongLivedToken,
    ErrorCode::StateLocked,
    ErrorCode::StateLockIo,
  ];

  /// The stable string form, e.g. `RK-GRAPH-CYCLE`.
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorCode::ConfigNotFound => "RK-CONFIG-NOT-FOUND",
      ErrorCode::ConfigInvalid => "RK-CONFIG-INVALID",
      ErrorCode::WorkspaceNotFound => "RK-WORKSPACE-NOT-FOUND",
      ErrorCode::WorkspaceParse => "RK-WORKSPACE-PARSE",
      ErrorCode::WorkspaceNoPackages => "RK-WORKSPACE-NO-PACKAGES",
      ErrorCode::WorkspaceVersionMissing => "RK-WORKSPACE-VERSION-MISSING",
      ErrorCode::WorkspaceDependencyMissing => "RK-WORKSPACE-DEPENDENCY-MISSING",
      ErrorCode::GraphCycle => "RK-GRAPH-CYCLE",
      ErrorCode::GraphSelfDependency => "RK-GRAPH-SELF-DEPENDENCY",
      ErrorCode::GraphOrphanDependency => "RK-GRAPH-ORPHAN-DEPENDENCY",
      ErrorCode::GraphUnknownPackage => "RK-GRAPH-UNKNOWN-PACKAGE",
      ErrorCode::VersionInvalid => "RK-VERSION-INVALID",
      ErrorCode::VersionNoTag => "RK-VERSION-NO-TAG",
      ErrorCode::PreflightDirtyWorktree => "RK-PREFLIGHT-DIRTY-WORKTREE",
      ErrorCode::PreflightLockfileStale => "RK-PREFLIGHT-LOCKFILE-STALE",
      ErrorCode::PreflightShallowClone => "RK-PREFLIGHT-SHALLOW-CLONE",
      ErrorCode::PreflightForgeUnavailable => "RK-PREFLIGHT-FORGE-UNAVAILABLE",
      ErrorCode::PreflightStaleArtifacts => "RK-PREFLIGHT-STALE-ARTIFACTS",
      ErrorCode::PreflightVersionConflict => "RK-PREFLIGHT-VERSION-CONFLICT",
      ErrorCode::PreflightMissingFile => "RK-PREFLIGHT-MISSING-FILE",
      ErrorCode::PreflightMissingTypes => "RK-PREFLIGHT-MISSING-TYPES",
      ErrorCode::PreflightVersionMismatch => "RK-PREFLIGHT-VERSION-MISMATCH",
      ErrorCode::PreflightNaming => "RK-PREFLIGHT-NAMING",
      ErrorCode::PreflightMetadata => "RK-PREFLIGHT-METADATA",
      ErrorCode::BuildFailed => "RK-BUILD-FAILED",
      ErrorCode::PublishFailed => "RK-PUBLISH-FAILED",
      ErrorCode::PublishTimeout => "RK-PUBLISH-TIMEOUT",
      ErrorCode::PublishChecksum => "RK-PUBLISH-CHECKSUM-MISMATCH",
      ErrorCode::TagNoReleasePr => "RK-TAG-NO-RELEASE-PR",
      ErrorCode::TagManifestInvalid => "RK-TAG-MANIFEST-INVALID",
      ErrorCode::TagMissingSha => "RK-TAG-MISSING-SHA",
      ErrorCode::TagCreateFailed => "RK-TAG-CREATE-FAILED",
      ErrorCode::TagPushFailed => "RK-TAG-PUSH-FAILED",
      ErrorCode::SecurityLongLivedToken => "RK-SECURITY-LONG-LIVED-TOKEN",
      ErrorCode::StateLocked => "RK-STATE-LOCKED",
      ErrorCode::StateLockIo => "RK-STATE-LOCK-IO",
    }
  }

  /// Default remediation hint. Never empty.
  pub fn hint(self) -> &'static str {
    match self {
      ErrorCode::ConfigNotFound => "Create releasekit.toml at the workspace root, or run without one to use defaults.",
      ErrorCode::ConfigInvalid => "Fix the reported field in releasekit.toml.",
      ErrorCode::WorkspaceNotFound => "Run releasekit from the workspace root (the directory holding the root manifest).",
      ErrorCode::WorkspaceParse => "Check the manifest syntax; releasekit skips manifests it cannot parse.",
      ErrorCode::WorkspaceNoPackages => "Check the workspace member globs and the `exclude` list in releasekit.toml.",
      ErrorCode::WorkspaceVersionMissing => "Add a static version to the manifest or to the workspace root.",
      ErrorCode::WorkspaceDependencyMissing => "Add the dependency to the manifest before rewriting its version.",
      ErrorCode::GraphCycle => "Break the cycle by moving shared code into a new leaf package.",
      ErrorCode::GraphSelfDependency => "Remove the package from its own dependency list.",
      ErrorCode::GraphOrphanDependency => "Publish the dependency too, or stop depending on it from publishable packages.",
      ErrorCode::GraphUnknownPackage => "Check the package name against `releasekit discover`.",
      ErrorCode::VersionInvalid => "Use a semver version such as 1.2.3.",
      ErrorCode::VersionNoTag => "Create a baseline tag (e.g. `name-v0.1.0`) or accept a first release.",
      ErrorCode::PreflightDirtyWorktree => "Commit or stash local changes before releasing.",
      ErrorCode::PreflightLockfileStale => "Regenerate the lockfile (e.g. `uv lock`, `cargo update -w`) and commit it.",
      ErrorCode::PreflightShallowClone => "Fetch full history (`git fetch --unshallow`) so tags and commit ranges resolve.",
      ErrorCode::PreflightForgeUnavailable => "Install and authenticate the forge CLI (gh/glab) to enable releases and labels.",
      ErrorCode::PreflightStaleArtifacts => "Delete the listed dist/ directories before building.",
      ErrorCode::PreflightVersionConflict => "Bump past the published version, or pass --skip-version-check for re-runs.",
      ErrorCode::PreflightMissingFile => "Add the missing LICENSE/README file to the package directory.",
      ErrorCode::PreflightMissingTypes => "Ship a type marker (py.typed, or a `types` entry in package.json).",
      ErrorCode::PreflightVersionMismatch => "Align plugin versions with the core package version.",
      ErrorCode::PreflightNaming => "Rename the directory to match the package name.",
      ErrorCode::PreflightMetadata => "Fill in description, license and repository in the manifest.",
      ErrorCode::BuildFailed => "Run the build locally and fix the reported errors.",
      ErrorCode::PublishFailed => "Inspect the registry response; re-run with --skip-version-check once fixed.",
      ErrorCode::PublishTimeout => "The registry may be slow; increase poll_timeout_secs in releasekit.toml.",
      ErrorCode::PublishChecksum => "Rebuild from a clean tree and republish under a new version.",
      ErrorCode::TagNoReleasePr => "Merge the release PR labelled `autorelease: pending`, or pass --manifest.",
      ErrorCode::TagManifestInvalid => "Restore the manifest block between the releasekit markers in the PR body.",
      ErrorCode::TagMissingSha => "Regenerate the release PR so the manifest records the planned commit.",
      ErrorCode::TagCreateFailed => "Check repository permissions; tags created in this run were rolled back.",
      ErrorCode::TagPushFailed => "Check push permissions for tags on the remote.",
      ErrorCode::SecurityLongLivedToken => "Configure trusted publishing (OIDC) and drop the long-lived token.",
      ErrorCode::StateLocked => "Wait for the other release run to finish, or delete .releasekit.lock if it is stale.",
      ErrorCode::StateLockIo => "Check write permissions on the workspace root.",
    }
  }

  /// Exit code used when this error terminates the process.
  pub fn exit_code(self) -> ExitCode {
    match self {
      ErrorCode::ConfigNotFound
      | ErrorCode::ConfigInvalid
      | ErrorCode::WorkspaceNotFound
      | ErrorCode::GraphUnknownPackage
      | ErrorCode::VersionInvalid
      | ErrorCode::TagNoReleasePr
      | ErrorCode::TagManifestInvalid
      | ErrorCode::TagMissingSha => ExitCode::User,
      ErrorCode::StateLockIo
      | ErrorCode::BuildFailed
      | ErrorCode::PublishFailed
      | ErrorCode::PublishTimeout
      | ErrorCode::TagCreateFailed
      | ErrorCode::TagPushFailed => ExitCode::System,
      _ => ExitCode::Validation,
    }
  }
}

impl fmt::Display for ErrorCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<ErrorCode> for String {
  fn from(code: ErrorCode) -> Self {
    code.as_str().to_string()
  }
}

impl TryFrom<String> for ErrorCode {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    ErrorCode::ALL
      .iter()
      .copied()
      .find(|code| code.as_str() == value)
      .ok_or_else(|| format!("unknown error code '{}'", value))
  }
}

/// One coded error or warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
  pub code: ErrorCode,
  pub message: String,
  pub hint: String,
}

impl ErrorInfo {
  /// Create an error with the code's default hint
  pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
    Self {
      code,
      message: message.into(),
      hint: code.hint().to_string(),
    }
  }

  /// Replace the default hint
  pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
    self.hint = hint.into();
    self
  }
}

impl fmt::Display for ErrorInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}] {}", self.code, self.message)
  }
}

/// Diagnostic severity for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
  Error,
  Warning,
}

/// Render an error in compiler-diagnostic style:
///
/// ```text
/// error[RK-GRAPH-CYCLE]: dependency cycle: a -> b -> a
///   = hint: Break the cycle by moving shared code into a new leaf package.
/// ```
pub fn render_diagnostic(level: Level, info: &ErrorInfo) -> String {
  let label = match level {
    Level::Error => "error",
    Level::Warning => "warning",
  };
  let mut out = format!("{}[{}]: {}", label, info.code, info.message);
  if !info.hint.is_empty() {
    out.push_str(&format!("\n  = hint: {}", info.hint));
  }
  out
}

/// Main error type for releasekit
#[derive(Debug)]
pub enum ReleaseError {
  /// A catalogued error with code and hint
  Coded(ErrorInfo),

  /// A blocking preflight step failed; later steps did not run
  Blocked {
    check: String,
    info: ErrorInfo,
    result: Box<crate::checks::PreflightResult>,
  },

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ReleaseError {
  /// Create a coded error with the default hint
  pub fn coded(code: ErrorCode, msg: impl Into<String>) -> Self {
    ReleaseError::Coded(ErrorInfo::new(code, msg))
  }

  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ReleaseError::Message { message, context, help } => ReleaseError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ReleaseError::Coded(mut info) => {
        info.message = format!("{}: {}", ctx_str, info.message);
        ReleaseError::Coded(info)
      }
      ReleaseError::Io(err) => ReleaseError::Message {
        message: format!("I/O error: {}", err),
        context: Some(ctx_str),
        help: None,
      },
      other => other,
    }
  }

  /// The error code, when this error is catalogued
  pub fn code(&self) -> Option<ErrorCode> {
    match self {
      ReleaseError::Coded(info) | ReleaseError::Blocked { info, .. } => Some(info.code),
      _ => None,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ReleaseError::Coded(info) => info.code.exit_code(),
      ReleaseError::Blocked { .. } => ExitCode::Validation,
      ReleaseError::Io(_) => ExitCode::System,
      ReleaseError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::Coded(info) | ReleaseError::Blocked { info, .. } => Some(info.hint.clone()),
      ReleaseError::Message { help, .. } => help.clone(),
      ReleaseError::Io(_) => None,
    }
  }

  /// Convert into an `ErrorInfo`, assigning `fallback` to uncatalogued errors
  pub fn into_info(self, fallback: ErrorCode) -> ErrorInfo {
    match self {
      ReleaseError::Coded(info) | ReleaseError::Blocked { info, .. } => info,
      other => ErrorInfo::new(fallback, other.to_string()),
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::Coded(info) => write!(f, "{}", info),
      ReleaseError::Blocked { check, info, .. } => {
        write!(f, "preflight check '{}' failed: {}", check, info)
      }
      ReleaseError::Io(e) => write!(f, "I/O error: {}", e),
      ReleaseError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ReleaseError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReleaseError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<ErrorInfo> for ReleaseError {
  fn from(info: ErrorInfo) -> Self {
    ReleaseError::Coded(info)
  }
}

impl From<io::Error> for ReleaseError {
  fn from(err: io::Error) -> Self {
    ReleaseError::Io(err)
  }
}

impl From<String> for ReleaseError {
  fn from(msg: String) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<&str> for ReleaseError {
  fn from(msg: &str) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<toml_edit::TomlError> for ReleaseError {
  fn from(err: toml_edit::TomlError) -> Self {
    ReleaseError::coded(ErrorCode::WorkspaceParse, format!("TOML parse error: {}", err))
  }
}

impl From<toml_edit::de::Error> for ReleaseError {
  fn from(err: toml_edit::de::Error) -> Self {
    ReleaseError::coded(ErrorCode::ConfigInvalid, format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for ReleaseError {
  fn from(err: serde_json::Error) -> Self {
    ReleaseError::message(format!("JSON error: {}", err))
  }
}

impl From<semver::Error> for ReleaseError {
  fn from(err: semver::Error) -> Self {
    ReleaseError::coded(ErrorCode::VersionInvalid, format!("invalid version: {}", err))
  }
}

impl From<glob::PatternError> for ReleaseError {
  fn from(err: glob::PatternError) -> Self {
    ReleaseError::coded(ErrorCode::ConfigInvalid, format!("invalid glob pattern: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for ReleaseError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    ReleaseError::message(format!("UTF-8 error: {}", err))
  }
}

/// Result type alias for releasekit
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReleaseError>,
{
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Print an error to stderr in diagnostic form
pub fn print_error(error: &ReleaseError) {
  match error {
    ReleaseError::Coded(info) => eprintln!("{}", render_diagnostic(Level::Error, info)),
    ReleaseError::Blocked { check, info, result } => {
      for warning in &result.warnings {
        eprintln!("{}", warning.render(Level::Warning));
      }
      eprintln!("{}", render_diagnostic(Level::Error, info));
      eprintln!("  = note: preflight stopped at '{}'", check);
    }
    other => {
      eprintln!("error: {}", other);
      if let Some(help) = other.help_message() {
        eprintln!("  = hint: {}", help);
      }
    }
  }
}

/// Convert anyhow::Error to ReleaseError
impl From<anyhow::Error> for ReleaseError {
  fn from(err: anyhow::Error) -> Self {
    ReleaseError::message(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_code_has_prefix_and_hint() {
    for code in ErrorCode::ALL {
      assert!(code.as_str().starts_with("RK-"), "{:?}", code);
      assert!(!code.hint().is_empty(), "{:?} has no hint", code);
    }
  }

  #[test]
  fn test_code_strings_are_unique() {
    let mut seen = std::collections::HashSet::new();
    for code in ErrorCode::ALL {
      assert!(seen.insert(code.as_str()), "duplicate code {}", code);
    }
  }

  #[test]
  fn test_code_serde_uses_string_form() {
    let json = serde_json::to_string(&ErrorCode::GraphCycle).unwrap();
    assert_eq!(json, "\"RK-GRAPH-CYCLE\"");
    let back: ErrorCode = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ErrorCode::GraphCycle);
    assert!(serde_json::from_str::<ErrorCode>("\"RK-NOPE\"").is_err());
  }

  #[test]
  fn test_render_diagnostic() {
    let info = ErrorInfo::new(ErrorCode::GraphCycle, "dependency cycle: a -> b -> a");
    let rendered = render_diagnostic(Level::Error, &info);
    let mut lines = rendered.lines();
    assert_eq!(lines.next(), Some("error[RK-GRAPH-CYCLE]: dependency cycle: a -> b -> a"));
    assert!(lines.next().unwrap().starts_with("  = hint: "));
  }

  #[test]
  fn test_context_prefixes_coded_message() {
    let err = ReleaseError::coded(ErrorCode::WorkspaceParse, "bad toml").context("Cargo.toml");
    assert_eq!(err.code(), Some(ErrorCode::WorkspaceParse));
    assert_eq!(err.to_string(), "[RK-WORKSPACE-PARSE] Cargo.toml: bad toml");
  }

  #[test]
  fn test_exit_codes() {
    assert_eq!(ReleaseError::coded(ErrorCode::ConfigInvalid, "x").exit_code(), ExitCode::User);
    assert_eq!(ReleaseError::coded(ErrorCode::TagPushFailed, "x").exit_code(), ExitCode::System);
    assert_eq!(ReleaseError::coded(ErrorCode::GraphCycle, "x").exit_code(), ExitCode::Validation);
  }
}
