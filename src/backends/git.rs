//! System git backend
//!
//! Shells out to the `git` binary with an isolated environment. Every
//! operation is a single subprocess call; nothing is cached between calls.

use super::{Commit, Vcs};
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Field and record separators for `git log` parsing
const FIELD_SEP: &str = "\x1f";
const RECORD_SEP: &str = "\x1e";

/// [`Vcs`] implementation backed by system git
pub struct SystemGit {
  /// Repository working directory
  repo_path: PathBuf,

  /// Working tree root
  work_tree: PathBuf,

  /// Remote used for pushes and tag deletion
  remote: String,
}

impl SystemGit {
  /// Open a git repository
  pub fn open(path: &Path) -> ReleaseResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ReleaseError::with_help(
        format!("{} is not a git repository: {}", path.display(), stderr.trim()),
        "run releasekit from inside a git checkout",
      ));
    }

    let work_tree = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(Self {
      repo_path: path.to_path_buf(),
      work_tree: PathBuf::from(work_tree),
      remote: "origin".to_string(),
    })
  }

  /// Use a remote other than `origin`
  pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
    self.remote = remote.into();
    self
  }

  pub fn work_tree(&self) -> &Path {
    &self.work_tree
  }

  /// Create a git command with an isolated environment
  ///
  /// Only PATH and HOME survive `env_clear`, plus the credential variables CI
  /// needs for pushes.
  fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(&self.repo_path);

    cmd.env_clear();
    for var in ["PATH", "HOME", "GIT_ASKPASS", "SSH_AUTH_SOCK", "GIT_SSH_COMMAND"] {
      if let Ok(value) = std::env::var(var) {
        cmd.env(var, value);
      }
    }

    cmd.arg("-c").arg("protocol.version=2");
    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false");

    cmd
  }

  /// Run git with `args`, failing on non-zero exit
  fn run(&self, args: &[&str]) -> ReleaseResult<String> {
    let output = self.output(args)?;
    if !output.status.success() {
      return Err(command_failed(args, &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
  }

  fn output(&self, args: &[&str]) -> ReleaseResult<Output> {
    self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute git {}", args.join(" ")))
  }

  /// Commit-range argument for `since`
  fn range(since: Option<&str>) -> String {
    match since {
      Some(rev) => format!("{}..HEAD", rev),
      None => "HEAD".to_string(),
    }
  }
}

fn command_failed(args: &[&str], output: &Output) -> ReleaseError {
  ReleaseError::message(format!(
    "git {} failed: {}",
    args.join(" "),
    String::from_utf8_lossy(&output.stderr).trim()
  ))
}

/// Parse `git log` output written with [`FIELD_SEP`]/[`RECORD_SEP`]
fn parse_log(raw: &str) -> Vec<Commit> {
  raw
    .split(RECORD_SEP)
    .filter_map(|record| {
      let record = record.trim_start_matches('\n');
      let mut fields = record.splitn(3, FIELD_SEP);
      let sha = fields.next()?.trim();
      if sha.is_empty() {
        return None;
      }
      let subject = fields.next().unwrap_or_default().trim();
      let body = fields.next().unwrap_or_default().trim();
      Some(Commit::new(sha, subject).with_body(body))
    })
    .collect()
}

impl Vcs for SystemGit {
  fn is_clean(&self) -> ReleaseResult<bool> {
    Ok(self.run(&["status", "--porcelain"])?.trim().is_empty())
  }

  fn is_shallow(&self) -> ReleaseResult<bool> {
    Ok(self.run(&["rev-parse", "--is-shallow-repository"])?.trim() == "true")
  }

  fn default_branch(&self) -> ReleaseResult<String> {
    let head_ref = format!("refs/remotes/{}/HEAD", self.remote);
    let output = self.output(&["symbolic-ref", "--short", head_ref.as_str()])?;
    if output.status.success() {
      let full = String::from_utf8_lossy(&output.stdout).trim().to_string();
      let prefix = format!("{}/", self.remote);
      return Ok(full.strip_prefix(&prefix).unwrap_or(&full).to_string());
    }
    tracing::debug!("{} has no HEAD ref, assuming 'main'", self.remote);
    Ok("main".to_string())
  }

  fn current_branch(&self) -> ReleaseResult<String> {
    let output = self.output(&["rev-parse", "--abbrev-ref", "HEAD"])?;
    if !output.status.success() {
      return Ok("HEAD".to_string());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  fn head_sha(&self) -> ReleaseResult<String> {
    Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
  }

  fn log(&self, since: Option<&str>, paths: &[PathBuf]) -> ReleaseResult<Vec<Commit>> {
    let format = format!("--format=%H{}%s{}%b{}", FIELD_SEP, FIELD_SEP, RECORD_SEP);
    let range = Self::range(since);
    let mut args: Vec<String> = vec!["log".into(), "--no-merges".into(), format, range];
    if !paths.is_empty() {
      args.push("--".into());
      args.extend(paths.iter().map(|p| p.display().to_string()));
    }
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    Ok(parse_log(&self.run(&args)?))
  }

  fn diff_files(&self, since: Option<&str>) -> ReleaseResult<Vec<PathBuf>> {
    let stdout = match since {
      Some(rev) => self.run(&["diff", "--name-only", rev, "HEAD"])?,
      None => self.run(&["ls-files"])?,
    };
    Ok(stdout.lines().filter(|l| !l.is_empty()).map(PathBuf::from).collect())
  }

  fn commit(&self, message: &str, paths: &[PathBuf]) -> ReleaseResult<String> {
    if paths.is_empty() {
      self.run(&["add", "--all"])?;
    } else {
      let mut args = vec!["add".to_string(), "--".to_string()];
      args.extend(paths.iter().map(|p| p.display().to_string()));
      let args: Vec<&str> = args.iter().map(String::as_str).collect();
      self.run(&args)?;
    }
    self.run(&["commit", "-m", message])?;
    self.head_sha()
  }

  fn tag(&self, name: &str, message: &str, target: Option<&str>) -> ReleaseResult<()> {
    let mut args = vec!["tag", "-a", name, "-m", message];
    if let Some(target) = target {
      args.push(target);
    }
    let output = self.output(&args)?;
    if !output.status.success() {
      return Err(ReleaseError::coded(
        ErrorCode::TagCreateFailed,
        format!(
          "git tag {} failed: {}",
          name,
          String::from_utf8_lossy(&output.stderr).trim()
        ),
      ));
    }
    Ok(())
  }

  fn tag_exists(&self, name: &str) -> ReleaseResult<bool> {
    let reference = format!("refs/tags/{}", name);
    let output = self.output(&["rev-parse", "--verify", "--quiet", reference.as_str()])?;
    Ok(output.status.success())
  }

  fn delete_tag(&self, name: &str, remote: bool) -> ReleaseResult<()> {
    self.run(&["tag", "-d", name])?;
    if remote {
      let reference = format!(":refs/tags/{}", name);
      self.run(&["push", self.remote.as_str(), reference.as_str()])?;
    }
    Ok(())
  }

  fn list_tags(&self) -> ReleaseResult<Vec<String>> {
    Ok(
      self
        .run(&["tag", "--list"])?
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect(),
    )
  }

  fn push(&self, tags_only: bool) -> ReleaseResult<()> {
    let args: Vec<&str> = if tags_only {
      vec!["push", self.remote.as_str(), "--tags"]
    } else {
      vec!["push", self.remote.as_str(), "HEAD"]
    };
    let output = self.output(&args)?;
    if !output.status.success() {
      return Err(ReleaseError::coded(
        ErrorCode::TagPushFailed,
        format!("git push failed: {}", String::from_utf8_lossy(&output.stderr).trim()),
      ));
    }
    Ok(())
  }

  fn checkout_branch(&self, name: &str, create: bool) -> ReleaseResult<()> {
    if create {
      self.run(&["checkout", "-B", name])?;
    } else {
      self.run(&["checkout", name])?;
    }
    Ok(())
  }
}
