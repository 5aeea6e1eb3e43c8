//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A uv workspace with git history
pub struct TestWorkspace {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestWorkspace {
  /// Create a git repository holding an empty uv workspace under `packages/*`
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;
    git(&path, &["config", "commit.gpgsign", "false"])?;
    git(&path, &["config", "tag.gpgsign", "false"])?;

    std::fs::write(
      path.join("pyproject.toml"),
      r#"[tool.uv.workspace]
members = ["packages/*"]
"#,
    )?;
    std::fs::write(path.join("LICENSE"), "Apache-2.0\n")?;

    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "chore: initial workspace setup"])?;

    Ok(Self { _root: root, path })
  }

  /// Add a package; `deps` are PEP 508 requirement strings
  pub fn add_package(&self, name: &str, version: &str, deps: &[&str]) -> Result<PathBuf> {
    let pkg_path = self.path.join("packages").join(name);
    let module = name.replace('-', "_");
    std::fs::create_dir_all(pkg_path.join("src").join(&module))?;

    let deps: Vec<String> = deps.iter().map(|d| format!("\"{}\"", d)).collect();
    std::fs::write(
      pkg_path.join("pyproject.toml"),
      format!(
        r#"[project]
name = "{}"
version = "{}"
description = "The {} package"
license = "Apache-2.0"
dependencies = [{}]

[project.urls]
Repository = "https://example.com/{}"
"#,
        name,
        version,
        name,
        deps.join(", "),
        name
      ),
    )?;
    std::fs::write(pkg_path.join("src").join(&module).join("__init__.py"), "")?;
    std::fs::write(pkg_path.join("src").join(&module).join("py.typed"), "")?;
    std::fs::write(pkg_path.join("README.md"), format!("# {}\n", name))?;

    Ok(pkg_path)
  }

  /// Write a file relative to the workspace root
  pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
    let full = self.path.join(path);
    if let Some(parent) = full.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(full, content)?;
    Ok(())
  }

  /// Commit current changes
  pub fn commit(&self, message: &str) -> Result<String> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;

    let output = git(&self.path, &["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Create an annotated tag at HEAD
  pub fn tag(&self, name: &str) -> Result<()> {
    git(&self.path, &["tag", "-a", name, "-m", name])?;
    Ok(())
  }

  /// Attach a bare repository as `origin` and push `main` to it
  pub fn add_remote(&self) -> Result<PathBuf> {
    let remote = self.path.with_extension("remote.git");
    git(&self.path, &["init", "--bare", remote.to_str().context("non-UTF-8 temp path")?])?;
    git(&self.path, &["remote", "add", "origin", remote.to_str().context("non-UTF-8 temp path")?])?;
    git(&self.path, &["push", "origin", "main"])?;
    Ok(remote)
  }

  /// Tags in the repository
  pub fn tags(&self) -> Result<Vec<String>> {
    let output = git(&self.path, &["tag", "--list"])?;
    Ok(
      String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(String::from)
        .collect(),
    )
  }

  /// Read a file
  pub fn read_file(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(path))?)
  }
}

impl Drop for TestWorkspace {
  fn drop(&mut self) {
    let _ = std::fs::remove_dir_all(self.path.with_extension("remote.git"));
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run the releasekit CLI, failing on a non-zero exit
pub fn run_releasekit(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = run_releasekit_unchecked(cwd, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "releasekit command failed: releasekit {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

/// Run the releasekit CLI and return its output whatever the exit status
pub fn run_releasekit_unchecked(cwd: &Path, args: &[&str]) -> Result<Output> {
  Command::new(env!("CARGO_BIN_EXE_releasekit"))
    .current_dir(cwd)
    .env("RELEASEKIT_LOG", "warn")
    .args(args)
    .output()
    .context("Failed to run releasekit")
}
