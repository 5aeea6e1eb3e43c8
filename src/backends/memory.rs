//! In-process backends
//!
//! Deterministic implementations of every backend trait. They hold their
//! state behind a `Mutex`, record the operations performed on them and can be
//! told to fail specific calls. Used for dry runs, embedding, and tests.

use super::{
  ChecksumReport, CommandOutput, Commit, Forge, ForgeCapabilities, PackageManager, PrFilter, PrState, PullRequest,
  Registry, ReleaseInfo, ReleaseRequest, Vcs,
};
use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// VCS
// ============================================================================

#[derive(Debug, Clone)]
struct RecordedCommit {
  commit: Commit,
  files: Vec<PathBuf>,
}

#[derive(Debug)]
struct VcsState {
  clean: bool,
  shallow: bool,
  branch: String,
  default_branch: String,
  /// Oldest first
  history: Vec<RecordedCommit>,
  /// Tag name → target SHA
  tags: BTreeMap<String, String>,
  pushed_tags: BTreeSet<String>,
  fail_tag: Option<String>,
  fail_push: bool,
  operations: Vec<String>,
}

/// In-memory repository
#[derive(Debug)]
pub struct MemoryVcs {
  state: Mutex<VcsState>,
}

impl Default for MemoryVcs {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryVcs {
  /// Empty, clean, non-shallow repository on `main`
  pub fn new() -> Self {
    Self {
      state: Mutex::new(VcsState {
        clean: true,
        shallow: false,
        branch: "main".to_string(),
        default_branch: "main".to_string(),
        history: Vec::new(),
        tags: BTreeMap::new(),
        pushed_tags: BTreeSet::new(),
        fail_tag: None,
        fail_push: false,
        operations: Vec::new(),
      }),
    }
  }

  /// Append a commit touching `files` and return its SHA.
  /// The message is split into subject and body at the first blank line.
  pub fn add_commit<P: AsRef<Path>>(&self, message: &str, files: &[P]) -> String {
    let mut state = guard(&self.state);
    let sha = format!("{:040x}", state.history.len() + 1);
    let (subject, body) = match message.split_once("\n\n") {
      Some((subject, body)) => (subject, body),
      None => (message, ""),
    };
    state.history.push(RecordedCommit {
      commit: Commit::new(sha.clone(), subject.trim()).with_body(body.trim()),
      files: files.iter().map(|f| f.as_ref().to_path_buf()).collect(),
    });
    sha
  }

  /// Tag the current HEAD without recording an operation
  pub fn add_tag(&self, name: &str) {
    let mut state = guard(&self.state);
    let head = head_of(&state);
    state.tags.insert(name.to_string(), head);
  }

  pub fn set_clean(&self, clean: bool) {
    guard(&self.state).clean = clean;
  }

  pub fn set_shallow(&self, shallow: bool) {
    guard(&self.state).shallow = shallow;
  }

  /// Make `tag(name, ..)` fail
  pub fn fail_tag_on(&self, name: &str) {
    guard(&self.state).fail_tag = Some(name.to_string());
  }

  /// Make every `push` fail
  pub fn fail_push(&self) {
    guard(&self.state).fail_push = true;
  }

  /// Current tags with their target SHAs
  pub fn tags(&self) -> BTreeMap<String, String> {
    guard(&self.state).tags.clone()
  }

  pub fn pushed_tags(&self) -> BTreeSet<String> {
    guard(&self.state).pushed_tags.clone()
  }

  /// Mutating operations in the order they happened
  pub fn operations(&self) -> Vec<String> {
    guard(&self.state).operations.clone()
  }

  fn since_index(state: &VcsState, since: Option<&str>) -> ReleaseResult<usize> {
    let Some(rev) = since else {
      return Ok(0);
    };
    let sha = state.tags.get(rev).map(String::as_str).unwrap_or(rev);
    state
      .history
      .iter()
      .position(|c| c.commit.sha == sha)
      .map(|idx| idx + 1)
      .ok_or_else(|| ReleaseError::message(format!("unknown revision '{}'", rev)))
  }
}

fn head_of(state: &VcsState) -> String {
  state
    .history
    .last()
    .map(|c| c.commit.sha.clone())
    .unwrap_or_else(|| "0".repeat(40))
}

fn touches(files: &[PathBuf], paths: &[PathBuf]) -> bool {
  paths.is_empty()
    || paths
      .iter()
      .any(|p| p.as_os_str().is_empty() || p == Path::new(".") || files.iter().any(|f| f.starts_with(p)))
}

impl Vcs for MemoryVcs {
  fn is_clean(&self) -> ReleaseResult<bool> {
    Ok(guard(&self.state).clean)
  }

  fn is_shallow(&self) -> ReleaseResult<bool> {
    Ok(guard(&self.state).shallow)
  }

  fn default_branch(&self) -> ReleaseResult<String> {
    Ok(guard(&self.state).default_branch.clone())
  }

  fn current_branch(&self) -> ReleaseResult<String> {
    Ok(guard(&self.state).branch.clone())
  }

  fn head_sha(&self) -> ReleaseResult<String> {
    Ok(head_of(&guard(&self.state)))
  }

  fn log(&self, since: Option<&str>, paths: &[PathBuf]) -> ReleaseResult<Vec<Commit>> {
    let state = guard(&self.state);
    let start = Self::since_index(&state, since)?;
    Ok(
      state.history[start..]
        .iter()
        .rev()
        .filter(|c| touches(&c.files, paths))
        .map(|c| c.commit.clone())
        .collect(),
    )
  }

  fn diff_files(&self, since: Option<&str>) -> ReleaseResult<Vec<PathBuf>> {
    let state = guard(&self.state);
    let start = Self::since_index(&state, since)?;
    let files: BTreeSet<PathBuf> = state.history[start..]
      .iter()
      .flat_map(|c| c.files.iter().cloned())
      .collect();
    Ok(files.into_iter().collect())
  }

  fn commit(&self, message: &str, paths: &[PathBuf]) -> ReleaseResult<String> {
    let sha = self.add_commit(message, paths);
    let mut state = guard(&self.state);
    state.clean = true;
    state.operations.push(format!("commit {}", message.lines().next().unwrap_or_default()));
    Ok(sha)
  }

  fn tag(&self, name: &str, message: &str, target: Option<&str>) -> ReleaseResult<()> {
    let mut state = guard(&self.state);
    if state.fail_tag.as_deref() == Some(name) {
      return Err(ReleaseError::coded(
        ErrorCode::TagCreateFailed,
        format!("refusing to create tag {}", name),
      ));
    }
    if state.tags.contains_key(name) {
      return Err(ReleaseError::coded(
        ErrorCode::TagCreateFailed,
        format!("tag {} already exists", name),
      ));
    }
    let target = target.map(str::to_string).unwrap_or_else(|| head_of(&state));
    state.tags.insert(name.to_string(), target);
    state.operations.push(format!("tag {} ({})", name, message));
    Ok(())
  }

  fn tag_exists(&self, name: &str) -> ReleaseResult<bool> {
    Ok(guard(&self.state).tags.contains_key(name))
  }

  fn delete_tag(&self, name: &str, remote: bool) -> ReleaseResult<()> {
    let mut state = guard(&self.state);
    state.tags.remove(name);
    if remote {
      state.pushed_tags.remove(name);
    }
    state.operations.push(format!("delete-tag {}", name));
    Ok(())
  }

  fn list_tags(&self) -> ReleaseResult<Vec<String>> {
    Ok(guard(&self.state).tags.keys().cloned().collect())
  }

  fn push(&self, tags_only: bool) -> ReleaseResult<()> {
    let mut state = guard(&self.state);
    if state.fail_push {
      return Err(ReleaseError::coded(ErrorCode::TagPushFailed, "remote rejected push"));
    }
    let tags: Vec<String> = state.tags.keys().cloned().collect();
    state.pushed_tags.extend(tags);
    state
      .operations
      .push(if tags_only { "push --tags" } else { "push" }.to_string());
    Ok(())
  }

  fn checkout_branch(&self, name: &str, create: bool) -> ReleaseResult<()> {
    let mut state = guard(&self.state);
    state.branch = name.to_string();
    state
      .operations
      .push(format!("checkout {}{}", if create { "-B " } else { "" }, name));
    Ok(())
  }
}

// ============================================================================
// Forge
// ============================================================================

#[derive(Debug)]
struct ForgeState {
  available: bool,
  /// Insertion order; newest last
  prs: Vec<PullRequest>,
  releases: Vec<ReleaseInfo>,
  operations: Vec<String>,
  /// Upcoming `create_release` calls that fail
  failing_releases: usize,
  failing_labels: bool,
}

/// In-memory forge
#[derive(Debug)]
pub struct MemoryForge {
  name: String,
  capabilities: ForgeCapabilities,
  state: Mutex<ForgeState>,
}

impl MemoryForge {
  pub fn new(name: impl Into<String>, capabilities: ForgeCapabilities) -> Self {
    Self {
      name: name.into(),
      capabilities,
      state: Mutex::new(ForgeState {
        available: true,
        prs: Vec::new(),
        releases: Vec::new(),
        operations: Vec::new(),
        failing_releases: 0,
        failing_labels: false,
      }),
    }
  }

  pub fn github() -> Self {
    Self::new("github", ForgeCapabilities::github())
  }

  pub fn gitlab() -> Self {
    Self::new("gitlab", ForgeCapabilities::gitlab())
  }

  pub fn set_available(&self, available: bool) {
    guard(&self.state).available = available;
  }

  /// Make the next `times` calls to `create_release` fail
  pub fn fail_create_release(&self, times: usize) {
    guard(&self.state).failing_releases = times;
  }

  /// Make every `add_labels` call fail
  pub fn fail_add_labels(&self) {
    guard(&self.state).failing_labels = true;
  }

  /// Insert a release as if an earlier run had created it
  pub fn insert_release(&self, release: ReleaseInfo) {
    guard(&self.state).releases.push(release);
  }

  /// Insert a PR as-is
  pub fn insert_pr(&self, pr: PullRequest) {
    guard(&self.state).prs.push(pr);
  }

  /// Current state of PR `number`
  pub fn pr(&self, number: u64) -> Option<PullRequest> {
    guard(&self.state).prs.iter().find(|p| p.number == number).cloned()
  }

  pub fn releases(&self) -> Vec<ReleaseInfo> {
    guard(&self.state).releases.clone()
  }

  pub fn operations(&self) -> Vec<String> {
    guard(&self.state).operations.clone()
  }

  fn with_pr<T>(&self, number: u64, f: impl FnOnce(&mut PullRequest) -> T) -> ReleaseResult<T> {
    let mut state = guard(&self.state);
    let pr = state
      .prs
      .iter_mut()
      .find(|p| p.number == number)
      .ok_or_else(|| ReleaseError::message(format!("{}: no pull request #{}", self.name, number)))?;
    Ok(f(pr))
  }
}

fn matches_filter(pr: &PullRequest, filter: &PrFilter) -> bool {
  let state_ok = filter.state == PrState::All || filter.state == pr.state;
  let label_ok = filter.label.as_ref().is_none_or(|l| pr.labels.contains(l));
  let base_ok = filter.base.as_ref().is_none_or(|b| &pr.base_branch == b);
  state_ok && label_ok && base_ok
}

impl Forge for MemoryForge {
  fn name(&self) -> &str {
    &self.name
  }

  fn capabilities(&self) -> ForgeCapabilities {
    self.capabilities
  }

  fn is_available(&self) -> bool {
    guard(&self.state).available
  }

  fn create_release(&self, request: &ReleaseRequest) -> ReleaseResult<ReleaseInfo> {
    let mut state = guard(&self.state);
    if state.failing_releases > 0 {
      state.failing_releases -= 1;
      return Err(ReleaseError::message(format!("{}: HTTP 502 creating release {}", self.name, request.tag)));
    }
    if state.releases.iter().any(|r| r.tag == request.tag) {
      return Err(ReleaseError::message(format!("release {} already exists", request.tag)));
    }
    let info = ReleaseInfo {
      tag: request.tag.clone(),
      title: request.title.clone(),
      draft: request.draft && self.capabilities.draft_releases,
      url: Some(format!("memory://{}/releases/{}", self.name, request.tag)),
    };
    state.operations.push(format!("create-release {}", request.tag));
    state.releases.push(info.clone());
    Ok(info)
  }

  fn publish_release(&self, tag: &str) -> ReleaseResult<()> {
    let mut state = guard(&self.state);
    let release = state
      .releases
      .iter_mut()
      .find(|r| r.tag == tag)
      .ok_or_else(|| ReleaseError::message(format!("no release for tag {}", tag)))?;
    release.draft = false;
    state.operations.push(format!("publish-release {}", tag));
    Ok(())
  }

  fn list_releases(&self, limit: usize) -> ReleaseResult<Vec<ReleaseInfo>> {
    Ok(guard(&self.state).releases.iter().rev().take(limit).cloned().collect())
  }

  fn create_pr(&self, title: &str, body: &str, head: &str, base: &str) -> ReleaseResult<PullRequest> {
    let mut state = guard(&self.state);
    let number = state.prs.iter().map(|p| p.number).max().unwrap_or(0) + 1;
    let pr = PullRequest {
      number,
      title: title.to_string(),
      body: body.to_string(),
      labels: Vec::new(),
      head_branch: head.to_string(),
      base_branch: base.to_string(),
      state: PrState::Open,
      merged_at: None,
      merge_commit_sha: None,
    };
    state.operations.push(format!("create-pr #{}", number));
    state.prs.push(pr.clone());
    Ok(pr)
  }

  fn list_prs(&self, filter: &PrFilter) -> ReleaseResult<Vec<PullRequest>> {
    Ok(
      guard(&self.state)
        .prs
        .iter()
        .rev()
        .filter(|pr| matches_filter(pr, filter))
        .take(filter.limit)
        .cloned()
        .collect(),
    )
  }

  fn pr_data(&self, number: u64) -> ReleaseResult<PullRequest> {
    self.with_pr(number, |pr| pr.clone())
  }

  fn add_labels(&self, number: u64, labels: &[String]) -> ReleaseResult<()> {
    if guard(&self.state).failing_labels {
      return Err(ReleaseError::message(format!("{}: HTTP 502 labelling #{}", self.name, number)));
    }
    self.with_pr(number, |pr| {
      for label in labels {
        if !pr.labels.contains(label) {
          pr.labels.push(label.clone());
        }
      }
    })?;
    guard(&self.state)
      .operations
      .push(format!("add-labels #{} {}", number, labels.join(",")));
    Ok(())
  }

  fn remove_labels(&self, number: u64, labels: &[String]) -> ReleaseResult<()> {
    self.with_pr(number, |pr| pr.labels.retain(|l| !labels.contains(l)))?;
    guard(&self.state)
      .operations
      .push(format!("remove-labels #{} {}", number, labels.join(",")));
    Ok(())
  }

  fn merge_pr(&self, number: u64) -> ReleaseResult<()> {
    self.with_pr(number, |pr| {
      pr.state = PrState::Merged;
      pr.merged_at = Some(chrono::Utc::now().to_rfc3339());
    })?;
    guard(&self.state).operations.push(format!("merge-pr #{}", number));
    Ok(())
  }
}

// ============================================================================
// Registry
// ============================================================================

type Release = (String, String);

#[derive(Debug, Default)]
struct RegistryState {
  /// Package name → published versions
  published: BTreeMap<String, BTreeSet<String>>,
  /// Release → file name → sha256
  checksums: BTreeMap<Release, BTreeMap<String, String>>,
  /// Release → number of lookups that still report "missing"
  hidden_for: BTreeMap<Release, usize>,
  lookups: usize,
}

/// In-memory package registry
#[derive(Debug)]
pub struct MemoryRegistry {
  name: String,
  state: Mutex<RegistryState>,
}

impl MemoryRegistry {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      state: Mutex::new(RegistryState::default()),
    }
  }

  /// Mark `name@version` as published
  pub fn publish(&self, name: &str, version: &str) {
    guard(&self.state)
      .published
      .entry(name.to_string())
      .or_default()
      .insert(version.to_string());
  }

  /// Publish `name@version` but report it missing for the next `lookups` queries
  pub fn publish_delayed(&self, name: &str, version: &str, lookups: usize) {
    self.publish(name, version);
    guard(&self.state)
      .hidden_for
      .insert((name.to_string(), version.to_string()), lookups);
  }

  pub fn set_checksums(&self, name: &str, version: &str, files: BTreeMap<String, String>) {
    guard(&self.state)
      .checksums
      .insert((name.to_string(), version.to_string()), files);
  }

  /// Number of `check_published` calls so far
  pub fn lookups(&self) -> usize {
    guard(&self.state).lookups
  }
}

impl Registry for MemoryRegistry {
  fn name(&self) -> &str {
    &self.name
  }

  fn check_published(&self, name: &str, version: &str) -> ReleaseResult<bool> {
    let mut state = guard(&self.state);
    state.lookups += 1;
    let key = (name.to_string(), version.to_string());
    if let Some(remaining) = state.hidden_for.get_mut(&key)
      && *remaining > 0
    {
      *remaining -= 1;
      return Ok(false);
    }
    Ok(state.published.get(name).is_some_and(|v| v.contains(version)))
  }

  fn latest_version(&self, name: &str) -> ReleaseResult<Option<String>> {
    let state = guard(&self.state);
    let latest = state.published.get(name).and_then(|versions| {
      versions
        .iter()
        .filter_map(|v| semver::Version::parse(v).ok())
        .max()
        .map(|v| v.to_string())
    });
    Ok(latest)
  }

  fn verify_checksum(
    &self,
    name: &str,
    version: &str,
    local: &BTreeMap<String, String>,
  ) -> ReleaseResult<ChecksumReport> {
    let state = guard(&self.state);
    let remote = state
      .checksums
      .get(&(name.to_string(), version.to_string()))
      .cloned()
      .unwrap_or_default();

    let mut report = ChecksumReport::default();
    for (file, digest) in local {
      match remote.get(file) {
        Some(remote_digest) if remote_digest == digest => report.matched.push(file.clone()),
        Some(_) => report.mismatched.push(file.clone()),
        None => report.missing.push(file.clone()),
      }
    }
    Ok(report)
  }
}

// ============================================================================
// Package manager
// ============================================================================

#[derive(Debug)]
struct PackageManagerState {
  lockfile_current: bool,
  failing_builds: BTreeSet<PathBuf>,
  calls: Vec<String>,
}

/// In-memory package manager; every command succeeds unless told otherwise
#[derive(Debug)]
pub struct MemoryPackageManager {
  name: String,
  state: Mutex<PackageManagerState>,
}

impl MemoryPackageManager {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      state: Mutex::new(PackageManagerState {
        lockfile_current: true,
        failing_builds: BTreeSet::new(),
        calls: Vec::new(),
      }),
    }
  }

  pub fn set_lockfile_current(&self, current: bool) {
    guard(&self.state).lockfile_current = current;
  }

  pub fn fail_build_of(&self, package_dir: &Path) {
    guard(&self.state).failing_builds.insert(package_dir.to_path_buf());
  }

  /// Commands issued so far
  pub fn calls(&self) -> Vec<String> {
    guard(&self.state).calls.clone()
  }

  fn record(&self, command: String) -> CommandOutput {
    guard(&self.state).calls.push(command.clone());
    CommandOutput::ok(command)
  }
}

impl PackageManager for MemoryPackageManager {
  fn name(&self) -> &str {
    &self.name
  }

  fn build(&self, package_dir: &Path, output_dir: &Path) -> ReleaseResult<CommandOutput> {
    let command = format!("build {} -> {}", package_dir.display(), output_dir.display());
    if guard(&self.state).failing_builds.contains(package_dir) {
      return Ok(CommandOutput::failed(command, "build failed"));
    }
    Ok(self.record(command))
  }

  fn publish(&self, dist_dir: &Path, index_url: Option<&str>) -> ReleaseResult<CommandOutput> {
    Ok(self.record(format!(
      "publish {}{}",
      dist_dir.display(),
      index_url.map(|u| format!(" --index {}", u)).unwrap_or_default()
    )))
  }

  fn lock(&self, check_only: bool, upgrade_package: Option<&str>, cwd: &Path) -> ReleaseResult<CommandOutput> {
    let command = format!(
      "lock{}{} in {}",
      if check_only { " --check" } else { "" },
      upgrade_package.map(|p| format!(" --upgrade {}", p)).unwrap_or_default(),
      cwd.display()
    );
    let current = guard(&self.state).lockfile_current;
    if check_only && !current {
      guard(&self.state).calls.push(command.clone());
      return Ok(CommandOutput::failed(command, "lockfile needs to be updated"));
    }
    if !check_only {
      guard(&self.state).lockfile_current = true;
    }
    Ok(self.record(command))
  }

  fn version_bump(&self, package_dir: &Path, new_version: &str) -> ReleaseResult<CommandOutput> {
    Ok(self.record(format!("version {} {}", package_dir.display(), new_version)))
  }

  fn resolve_check(&self, name: &str, version: &str, index_url: Option<&str>) -> ReleaseResult<CommandOutput> {
    Ok(self.record(format!(
      "resolve {}=={}{}",
      name,
      version,
      index_url.map(|u| format!(" --index {}", u)).unwrap_or_default()
    )))
  }

  fn smoke_test(&self, name: &str, version: &str) -> ReleaseResult<CommandOutput> {
    Ok(self.record(format!("smoke-test {}=={}", name, version)))
  }
}
