//! Release version planning
//!
//! # Flow
//!
//! 1. `collect_commit_log`: commits per package since its last release tag
//! 2. `compute_versions`: conventional commits + overrides + propagation → [`PackageVersion`]s
//! 3. `build_manifest`: versions + HEAD sha → [`ReleaseManifest`], embedded in the release PR
//! 4. `apply_versions`: rewrite manifests on the release branch
//!
//! After the release PR merges, the tag orchestrator reads the manifest back
//! with `extract_from_pr_body`.

pub mod apply;
pub mod bump;
pub mod commits;
pub mod manifest;
pub mod planner;

pub use apply::apply_versions;
pub use bump::{VersionBump, bump_version, parse_version};
pub use commits::{ConventionalCommit, bump_for_commits, bump_for_message};
pub use manifest::{ReleaseManifest, build_manifest, embed_in_pr_body, extract_from_pr_body, umbrella_tag};
pub use planner::{CommitLog, NO_CHANGES, PackageVersion, VersionOptions, collect_commit_log, compute_versions};
