//! Release checks
//!
//! Two entry points:
//!
//! - [`run_preflight`]: ordered, fail-fast gate in front of a release. Talks to
//!   the backends (VCS, package manager, forge, registry).
//! - [`run_checks`]: the health-check catalogue. Every check implements the
//!   `Check` trait, runs independently on the rayon pool, and never blocks
//!   the others.
//!
//! # Built-in Checks
//!
//! - **cycles**, **self-deps**, **orphan-deps**: dependency graph hygiene
//! - **missing-files**: LICENSE and README present
//! - **type-markers**: `py.typed` / `types` declared
//! - **version-consistency**: plugins share the core package's version
//! - **naming**: directory names match package names
//! - **metadata**: description, license and repository set
//! - **stale-artifacts**: no leftover `dist/` contents

mod consistency;
mod files;
mod graph_checks;
mod preflight;
mod result;
mod runner;
mod trait_def;

pub use files::stale_artifacts;
pub use preflight::{PreflightContext, env_snapshot, run_preflight};
pub use result::{CheckOutcome, Location, PreflightResult};
pub use runner::{default_checks, run_catalogue, run_checks};
pub use trait_def::{Check, CheckContext, CheckOptions, Severity};
