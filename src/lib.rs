//! releasekit: release orchestration for polyglot workspaces
//!
//! # Pipeline
//!
//! ```text
//! workspace::discover → graph::build_graph → version::compute_versions
//!   → checks::run_preflight → plan::build_plan → (release PR merged)
//!   → tag::tag_release → sbom::write_sbom
//! ```
//!
//! The orchestration code only talks to the traits in [`backends`]; callers
//! inject git, forge, registry and package-manager implementations.

pub mod backends;
pub mod checks;
pub mod commands;
pub mod core;
pub mod graph;
pub mod plan;
pub mod sbom;
pub mod tag;
pub mod version;
pub mod workspace;

pub use crate::core::config::ReleaseKitConfig;
pub use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
