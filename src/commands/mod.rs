//! CLI commands for releasekit
//!
//! ## Inspection
//! - **discover**: List the packages found in the workspace
//! - **graph**: Dependency levels, cycles, DOT output
//! - **check**: Run the health-check catalogue
//!
//! ## Release
//! - **plan**: Compute versions and render the execution plan
//! - **tag**: Tag a merged release and create the platform release
//! - **sbom**: Write CycloneDX / SPDX documents for a release manifest
//!
//! All commands accept `&WorkspaceContext` to avoid redundant workspace loads.

pub mod check;
pub mod discover;
pub mod graph;
pub mod plan;
pub mod sbom;
pub mod tag;

pub use check::run_check;
pub use discover::run_discover;
pub use graph::run_graph;
pub use plan::run_plan;
pub use sbom::run_sbom;
pub use tag::run_tag;
