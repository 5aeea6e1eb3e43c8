//! End-to-end tests: real git repositories in temp dirs, the library API and
//! the `releasekit` binary

mod helpers;
mod test_discovery;
mod test_plan;
mod test_preflight;
mod test_sbom;
mod test_tag;
mod test_versioning;
