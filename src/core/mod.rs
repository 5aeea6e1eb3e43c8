//! Core building blocks shared by every releasekit stage
//!
//! - **config**: releasekit.toml parsing and validation
//! - **context**: workspace context built once per process
//! - **error**: coded error taxonomy (`RK-<AREA>-<REASON>`) with hints and exit codes
//! - **lock**: exclusive release lock guarding mutating runs

pub mod config;
pub mod context;
pub mod error;
pub mod lock;
