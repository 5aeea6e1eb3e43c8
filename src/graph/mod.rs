//! Dependency-graph analysis over discovered packages
//!
//! Built on petgraph: cycle detection via Tarjan SCC, topological levels via
//! toposort, reverse reachability for dependency propagation.

pub mod dependency_graph;

pub use dependency_graph::{
  DependencyGraph, build_graph, detect_cycles, format_cycles, topo_levels, topo_sort,
};
