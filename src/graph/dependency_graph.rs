//! Package dependency graph built from discovered packages + petgraph
//!
//! ## Graph Structure
//!
//! - **Directed Graph**: `A → B` means "A depends on B"
//! - **Nodes**: every discovered package, even with no edges
//! - **Edges**: internal dependencies, self-dependencies included
//! - **Index**: name → node, plus a `BTreeMap` edge view for deterministic iteration
//! - **Algorithms**: SCC (cycles), toposort (levels), reverse reachability

use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use crate::workspace::Package;
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

/// Workspace dependency graph
#[derive(Debug, Clone)]
pub struct DependencyGraph {
  graph: DiGraph<String, ()>,

  /// Index: package name → node index
  name_to_node: BTreeMap<String, NodeIndex>,

  /// Edge view: package name → internal dependency names
  edges: BTreeMap<String, BTreeSet<String>>,
}

/// Build the graph from `Package.internal_deps`
///
/// Dependencies naming packages outside `packages` get no edge; the orphan
/// health check reports them.
pub fn build_graph(packages: &[Package]) -> DependencyGraph {
  let mut sorted: Vec<&Package> = packages.iter().collect();
  sorted.sort_by(|a, b| a.name.cmp(&b.name));

  let mut graph = DiGraph::new();
  let mut name_to_node = BTreeMap::new();
  let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

  for pkg in &sorted {
    let idx = graph.add_node(pkg.name.clone());
    name_to_node.insert(pkg.name.clone(), idx);
    edges.insert(pkg.name.clone(), BTreeSet::new());
  }

  for pkg in &sorted {
    let from = name_to_node[&pkg.name];
    for dep in &pkg.internal_deps {
      let Some(&to) = name_to_node.get(dep) else {
        tracing::debug!("{} depends on unknown package {}", pkg.name, dep);
        continue;
      };
      if edges.entry(pkg.name.clone()).or_default().insert(dep.clone()) {
        graph.add_edge(from, to, ());
      }
    }
  }

  DependencyGraph {
    graph,
    name_to_node,
    edges,
  }
}

impl DependencyGraph {
  /// Package names, sorted
  pub fn names(&self) -> Vec<String> {
    self.name_to_node.keys().cloned().collect()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.name_to_node.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.name_to_node.len()
  }

  pub fn is_empty(&self) -> bool {
    self.name_to_node.is_empty()
  }

  /// Name → internal dependency names
  pub fn edges(&self) -> &BTreeMap<String, BTreeSet<String>> {
    &self.edges
  }

  /// Direct dependencies of `name` (what it uses)
  pub fn dependencies(&self, name: &str) -> Option<&BTreeSet<String>> {
    self.edges.get(name)
  }

  /// Direct dependents of `name` (what uses it), sorted
  pub fn reverse_deps(&self, name: &str) -> Vec<String> {
    let Some(&idx) = self.name_to_node.get(name) else {
      return Vec::new();
    };
    let dependents: BTreeSet<String> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .filter(|&n| n != idx)
      .map(|n| self.graph[n].clone())
      .collect();
    dependents.into_iter().collect()
  }

  /// Every package that depends on `name` directly or transitively, sorted
  pub fn transitive_dependents(&self, name: &str) -> Vec<String> {
    let Some(&start) = self.name_to_node.get(name) else {
      return Vec::new();
    };

    let mut visited = BTreeSet::new();
    let mut stack = vec![start];
    let mut dependents = BTreeSet::new();

    while let Some(idx) = stack.pop() {
      if !visited.insert(idx) {
        continue;
      }
      for neighbor in self.graph.neighbors_directed(idx, Direction::Incoming) {
        if neighbor != start {
          dependents.insert(self.graph[neighbor].clone());
        }
        stack.push(neighbor);
      }
    }

    dependents.into_iter().collect()
  }

  /// Export graph to DOT format (Graphviz)
  pub fn to_dot(&self) -> String {
    let mut out = String::from("digraph dependencies {\n  rankdir=LR;\n  node [shape=box];\n");
    for (name, deps) in &self.edges {
      out.push_str(&format!("  \"{}\";\n", name));
      for dep in deps {
        out.push_str(&format!("  \"{}\" -> \"{}\";\n", name, dep));
      }
    }
    out.push_str("}\n");
    out
  }
}

/// Every dependency cycle in the graph
///
/// Each entry is an elementary cycle: consecutive names (and last → first)
/// are real dependency edges. A strongly connected component usually yields
/// one cycle through its lexicographically smallest member; members that
/// cycle leaves out get their own cycle, so every cyclic package appears at
/// least once. Self-loops are reported as `[name]`. Each cycle starts at its
/// smallest member and the list is sorted.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
  let mut cycles = BTreeSet::new();

  for component in algo::tarjan_scc(&graph.graph) {
    if component.len() < 2 {
      continue;
    }
    let members: BTreeSet<&str> = component.iter().map(|&idx| graph.graph[idx].as_str()).collect();
    let mut covered = BTreeSet::new();
    for &member in &members {
      if covered.contains(member) {
        continue;
      }
      if let Some(cycle) = cycle_through(graph, &members, member) {
        covered.extend(cycle.iter().copied());
        cycles.insert(rotate_to_smallest(cycle));
      }
    }
  }

  for (name, deps) in &graph.edges {
    if deps.contains(name) {
      cycles.insert(vec![name.clone()]);
    }
  }

  cycles.into_iter().collect()
}

/// Depth-first search along sorted edges inside `members` for a path from
/// `start` back to itself
fn cycle_through<'a>(graph: &'a DependencyGraph, members: &BTreeSet<&str>, start: &'a str) -> Option<Vec<&'a str>> {
  fn visit<'a>(
    graph: &'a DependencyGraph,
    members: &BTreeSet<&str>,
    start: &str,
    path: &mut Vec<&'a str>,
    seen: &mut BTreeSet<&'a str>,
  ) -> bool {
    let Some(&current) = path.last() else {
      return false;
    };
    let Some(deps) = graph.edges.get(current) else {
      return false;
    };
    for dep in deps {
      let dep = dep.as_str();
      if !members.contains(dep) || dep == current {
        continue;
      }
      if dep == start {
        return true;
      }
      if seen.insert(dep) {
        path.push(dep);
        if visit(graph, members, start, path, seen) {
          return true;
        }
        path.pop();
      }
    }
    false
  }

  let mut path = vec![start];
  let mut seen = BTreeSet::from([start]);
  visit(graph, members, start, &mut path, &mut seen).then_some(path)
}

fn rotate_to_smallest(mut cycle: Vec<&str>) -> Vec<String> {
  if let Some(pos) = cycle.iter().enumerate().min_by_key(|(_, name)| **name).map(|(i, _)| i) {
    cycle.rotate_left(pos);
  }
  cycle.into_iter().map(str::to_string).collect()
}

/// Render cycles as `a -> b -> a` chains
pub fn format_cycles(cycles: &[Vec<String>]) -> String {
  cycles
    .iter()
    .map(|cycle| {
      let mut chain = cycle.clone();
      if let Some(first) = cycle.first() {
        chain.push(first.clone());
      }
      chain.join(" -> ")
    })
    .collect::<Vec<_>>()
    .join("; ")
}

/// Group package names into topological levels
///
/// Level 0 has no internal dependencies; every package at level k depends
/// only on packages at levels below k. Names are sorted within a level.
pub fn topo_levels(graph: &DependencyGraph) -> ReleaseResult<Vec<Vec<String>>> {
  let cycles = detect_cycles(graph);
  if !cycles.is_empty() {
    return Err(ReleaseError::coded(
      ErrorCode::GraphCycle,
      format!("dependency cycle: {}", format_cycles(&cycles)),
    ));
  }

  // Dependents come first in toposort order, so walk it backwards
  let order = algo::toposort(&graph.graph, None).map_err(|cycle| {
    ReleaseError::coded(
      ErrorCode::GraphCycle,
      format!("dependency cycle involving '{}'", graph.graph[cycle.node_id()]),
    )
  })?;

  let mut level_of: BTreeMap<&str, usize> = BTreeMap::new();
  for idx in order.into_iter().rev() {
    let level = graph
      .graph
      .neighbors_directed(idx, Direction::Outgoing)
      .map(|dep| level_of[graph.graph[dep].as_str()] + 1)
      .max()
      .unwrap_or(0);
    level_of.insert(graph.graph[idx].as_str(), level);
  }

  let depth = level_of.values().max().map_or(0, |max| max + 1);
  let mut levels = vec![Vec::new(); depth];
  for (name, level) in level_of {
    levels[level].push(name.to_string());
  }
  Ok(levels)
}

/// Group packages into topological levels (see [`topo_levels`])
pub fn topo_sort(graph: &DependencyGraph, packages: &[Package]) -> ReleaseResult<Vec<Vec<Package>>> {
  let by_name: BTreeMap<&str, &Package> = packages.iter().map(|p| (p.name.as_str(), p)).collect();
  let levels = topo_levels(graph)?;
  Ok(
    levels
      .into_iter()
      .map(|level| {
        level
          .iter()
          .filter_map(|name| by_name.get(name.as_str()).map(|p| (*p).clone()))
          .collect()
      })
      .collect(),
  )
}
