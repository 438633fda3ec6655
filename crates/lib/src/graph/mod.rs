//! The build graph.
//!
//! Nodes live in a petgraph arena and are memoized by target name. Edges
//! run from a prerequisite to its dependent; each node additionally keeps
//! its prerequisites in the order the rule listed them.

pub mod builder;

use std::collections::HashMap;
use std::fmt;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::error::MkError;
use crate::resolve::ResolvedRule;
use crate::rule::Stem;
use crate::stale::MTime;

pub use builder::GraphBuilder;

/// Where a node is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
  Unvisited,
  Resolving,
  Waiting,
  Ready,
  Running,
  Done,
  Failed,
  Skipped,
}

impl NodeState {
  fn rank(self) -> u8 {
    match self {
      NodeState::Unvisited => 0,
      NodeState::Resolving => 1,
      NodeState::Waiting => 2,
      NodeState::Ready => 3,
      NodeState::Running => 4,
      NodeState::Done | NodeState::Failed | NodeState::Skipped => 5,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, NodeState::Done | NodeState::Failed | NodeState::Skipped)
  }
}

impl fmt::Display for NodeState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      NodeState::Unvisited => "unvisited",
      NodeState::Resolving => "resolving",
      NodeState::Waiting => "waiting",
      NodeState::Ready => "ready",
      NodeState::Running => "running",
      NodeState::Done => "done",
      NodeState::Failed => "failed",
      NodeState::Skipped => "skipped",
    };
    f.write_str(s)
  }
}

/// One target of the build.
#[derive(Debug, Clone)]
pub struct Node {
  pub name: String,
  /// `None` for source files.
  pub rule: Option<ResolvedRule>,
  pub stem: Option<Stem>,
  /// Prerequisites in rule order; may repeat.
  pub prereqs: Vec<NodeIndex>,
  state: NodeState,
  /// Modification time as last observed.
  pub mtime: MTime,
  /// Set when the node was brought up to date during this invocation.
  pub rebuilt: bool,
  /// Inserted by mk itself to group several requested targets.
  pub synthetic: bool,
}

impl Node {
  pub fn new(name: impl Into<String>, rule: Option<ResolvedRule>, stem: Option<Stem>) -> Self {
    Self {
      name: name.into(),
      rule,
      stem,
      prereqs: Vec::new(),
      state: NodeState::Unvisited,
      mtime: None,
      rebuilt: false,
      synthetic: false,
    }
  }

  pub fn state(&self) -> NodeState {
    self.state
  }

  /// Move to `next`. Terminal states are final.
  pub fn advance(&mut self, next: NodeState) {
    debug_assert!(
      next.rank() > self.state.rank(),
      "{}: illegal transition {} -> {}",
      self.name,
      self.state,
      next
    );
    self.state = next;
  }

  pub fn is_virtual(&self) -> bool {
    self.rule.as_ref().is_some_and(|r| r.attrs.virtual_target)
  }

  pub fn has_recipe(&self) -> bool {
    self.rule.as_ref().is_some_and(ResolvedRule::has_recipe)
  }
}

/// Every node reached while resolving the requested targets.
#[derive(Debug, Default)]
pub struct BuildGraph {
  graph: DiGraph<Node, ()>,
  by_name: HashMap<String, NodeIndex>,
}

impl BuildGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, node: Node) -> NodeIndex {
    let name = node.name.clone();
    let idx = self.graph.add_node(node);
    self.by_name.insert(name, idx);
    idx
  }

  /// Record that `dependent` needs `prereq`.
  pub fn link(&mut self, prereq: NodeIndex, dependent: NodeIndex) {
    self.graph[dependent].prereqs.push(prereq);
    self.graph.update_edge(prereq, dependent, ());
  }

  pub fn lookup(&self, name: &str) -> Option<NodeIndex> {
    self.by_name.get(name).copied()
  }

  pub fn node(&self, idx: NodeIndex) -> &Node {
    &self.graph[idx]
  }

  pub fn node_mut(&mut self, idx: NodeIndex) -> &mut Node {
    &mut self.graph[idx]
  }

  /// Nodes that list `idx` as a prerequisite.
  pub fn dependents(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
    self.graph.neighbors_directed(idx, Direction::Outgoing)
  }

  /// Distinct prerequisites of `idx`, in first-listed order.
  pub fn unique_prereqs(&self, idx: NodeIndex) -> Vec<NodeIndex> {
    let mut seen = Vec::new();
    for &p in &self.graph[idx].prereqs {
      if !seen.contains(&p) {
        seen.push(p);
      }
    }
    seen
  }

  /// `root` and everything it depends on, prerequisites before dependents.
  pub fn reachable(&self, root: NodeIndex) -> Vec<NodeIndex> {
    let mut order = Vec::new();
    let mut seen = vec![false; self.graph.node_count()];
    let mut stack = vec![(root, false)];
    while let Some((idx, expanded)) = stack.pop() {
      if expanded {
        order.push(idx);
        continue;
      }
      if seen[idx.index()] {
        continue;
      }
      seen[idx.index()] = true;
      stack.push((idx, true));
      for &p in self.graph[idx].prereqs.iter().rev() {
        if !seen[p.index()] {
          stack.push((p, false));
        }
      }
    }
    order
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Verify that the graph is acyclic.
  pub fn verify_acyclic(&self) -> Result<(), MkError> {
    toposort(&self.graph, None).map_err(|cycle| {
      let name = self.graph[cycle.node_id()].name.clone();
      MkError::Cycle {
        path: vec![name.clone(), name],
      }
    })?;
    Ok(())
  }
}
