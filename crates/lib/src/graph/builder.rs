//! Recursive graph construction with cycle detection.

use std::path::Path;

use petgraph::graph::NodeIndex;
use tracing::{debug, trace};

use super::{BuildGraph, Node, NodeState};
use crate::error::{Location, MkError};
use crate::resolve::{ChainUsage, Resolution, ResolvedRule, Resolver};
use crate::rule::{Attributes, RuleStore};

/// Builds nodes for requested targets into a [`BuildGraph`].
///
/// A node is marked `Resolving` while its prerequisites are being visited;
/// reaching it again in that state is a cycle.
pub struct GraphBuilder<'a> {
  resolver: Resolver<'a>,
  graph: &'a mut BuildGraph,
  path: Vec<String>,
  usage: ChainUsage,
}

impl<'a> GraphBuilder<'a> {
  pub fn new(store: &'a RuleStore, dir: &'a Path, graph: &'a mut BuildGraph) -> Self {
    Self {
      resolver: Resolver::new(store, dir),
      graph,
      path: Vec::new(),
      usage: ChainUsage::default(),
    }
  }

  pub fn with_nreps(mut self, nreps: usize) -> Self {
    self.resolver = self.resolver.with_nreps(nreps);
    self
  }

  /// Resolve `name` and everything it depends on.
  ///
  /// # Errors
  ///
  /// `UnknownTarget` when a name has no rule and no file, `Cycle` when a
  /// name is reached again through its own prerequisites.
  pub fn build(&mut self, name: &str) -> Result<NodeIndex, MkError> {
    let idx = self.visit(name, None)?;
    self.graph.verify_acyclic()?;
    Ok(idx)
  }

  /// Add a virtual node named `name` whose prerequisites are `targets`.
  pub fn build_root(&mut self, name: &str, targets: &[String]) -> Result<NodeIndex, MkError> {
    let rule = ResolvedRule {
      prereqs: targets.to_vec(),
      recipe: String::new(),
      attrs: Attributes {
        virtual_target: true,
        ..Attributes::default()
      },
      location: Location::builtin(),
      targets: vec![name.to_string()],
    };
    let mut node = Node::new(name, Some(rule), None);
    node.synthetic = true;
    node.advance(NodeState::Resolving);
    let root = self.graph.add(node);

    for target in targets {
      let prereq = self.visit(target, None)?;
      self.graph.link(prereq, root);
    }
    self.graph.node_mut(root).advance(NodeState::Waiting);
    self.graph.verify_acyclic()?;
    Ok(root)
  }

  fn visit(&mut self, name: &str, needed_by: Option<&str>) -> Result<NodeIndex, MkError> {
    if let Some(idx) = self.graph.lookup(name) {
      if self.graph.node(idx).state() == NodeState::Resolving {
        return Err(self.cycle(name));
      }
      trace!(target = %name, "memoized");
      return Ok(idx);
    }

    let (rule, stem, meta) = match self.resolver.resolve(name, &self.usage) {
      Resolution::Explicit(rule) => (Some(rule), None, None),
      Resolution::Pattern { rule, stem, id } => (Some(rule), Some(stem), Some(id)),
      Resolution::SourceLeaf => (None, None, None),
      Resolution::Unresolvable => {
        return Err(MkError::UnknownTarget {
          target: name.to_string(),
          needed_by: needed_by.map(str::to_string),
        });
      }
    };

    let prereqs = rule.as_ref().map(|r| r.prereqs.clone()).unwrap_or_default();
    let mut node = Node::new(name, rule, stem);
    node.advance(NodeState::Resolving);
    let idx = self.graph.add(node);
    debug!(target = %name, prereqs = prereqs.len(), "node");

    self.path.push(name.to_string());
    if let Some(id) = meta {
      self.usage.enter(id);
    }
    for prereq in &prereqs {
      let p = self.visit(prereq, Some(name))?;
      self.graph.link(p, idx);
    }
    if let Some(id) = meta {
      self.usage.leave(id);
    }
    self.path.pop();

    self.graph.node_mut(idx).advance(NodeState::Waiting);
    Ok(idx)
  }

  /// The cycle closed by reaching `name` again.
  fn cycle(&self, name: &str) -> MkError {
    let start = self.path.iter().position(|p| p == name).unwrap_or(0);
    let mut path: Vec<String> = self.path[start..].to_vec();
    path.push(name.to_string());
    MkError::Cycle { path }
  }
}
