//! Recipe scheduling.
//!
//! A single coordinator owns every node's state. Nodes whose prerequisites
//! have all reached a terminal state are settled in turn: skipped when a
//! prerequisite failed, finished on the spot when up to date, touched, or
//! queued for a recipe. Queued recipes start on blocking worker threads,
//! at most `parallelism` at a time, each holding a numbered job slot.
//!
//! Without keep-going, the first failure stops new recipes from starting;
//! recipes already running are waited for.

pub mod recipe;
pub mod types;

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use petgraph::graph::NodeIndex;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::MkError;
use crate::graph::{BuildGraph, NodeState};
use crate::stale::{MTime, PrereqView, StaleReason, Staleness, StalenessEvaluator, TargetView, stat_mtime, touch};
use crate::vars::Vars;

pub use recipe::{Bindings, Job, JobStatus};
pub use types::{BuildOptions, BuildReport, NodeReport, Outcome};

/// Bring `root` and everything it depends on up to date.
///
/// Nodes already terminal from an earlier run over the same graph are left
/// alone. Per-node recipe failures are recorded in the report.
///
/// # Errors
///
/// Returns `Io` when a target cannot be examined for a reason other than
/// its absence. Recipes already running are waited for first.
pub async fn execute(
  graph: &mut BuildGraph,
  root: NodeIndex,
  options: &BuildOptions,
  vars: &Vars,
) -> Result<BuildReport, MkError> {
  Scheduler::new(graph, options, vars).run(root).await
}

struct Scheduler<'a> {
  graph: &'a mut BuildGraph,
  options: &'a BuildOptions,
  vars: &'a Vars,
  report: BuildReport,
  /// Nodes this run is responsible for.
  scope: HashSet<NodeIndex>,
  /// Unfinished prerequisites per node.
  pending: HashMap<NodeIndex, usize>,
  /// Prerequisites finished; not yet settled.
  ready: VecDeque<NodeIndex>,
  /// Stale, waiting for a job slot.
  runnable: VecDeque<NodeIndex>,
  free_slots: Vec<usize>,
  running: HashMap<Id, (NodeIndex, Job)>,
  reasons: HashMap<NodeIndex, StaleReason>,
  /// Set on the first failure without keep-going.
  halted: bool,
  fatal: Option<MkError>,
  stat: fn(&Path) -> Result<MTime, MkError>,
}

impl<'a> Scheduler<'a> {
  fn new(graph: &'a mut BuildGraph, options: &'a BuildOptions, vars: &'a Vars) -> Self {
    let slots = options.parallelism.max(1);
    Self {
      graph,
      options,
      vars,
      report: BuildReport::default(),
      scope: HashSet::new(),
      pending: HashMap::new(),
      ready: VecDeque::new(),
      runnable: VecDeque::new(),
      free_slots: (0..slots).rev().collect(),
      running: HashMap::new(),
      reasons: HashMap::new(),
      halted: false,
      fatal: None,
      stat: stat_mtime,
    }
  }

  #[cfg(test)]
  fn with_stat(mut self, stat: fn(&Path) -> Result<MTime, MkError>) -> Self {
    self.stat = stat;
    self
  }

  async fn run(mut self, root: NodeIndex) -> Result<BuildReport, MkError> {
    let order: Vec<NodeIndex> = self
      .graph
      .reachable(root)
      .into_iter()
      .filter(|&idx| !self.graph.node(idx).state().is_terminal())
      .collect();
    self.scope = order.iter().copied().collect();

    for idx in order {
      let unfinished = self
        .graph
        .unique_prereqs(idx)
        .into_iter()
        .filter(|p| self.scope.contains(p))
        .count();
      if unfinished == 0 {
        self.ready.push_back(idx);
      } else {
        self.pending.insert(idx, unfinished);
      }
    }

    info!(
      nodes = self.scope.len(),
      parallelism = self.free_slots.len(),
      "starting build"
    );

    let mut jobs: JoinSet<JobStatus> = JoinSet::new();
    loop {
      while let Some(idx) = self.ready.pop_front() {
        if let Err(e) = self.settle(idx) {
          error!(error = %e, "aborting build");
          self.skip(idx, None);
          self.halted = true;
          self.fatal.get_or_insert(e);
        }
      }

      if self.halted {
        while let Some(idx) = self.runnable.pop_front() {
          self.skip(idx, None);
        }
      }

      while !self.runnable.is_empty()
        && let Some(slot) = self.free_slots.pop()
      {
        let Some(idx) = self.runnable.pop_front() else {
          break;
        };
        self.start(idx, slot, &mut jobs);
      }

      if !self.ready.is_empty() {
        continue;
      }

      let Some(joined) = jobs.join_next_with_id().await else {
        break;
      };
      let (id, status) = match joined {
        Ok((id, status)) => (id, status),
        Err(e) => {
          error!(error = %e, "recipe task panicked");
          (e.id(), JobStatus::SpawnFailed(e.to_string()))
        }
      };
      if let Some((idx, job)) = self.running.remove(&id) {
        self.free_slots.push(job.slot);
        self.complete(idx, &job, status);
      }
    }

    info!(
      done = self.report.count(Outcome::Done),
      failed = self.report.count(Outcome::Failed),
      skipped = self.report.count(Outcome::Skipped),
      jobs = self.report.jobs_run,
      "build complete"
    );

    match self.fatal {
      Some(e) => Err(e),
      None => Ok(self.report),
    }
  }

  /// Decide what to do with a node whose prerequisites are all terminal.
  fn settle(&mut self, idx: NodeIndex) -> Result<(), MkError> {
    let prereqs = self.graph.unique_prereqs(idx);
    if let Some(&blocker) = prereqs
      .iter()
      .find(|&&p| matches!(self.graph.node(p).state(), NodeState::Failed | NodeState::Skipped))
    {
      let name = self.graph.node(blocker).name.clone();
      self.skip(idx, Some(name));
      return Ok(());
    }
    if self.halted {
      self.skip(idx, None);
      return Ok(());
    }

    self.graph.node_mut(idx).advance(NodeState::Ready);
    let node = self.graph.node(idx);
    let name = node.name.clone();
    let is_virtual = node.is_virtual();
    let is_source = node.rule.is_none();
    let synthetic = node.synthetic;
    let what_if = self.options.what_if.iter().any(|w| *w == name);

    let mtime = if is_virtual {
      None
    } else {
      (self.stat)(&self.options.dir.join(&name))?
    };
    self.graph.node_mut(idx).mtime = mtime;

    // Source files are up to date unless named on the what-if list.
    if is_source && !what_if {
      self.finish(idx, NodeState::Done, false);
      return Ok(());
    }

    let staleness = {
      let views = self.prereq_views(&prereqs);
      let target = TargetView {
        name: &name,
        is_virtual,
        mtime,
      };
      StalenessEvaluator::new(self.options).evaluate(target, &views)
    };
    let Staleness::Stale(reason) = staleness else {
      debug!(target = %name, "up to date");
      self.finish(idx, NodeState::Done, false);
      return Ok(());
    };

    debug!(target = %name, reason = %reason, "out of date");
    if self.options.explain && !synthetic {
      println!("mk: {name}: {reason}");
    }
    self.reasons.insert(idx, reason);

    if what_if {
      self.finish(idx, NodeState::Done, true);
      return Ok(());
    }

    let node = self.graph.node(idx);
    if !node.has_recipe() {
      let attrs = node.rule.as_ref().map(|r| r.attrs).unwrap_or_default();
      let rebuilt = attrs.no_recipe_updates
        || is_virtual
        || prereqs.iter().any(|&p| self.graph.node(p).rebuilt);
      self.finish(idx, NodeState::Done, rebuilt);
      return Ok(());
    }

    if self.options.touch {
      println!("touch({name})");
      if !self.options.dry_run && !is_virtual {
        let path = self.options.dir.join(&name);
        if let Err(e) = touch(&path) {
          self.fail(idx, e.to_string());
          return Ok(());
        }
        self.graph.node_mut(idx).mtime = (self.stat)(&path)?;
      }
      self.finish(idx, NodeState::Done, true);
      return Ok(());
    }

    self.runnable.push_back(idx);
    Ok(())
  }

  /// Echo a node's recipe and hand it to a worker.
  fn start(&mut self, idx: NodeIndex, slot: usize, jobs: &mut JoinSet<JobStatus>) {
    let job = self.prepare(idx, slot);
    let quiet = self
      .graph
      .node(idx)
      .rule
      .as_ref()
      .is_some_and(|r| r.attrs.quiet);
    if !quiet {
      println!("{}", job.script);
    }

    self.graph.node_mut(idx).advance(NodeState::Running);
    if self.options.dry_run {
      self.free_slots.push(slot);
      self.finish(idx, NodeState::Done, true);
      return;
    }

    self.report.jobs_run += 1;
    let worker = job.clone();
    let handle = jobs.spawn_blocking(move || worker.run());
    self.running.insert(handle.id(), (idx, job));
  }

  fn prepare(&self, idx: NodeIndex, slot: usize) -> Job {
    let node = self.graph.node(idx);
    let unique = self.graph.unique_prereqs(idx);
    let views = self.prereq_views(&unique);
    let target = TargetView {
      name: &node.name,
      is_virtual: node.is_virtual(),
      mtime: node.mtime,
    };
    let newprereq = StalenessEvaluator::new(self.options)
      .newer_prereqs(target, &views)
      .into_iter()
      .map(str::to_string)
      .collect();

    let (recipe, export, alltarget) = match &node.rule {
      Some(rule) => (rule.recipe.as_str(), !rule.attrs.no_export, rule.targets.clone()),
      None => ("", true, Vec::new()),
    };
    let bindings = Bindings {
      target: node.name.clone(),
      prereqs: node.prereqs.iter().map(|&p| self.graph.node(p).name.clone()).collect(),
      stem: node.stem.clone(),
      alltarget,
      newprereq,
      slot,
    };
    Job::new(
      recipe,
      &bindings,
      self.vars,
      export,
      self.options.shell.as_deref(),
      self.options.dir.clone(),
    )
  }

  /// Handle a finished recipe.
  fn complete(&mut self, idx: NodeIndex, job: &Job, status: JobStatus) {
    let ignore_rule = self
      .graph
      .node(idx)
      .rule
      .as_ref()
      .is_some_and(|r| r.attrs.ignore_errors);

    match status {
      JobStatus::Success => self.recipe_done(idx),
      JobStatus::SpawnFailed(msg) => self.fail(idx, format!("cannot start shell: {msg}")),
      status if ignore_rule || self.options.ignore_errors => {
        let message = format!("recipe for '{}' failed: {status} (ignored)", job.target);
        warn!(target = %job.target, status = %status, "ignoring recipe failure");
        self.report.warnings.push(message);
        self.recipe_done(idx);
      }
      status => self.fail(idx, status.to_string()),
    }
  }

  /// A recipe succeeded: re-examine the target and mark it done.
  fn recipe_done(&mut self, idx: NodeIndex) {
    let node = self.graph.node(idx);
    let before = node.mtime;
    let forced = node.is_virtual() || node.rule.as_ref().is_some_and(|r| r.attrs.update_in_place);
    let path = self.options.dir.join(&node.name);

    let after = match (self.stat)(&path) {
      Ok(after) => after,
      Err(e) => {
        self.fatal.get_or_insert(e);
        self.halted = true;
        None
      }
    };
    self.graph.node_mut(idx).mtime = after;
    let rebuilt = forced || after.is_none() || after != before;
    self.finish(idx, NodeState::Done, rebuilt);
  }

  fn fail(&mut self, idx: NodeIndex, message: String) {
    let node = self.graph.node(idx);
    let name = node.name.clone();
    let err = MkError::RecipeExecution {
      target: name.clone(),
      message,
    };
    error!(target = %name, error = %err, "recipe failed");

    let delete = node.rule.as_ref().is_some_and(|r| r.attrs.delete_on_error) && !node.is_virtual();
    if delete {
      let path = self.options.dir.join(&name);
      if path.exists() {
        match std::fs::remove_file(&path) {
          Ok(()) => info!(target = %name, "deleted target after failed recipe"),
          Err(e) => warn!(target = %name, error = %e, "cannot delete target"),
        }
      }
    }

    if !self.options.keep_going {
      self.halted = true;
    }
    self.record(idx, Outcome::Failed, Some(err.to_string()), None);
    self.graph.node_mut(idx).advance(NodeState::Failed);
    self.release_dependents(idx);
  }

  fn skip(&mut self, idx: NodeIndex, blocked_by: Option<String>) {
    if let Some(cause) = &blocked_by {
      warn!(target = %self.graph.node(idx).name, blocked_by = %cause, "skipping");
    }
    self.record(idx, Outcome::Skipped, None, blocked_by);
    self.graph.node_mut(idx).advance(NodeState::Skipped);
    self.release_dependents(idx);
  }

  fn finish(&mut self, idx: NodeIndex, state: NodeState, rebuilt: bool) {
    self.graph.node_mut(idx).rebuilt = rebuilt;
    self.record(idx, Outcome::Done, None, None);
    self.graph.node_mut(idx).advance(state);
    self.release_dependents(idx);
  }

  fn record(&mut self, idx: NodeIndex, outcome: Outcome, error: Option<String>, blocked_by: Option<String>) {
    let node = self.graph.node(idx);
    if node.synthetic {
      return;
    }
    self.report.nodes.push(NodeReport {
      target: node.name.clone(),
      outcome,
      ran: node.state() == NodeState::Running,
      rebuilt: node.rebuilt,
      reason: self.reasons.get(&idx).map(ToString::to_string),
      error,
      blocked_by,
    });
  }

  /// Let dependents of a finished node settle once nothing else holds them.
  fn release_dependents(&mut self, idx: NodeIndex) {
    let dependents: Vec<NodeIndex> = self
      .graph
      .dependents(idx)
      .filter(|d| self.scope.contains(d))
      .collect();
    for dependent in dependents {
      if let Some(count) = self.pending.get_mut(&dependent) {
        *count -= 1;
        if *count == 0 {
          self.pending.remove(&dependent);
          self.ready.push_back(dependent);
        }
      }
    }
  }

  fn prereq_views(&self, prereqs: &[NodeIndex]) -> Vec<PrereqView<'_>> {
    prereqs
      .iter()
      .map(|&p| {
        let node = self.graph.node(p);
        PrereqView {
          name: &node.name,
          mtime: node.mtime,
          rebuilt: node.rebuilt,
        }
      })
      .collect()
  }
}
