//! Options and results for a build run.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::resolve::DEFAULT_NREPS;

/// Flags controlling one invocation.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  /// Print recipes instead of running them.
  pub dry_run: bool,
  /// Treat every target as out of date.
  pub force_all: bool,
  /// Keep building independent branches after a failure.
  pub keep_going: bool,
  /// Downgrade recipe failures to warnings.
  pub ignore_errors: bool,
  /// Update stale targets' times instead of running recipes.
  pub touch: bool,
  /// Maximum number of recipes running at once.
  pub parallelism: usize,
  /// Print why each stale target is stale.
  pub explain: bool,
  /// Targets to treat as freshly rebuilt.
  pub what_if: Vec<String>,
  /// Command interpreter; `/bin/sh` when unset.
  pub shell: Option<String>,
  /// Directory target names are resolved against and recipes run in.
  pub dir: PathBuf,
  /// A prerequisite with the same time as its target makes it stale.
  pub equal_is_stale: bool,
  /// How often one meta-rule may apply along a dependency chain.
  pub nreps: usize,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      dry_run: false,
      force_all: false,
      keep_going: false,
      ignore_errors: false,
      touch: false,
      parallelism: 1,
      explain: false,
      what_if: Vec::new(),
      shell: None,
      dir: PathBuf::from("."),
      equal_is_stale: false,
      nreps: DEFAULT_NREPS,
    }
  }
}

/// Terminal state of a node, as reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
  Done,
  Failed,
  Skipped,
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Outcome::Done => write!(f, "done"),
      Outcome::Failed => write!(f, "failed"),
      Outcome::Skipped => write!(f, "skipped"),
    }
  }
}

/// What happened to one target.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
  pub target: String,
  pub outcome: Outcome,
  /// A recipe process was started (or would have been, in dry-run mode).
  pub ran: bool,
  pub rebuilt: bool,
  /// Why the target was out of date.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  /// For skipped nodes, the prerequisite that failed or was skipped.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub blocked_by: Option<String>,
}

/// Result of one build run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
  /// Nodes in the order they reached a terminal state.
  pub nodes: Vec<NodeReport>,
  /// Recipe processes spawned.
  pub jobs_run: usize,
  /// Failures that were ignored.
  pub warnings: Vec<String>,
}

impl BuildReport {
  /// Returns true if no node failed or was skipped.
  pub fn is_success(&self) -> bool {
    self.nodes.iter().all(|n| n.outcome == Outcome::Done)
  }

  pub fn count(&self, outcome: Outcome) -> usize {
    self.nodes.iter().filter(|n| n.outcome == outcome).count()
  }

  /// Error messages of failed nodes.
  pub fn errors(&self) -> impl Iterator<Item = &str> {
    self.nodes.iter().filter_map(|n| n.error.as_deref())
  }

  pub fn get(&self, target: &str) -> Option<&NodeReport> {
    self.nodes.iter().find(|n| n.target == target)
  }

  pub fn outcome(&self, target: &str) -> Option<Outcome> {
    self.get(target).map(|n| n.outcome)
  }

  /// Append the results of a later run.
  pub fn extend(&mut self, other: BuildReport) {
    self.nodes.extend(other.nodes);
    self.jobs_run += other.jobs_run;
    self.warnings.extend(other.warnings);
  }
}
