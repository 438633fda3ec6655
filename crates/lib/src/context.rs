//! The build context: everything one invocation of mk owns.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::MkError;
use crate::execute::{self, BuildOptions, BuildReport};
use crate::graph::{BuildGraph, GraphBuilder};
use crate::mkfile;
use crate::rule::RuleStore;
use crate::vars::Vars;

/// File read when no `-f` is given.
pub const DEFAULT_MKFILE: &str = "mkfile";

/// Name of the virtual node grouping several requested targets.
const ROOT_TARGET: &str = "<command line>";

/// Rules, variables and options for one invocation. The rule store is
/// read-only once the context exists.
#[derive(Debug)]
pub struct BuildContext {
  rules: RuleStore,
  vars: Vars,
  options: BuildOptions,
}

impl BuildContext {
  pub fn new(rules: RuleStore, vars: Vars, options: BuildOptions) -> Self {
    Self { rules, vars, options }
  }

  /// Read `mkfiles` (or `mkfile` in the build directory, if present) on
  /// top of `vars`.
  ///
  /// # Errors
  ///
  /// Returns the first read, parse or rule registration error.
  pub fn load(mkfiles: &[PathBuf], mut vars: Vars, options: BuildOptions) -> Result<Self, MkError> {
    let mut rules = RuleStore::new();
    if mkfiles.is_empty() {
      let default = options.dir.join(DEFAULT_MKFILE);
      if default.is_file() {
        mkfile::read_file(&default, &mut rules, &mut vars)?;
      }
    } else {
      for file in mkfiles {
        mkfile::read_file(&options.dir.join(file), &mut rules, &mut vars)?;
      }
    }
    info!(rules = rules.len(), variables = vars.len(), "mkfiles read");
    Ok(Self::new(rules, vars, options))
  }

  pub fn rules(&self) -> &RuleStore {
    &self.rules
  }

  pub fn vars(&self) -> &Vars {
    &self.vars
  }

  pub fn options(&self) -> &BuildOptions {
    &self.options
  }

  /// Apply `NPROC`, `MKSHELL` and the `-j` value to the options.
  pub fn configure(&mut self, jobs: Option<usize>) {
    configure(&mut self.options, &self.vars, jobs);
  }

  /// Build `targets`, or the default targets when none are given.
  ///
  /// Several targets share one graph under a virtual root unless
  /// `sequential` is set, in which case each is built to completion in
  /// turn. Default targets are always built in turn.
  ///
  /// # Errors
  ///
  /// `NothingToMk` when there is nothing to build; `UnknownTarget`,
  /// `Cycle` and fatal `Io` errors abort the invocation before (or
  /// instead of) running further recipes.
  pub async fn mk(&self, targets: &[String], sequential: bool) -> Result<BuildReport, MkError> {
    let (targets, sequential) = if targets.is_empty() {
      (self.rules.default_targets(), true)
    } else {
      (targets, sequential)
    };
    if targets.is_empty() {
      return Err(MkError::NothingToMk);
    }

    let dir = self.options.dir.as_path();
    let mut graph = BuildGraph::new();

    if sequential || targets.len() == 1 {
      let mut report = BuildReport::default();
      for target in targets {
        debug!(target = %target, "mk");
        let root = self.builder(dir, &mut graph).build(target)?;
        let partial = execute::execute(&mut graph, root, &self.options, &self.vars).await?;
        let failed = !partial.is_success();
        report.extend(partial);
        if failed && !self.options.keep_going {
          break;
        }
      }
      return Ok(report);
    }

    let root = self.builder(dir, &mut graph).build_root(ROOT_TARGET, targets)?;
    execute::execute(&mut graph, root, &self.options, &self.vars).await
  }

  fn builder<'g>(&'g self, dir: &'g Path, graph: &'g mut BuildGraph) -> GraphBuilder<'g> {
    GraphBuilder::new(&self.rules, dir, graph).with_nreps(self.options.nreps)
  }
}

/// Fill in options the variable table may provide.
///
/// `NPROC` sets the parallelism when `jobs` (the `-j` flag) is absent and
/// the value is a positive integer; `MKSHELL` sets the shell unless one is
/// already chosen.
pub fn configure(options: &mut BuildOptions, vars: &Vars, jobs: Option<usize>) {
  let nproc = vars
    .joined("NPROC")
    .and_then(|v| v.trim().parse::<usize>().ok())
    .filter(|&n| n > 0);
  options.parallelism = jobs.or(nproc).unwrap_or(1).max(1);

  if options.shell.is_none() {
    options.shell = vars.joined("MKSHELL").filter(|s| !s.trim().is_empty());
  }
}
