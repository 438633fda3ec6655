//! Implementation of a build run.
//!
//! Seeds the variable table, reads the mkfiles, builds the requested
//! targets and reports the result.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use mk_lib::vars::{Vars, split_words};
use mk_lib::{BuildContext, BuildOptions, mkfile};

use crate::output::{OutputFormat, print_error, print_json, print_summary, print_warning};

/// Everything taken from the command line for one build.
#[derive(Debug, Default)]
pub struct Invocation {
  pub options: BuildOptions,
  pub mkfiles: Vec<PathBuf>,
  /// `name=value` arguments.
  pub assignments: Vec<(String, String)>,
  pub targets: Vec<String>,
  /// The flags as given, for `MKFLAGS`.
  pub flags: Vec<String>,
  pub jobs: Option<usize>,
  pub sequential: bool,
  pub usage: bool,
  pub dump: bool,
  pub format: OutputFormat,
}

/// Run the build. Returns whether every node finished `Done`.
pub fn cmd_mk(invocation: Invocation) -> Result<bool> {
  let Invocation {
    options,
    mkfiles,
    assignments,
    targets,
    flags,
    jobs,
    sequential,
    usage,
    dump,
    format,
  } = invocation;

  let mut vars = Vars::from_env();
  for (name, value) in &assignments {
    vars.set_override(name.as_str(), split_words(value));
  }
  vars.set("MKFLAGS", flags);
  vars.set("MKARGS", targets.clone());

  let mut ctx = BuildContext::load(&mkfiles, vars, options)?;
  ctx.configure(jobs);
  if dump {
    mkfile::dump(ctx.rules(), ctx.vars());
  }
  debug!(
    parallelism = ctx.options().parallelism,
    shell = ?ctx.options().shell,
    "options"
  );

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(ctx.mk(&targets, sequential))?;
  let elapsed = started.elapsed();

  for warning in &report.warnings {
    print_warning(&format!("mk: {warning}"));
  }
  for error in report.errors() {
    print_error(&format!("mk: {error}"));
  }

  if format.is_json() {
    print_json(&report)?;
  } else if usage {
    print_summary(&report, elapsed);
  }

  Ok(report.is_success())
}
