mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mk_lib::BuildOptions;

use crate::cmd::Invocation;
use crate::output::{OutputFormat, print_error};

/// mk - maintain (make) related files
#[derive(Parser, Debug)]
#[command(name = "mk")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Assume all targets are out of date
  #[arg(short = 'a', long = "all")]
  force_all: bool,

  /// Debug output: p (parsing), g (graph), e (execution); `-d` alone enables all
  #[arg(long, value_name = "FLAGS")]
  debug: Option<String>,

  /// Explain why each target is made
  #[arg(short = 'e', long)]
  explain: bool,

  /// Read rules from this mkfile instead of ./mkfile
  #[arg(short = 'f', long = "file", value_name = "MKFILE")]
  files: Vec<PathBuf>,

  /// Ignore recipe failures
  #[arg(short = 'i', long = "ignore-errors")]
  ignore_errors: bool,

  /// Keep building targets that do not depend on a failed one
  #[arg(short = 'k', long = "keep-going")]
  keep_going: bool,

  /// Print recipes without running them
  #[arg(short = 'n', long = "dry-run")]
  dry_run: bool,

  /// Build the targets one after another
  #[arg(short = 's', long)]
  sequential: bool,

  /// Touch out-of-date targets instead of running their recipes
  #[arg(short = 't', long)]
  touch: bool,

  /// Print a summary when the build ends
  #[arg(short = 'u', long)]
  usage: bool,

  /// Pretend these targets were just modified (comma separated)
  #[arg(short = 'w', long = "what-if", value_name = "TARGETS", value_delimiter = ',')]
  what_if: Vec<String>,

  /// Number of recipes to run at once (overrides NPROC)
  #[arg(short = 'j', long, value_parser = clap::value_parser!(u32).range(1..))]
  jobs: Option<u32>,

  /// Output format for the build report
  #[arg(long, value_enum, default_value_t)]
  format: OutputFormat,

  /// Targets to build, and name=value variable assignments
  args: Vec<String>,
}

impl Cli {
  /// Flags as mk would pass them to a nested mk.
  fn flags(&self) -> Vec<String> {
    let switches = [
      (self.force_all, "-a"),
      (self.explain, "-e"),
      (self.ignore_errors, "-i"),
      (self.keep_going, "-k"),
      (self.dry_run, "-n"),
      (self.sequential, "-s"),
      (self.touch, "-t"),
      (self.usage, "-u"),
    ];
    let mut flags: Vec<String> = switches
      .iter()
      .filter(|(set, _)| *set)
      .map(|(_, flag)| flag.to_string())
      .collect();
    if let Some(debug) = &self.debug {
      flags.push(format!("-d{debug}"));
    }
    for target in &self.what_if {
      flags.push(format!("-w{target}"));
    }
    if let Some(jobs) = self.jobs {
      flags.push(format!("-j{jobs}"));
    }
    flags
  }

  fn into_invocation(self) -> Invocation {
    let flags = self.flags();
    let (assignments, targets) = split_args(self.args);
    let options = BuildOptions {
      dry_run: self.dry_run,
      force_all: self.force_all,
      keep_going: self.keep_going,
      ignore_errors: self.ignore_errors,
      touch: self.touch,
      explain: self.explain,
      what_if: self.what_if,
      ..BuildOptions::default()
    };
    Invocation {
      options,
      mkfiles: self.files,
      assignments,
      targets,
      flags,
      jobs: self.jobs.map(|j| j as usize),
      sequential: self.sequential,
      usage: self.usage,
      dump: self.debug.as_deref().is_some_and(|d| d.contains('p')),
      format: self.format,
    }
  }
}

/// Flags that take no value and may share a cluster with `-d`.
const SWITCHES: &str = "aeiknstu";

/// Rewrite `-d` clusters into `--debug=..` so clap sees one long option.
///
/// The `p`/`g`/`e` letters right after `d` are debug letters (none means
/// all three); switches before `d` and anything after the debug letters
/// stay short flags, so `-nd` and `-dn` both mean `-n -d`.
fn normalize_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
  let mut out = Vec::new();
  let mut rest = false;
  for arg in args {
    if rest {
      out.push(arg);
      continue;
    }
    if arg == "--" {
      rest = true;
      out.push(arg);
    } else if let Some(split) = split_debug_cluster(&arg) {
      out.extend(split);
    } else {
      out.push(arg);
    }
  }
  out
}

fn split_debug_cluster(arg: &str) -> Option<Vec<String>> {
  let body = arg.strip_prefix('-').filter(|b| !b.starts_with('-'))?;
  let at = body.find('d')?;
  let (before, after) = (&body[..at], &body[at + 1..]);
  if !before.chars().all(|c| SWITCHES.contains(c)) {
    return None;
  }
  let end = after.find(|c| !matches!(c, 'p' | 'g' | 'e')).unwrap_or(after.len());
  let (letters, trailing) = after.split_at(end);

  let mut out = Vec::new();
  if !before.is_empty() {
    out.push(format!("-{before}"));
  }
  out.push(format!("--debug={}", if letters.is_empty() { "pge" } else { letters }));
  if !trailing.is_empty() {
    out.push(format!("-{trailing}"));
  }
  Some(out)
}

/// Separate `name=value` assignments from targets.
fn split_args(args: Vec<String>) -> (Vec<(String, String)>, Vec<String>) {
  let mut assignments = Vec::new();
  let mut targets = Vec::new();
  for arg in args {
    match arg.split_once('=') {
      Some((name, value)) if is_var_name(name) => assignments.push((name.to_string(), value.to_string())),
      _ => targets.push(arg),
    }
  }
  (assignments, targets)
}

fn is_var_name(name: &str) -> bool {
  name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Filter directives for the `-d` letters.
fn debug_directives(flags: &str) -> Vec<&'static str> {
  let mut directives = Vec::new();
  for flag in flags.chars() {
    match flag {
      'p' => directives.extend(["mk_lib::mkfile=debug", "mk_lib::rule=debug"]),
      'g' => directives.extend(["mk_lib::graph=debug", "mk_lib::resolve=debug"]),
      'e' => directives.extend(["mk_lib::execute=debug", "mk_lib::stale=debug"]),
      _ => {}
    }
  }
  directives
}

fn init_logging(debug: Option<&str>) -> Result<()> {
  let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  for directive in debug_directives(debug.unwrap_or_default()) {
    filter = filter.add_directive(directive.parse().context("Invalid log directive")?);
  }
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
  Ok(())
}

fn run(cli: Cli) -> Result<bool> {
  if let Some(debug) = &cli.debug
    && let Some(bad) = debug.chars().find(|c| !matches!(c, 'p' | 'g' | 'e'))
  {
    anyhow::bail!("unknown debug flag '{bad}'");
  }
  init_logging(cli.debug.as_deref())?;
  cmd::cmd_mk(cli.into_invocation())
}

fn main() -> ExitCode {
  let cli = Cli::parse_from(normalize_args(std::env::args()));

  match run(cli) {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      print_error(&format!("mk: {e:#}"));
      ExitCode::FAILURE
    }
  }
}
