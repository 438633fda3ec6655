//! Recipe preparation and execution.
//!
//! A [`Job`] is a recipe with its automatic variables already substituted,
//! ready to hand to the command interpreter. Running it blocks the calling
//! thread until the process exits.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::vars::{Vars, substitute_known};

/// Automatic variables for one recipe.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
  pub target: String,
  pub prereqs: Vec<String>,
  pub stem: Option<crate::rule::Stem>,
  pub alltarget: Vec<String>,
  pub newprereq: Vec<String>,
  pub slot: usize,
}

impl Bindings {
  /// The variable map substituted into the recipe and exported to it.
  pub fn to_map(&self) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("target".to_string(), self.target.clone());
    map.insert("prereq".to_string(), self.prereqs.join(" "));
    map.insert("alltarget".to_string(), self.alltarget.join(" "));
    map.insert("newprereq".to_string(), self.newprereq.join(" "));
    map.insert("pid".to_string(), std::process::id().to_string());
    map.insert("nproc".to_string(), self.slot.to_string());
    match &self.stem {
      Some(stem) => map.extend(stem.bindings()),
      None => {
        map.insert("stem".to_string(), String::new());
      }
    }
    map
  }
}

/// Rewrite recipe lines that start with `-` so that only their own failure
/// is ignored.
///
/// For a POSIX shell `-rm x` becomes `{ rm x; } || echo ... >&2`, which
/// survives `sh -e` and reports the masked status on stderr. Other
/// interpreters do not stop at a failing line, so the `-` is dropped.
pub fn mask_ignored_lines(recipe: &str, posix: bool) -> String {
  let lines: Vec<String> = recipe
    .lines()
    .map(|line| {
      let body = line.trim_start();
      let indent = &line[..line.len() - body.len()];
      let Some(rest) = body.strip_prefix('-') else {
        return line.to_string();
      };
      let command = rest.trim().trim_end_matches(';').trim_end();
      if !posix || command.is_empty() {
        return format!("{indent}{command}");
      }
      format!("{indent}{{ {command}; }} || echo \"mk: $target: ignoring exit status $?\" >&2")
    })
    .collect();
  lines.join("\n")
}

/// Get the shell command and its arguments.
///
/// The default `/bin/sh -e -c` stops a recipe at its first failing line.
/// An override is split into words; its flag is chosen from its name.
pub fn shell_command(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell
    && let Some((program, rest)) = shell.split_whitespace().collect::<Vec<_>>().split_first()
  {
    let mut args: Vec<String> = rest.iter().map(|s| s.to_string()).collect();
    if program.contains("powershell") || program.contains("pwsh") {
      args.extend(["-NoProfile".to_string(), "-Command".to_string()]);
    } else if program.ends_with("cmd") || program.ends_with("cmd.exe") {
      args.push("/C".to_string());
    } else {
      args.push("-c".to_string());
    }
    return (program.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-e".to_string(), "-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}

/// How a recipe process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
  Success,
  /// Exited unsuccessfully; `None` when killed by a signal.
  Exited(Option<i32>),
  /// The interpreter could not be started.
  SpawnFailed(String),
}

impl JobStatus {
  pub fn is_success(&self) -> bool {
    matches!(self, JobStatus::Success)
  }
}

impl fmt::Display for JobStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      JobStatus::Success => write!(f, "success"),
      JobStatus::Exited(Some(code)) => write!(f, "exit status {code}"),
      JobStatus::Exited(None) => write!(f, "terminated by signal"),
      JobStatus::SpawnFailed(msg) => write!(f, "cannot start shell: {msg}"),
    }
  }
}

/// One recipe execution.
#[derive(Debug, Clone)]
pub struct Job {
  pub target: String,
  /// Recipe text after substitution, `-` lines masked.
  pub script: String,
  pub shell: String,
  pub shell_args: Vec<String>,
  /// Added to the inherited environment.
  pub env: Vec<(String, String)>,
  pub dir: PathBuf,
  pub slot: usize,
}

impl Job {
  /// Prepare the recipe `raw` for execution.
  ///
  /// `vars` is exported unless `export` is false; the automatic bindings
  /// are always exported.
  pub fn new(raw: &str, bindings: &Bindings, vars: &Vars, export: bool, shell: Option<&str>, dir: PathBuf) -> Self {
    let auto = bindings.to_map();
    let (shell, shell_args) = shell_command(shell);
    let posix = shell_args.last().is_some_and(|flag| flag == "-c");
    let script = mask_ignored_lines(&substitute_known(raw, &auto), posix);

    let mut env: Vec<(String, String)> = Vec::new();
    if export {
      env.extend(vars.iter().map(|(name, words)| (name.to_string(), words.join(" "))));
    }
    env.extend(auto);

    Self {
      target: bindings.target.clone(),
      script,
      shell,
      shell_args,
      env,
      dir,
      slot: bindings.slot,
    }
  }

  /// Run the recipe to completion. Standard I/O is inherited.
  pub fn run(&self) -> JobStatus {
    debug!(target = %self.target, shell = %self.shell, slot = self.slot, "spawning recipe");
    let status = Command::new(&self.shell)
      .args(&self.shell_args)
      .arg(&self.script)
      .current_dir(&self.dir)
      .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
      .status();

    match status {
      Ok(status) if status.success() => JobStatus::Success,
      Ok(status) => JobStatus::Exited(status.code()),
      Err(e) => JobStatus::SpawnFailed(e.to_string()),
    }
  }
}
