//! Out-of-date decisions.
//!
//! A node is stale when, in priority order: force-all is on, it is virtual,
//! its file is missing, it is on the what-if list, a prerequisite was
//! rebuilt this run after the target was last written, or a prerequisite's
//! file is newer than the target's.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use tracing::warn;

use crate::error::MkError;
use crate::execute::BuildOptions;

/// A file's modification time; `None` when the file does not exist.
pub type MTime = Option<SystemTime>;

/// Whether a path exists, following symlinks.
pub fn file_exists(path: &Path) -> bool {
  fs::metadata(path).is_ok()
}

/// Stat a target.
///
/// A missing file is `Ok(None)`. Permission errors are fatal; any other
/// failure is logged and treated as missing so the target is rebuilt.
pub fn stat_mtime(path: &Path) -> Result<MTime, MkError> {
  match fs::metadata(path) {
    Ok(meta) => Ok(meta.modified().ok()),
    Err(e) => stat_error(path, e),
  }
}

/// Map a failed stat of `path` onto the missing-or-fatal policy.
pub fn stat_error(path: &Path, e: io::Error) -> Result<MTime, MkError> {
  match e.kind() {
    io::ErrorKind::NotFound => Ok(None),
    io::ErrorKind::PermissionDenied => Err(MkError::io(path, e)),
    _ => {
      warn!(path = %path.display(), error = %e, "cannot stat, treating as missing");
      Ok(None)
    }
  }
}

/// Set a file's modification time to now, creating it if needed.
pub fn touch(path: &Path) -> Result<(), MkError> {
  let file: File = OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .map_err(|e| MkError::io(path, e))?;
  file.set_modified(SystemTime::now()).map_err(|e| MkError::io(path, e))
}

/// Why a node must be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
  ForceAll,
  Virtual,
  Missing,
  WhatIf,
  PrereqRebuilt(String),
  PrereqNewer(String),
}

impl fmt::Display for StaleReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StaleReason::ForceAll => write!(f, "all targets forced"),
      StaleReason::Virtual => write!(f, "virtual target"),
      StaleReason::Missing => write!(f, "target does not exist"),
      StaleReason::WhatIf => write!(f, "assumed modified"),
      StaleReason::PrereqRebuilt(p) => write!(f, "{p} was rebuilt"),
      StaleReason::PrereqNewer(p) => write!(f, "{p} is newer"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
  Fresh,
  Stale(StaleReason),
}

impl Staleness {
  pub fn is_stale(&self) -> bool {
    matches!(self, Staleness::Stale(_))
  }
}

/// What the evaluator needs to know about a node.
#[derive(Debug, Clone, Copy)]
pub struct TargetView<'a> {
  pub name: &'a str,
  pub is_virtual: bool,
  pub mtime: MTime,
}

/// What the evaluator needs to know about a finished prerequisite.
#[derive(Debug, Clone, Copy)]
pub struct PrereqView<'a> {
  pub name: &'a str,
  pub mtime: MTime,
  /// Rebuilt during this invocation.
  pub rebuilt: bool,
}

pub struct StalenessEvaluator<'a> {
  options: &'a BuildOptions,
}

impl<'a> StalenessEvaluator<'a> {
  pub fn new(options: &'a BuildOptions) -> Self {
    Self { options }
  }

  pub fn evaluate(&self, target: TargetView<'_>, prereqs: &[PrereqView<'_>]) -> Staleness {
    if self.options.force_all {
      return Staleness::Stale(StaleReason::ForceAll);
    }
    if target.is_virtual {
      return Staleness::Stale(StaleReason::Virtual);
    }
    let Some(target_time) = target.mtime else {
      return Staleness::Stale(StaleReason::Missing);
    };
    if self.options.what_if.iter().any(|w| w == target.name) {
      return Staleness::Stale(StaleReason::WhatIf);
    }

    // A rebuilt prerequisite counts as written "now", whatever the
    // filesystem's timestamp resolution made of it.
    let now = SystemTime::now();
    if let Some(p) = prereqs.iter().find(|p| p.rebuilt && now > target_time) {
      return Staleness::Stale(StaleReason::PrereqRebuilt(p.name.to_string()));
    }

    let newest = prereqs
      .iter()
      .filter_map(|p| p.mtime.map(|t| (t, p.name)))
      .max_by_key(|(t, _)| *t);
    if let Some((time, name)) = newest
      && (time > target_time || (self.options.equal_is_stale && time == target_time))
    {
      return Staleness::Stale(StaleReason::PrereqNewer(name.to_string()));
    }

    Staleness::Fresh
  }

  /// Prerequisites that were rebuilt or are newer than the target
  /// (`$newprereq`).
  pub fn newer_prereqs<'p>(&self, target: TargetView<'_>, prereqs: &[PrereqView<'p>]) -> Vec<&'p str> {
    prereqs
      .iter()
      .filter(|p| match (target.mtime, p.mtime) {
        _ if p.rebuilt => true,
        (None, _) => true,
        (Some(t), Some(pt)) => pt > t,
        (Some(_), None) => false,
      })
      .map(|p| p.name)
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  fn ago(secs: u64) -> MTime {
    Some(SystemTime::now() - Duration::from_secs(secs))
  }

  fn target(mtime: MTime) -> TargetView<'static> {
    TargetView {
      name: "out",
      is_virtual: false,
      mtime,
    }
  }

  fn prereq(name: &'static str, mtime: MTime, rebuilt: bool) -> PrereqView<'static> {
    PrereqView { name, mtime, rebuilt }
  }

  #[test]
  fn up_to_date_target_is_fresh() {
    let options = BuildOptions::default();
    let eval = StalenessEvaluator::new(&options);
    let result = eval.evaluate(target(ago(10)), &[prereq("in", ago(100), false)]);
    assert_eq!(result, Staleness::Fresh);
  }

  #[test]
  fn missing_target_is_stale() {
    let options = BuildOptions::default();
    let eval = StalenessEvaluator::new(&options);
    assert_eq!(
      eval.evaluate(target(None), &[]),
      Staleness::Stale(StaleReason::Missing)
    );
  }

  #[test]
  fn virtual_and_force_all_win() {
    let options = BuildOptions::default();
    let eval = StalenessEvaluator::new(&options);
    let view = TargetView {
      name: "clean",
      is_virtual: true,
      mtime: ago(1),
    };
    assert_eq!(eval.evaluate(view, &[]), Staleness::Stale(StaleReason::Virtual));

    let options = BuildOptions {
      force_all: true,
      ..BuildOptions::default()
    };
    let eval = StalenessEvaluator::new(&options);
    assert_eq!(
      eval.evaluate(target(ago(1)), &[]),
      Staleness::Stale(StaleReason::ForceAll)
    );
  }

  #[test]
  fn newer_prereq_makes_target_stale() {
    let options = BuildOptions::default();
    let eval = StalenessEvaluator::new(&options);
    let result = eval.evaluate(
      target(ago(100)),
      &[prereq("old", ago(200), false), prereq("new", ago(10), false)],
    );
    assert_eq!(result, Staleness::Stale(StaleReason::PrereqNewer("new".into())));
  }

  #[test]
  fn equal_times_follow_policy() {
    let when = ago(50);
    let options = BuildOptions::default();
    let eval = StalenessEvaluator::new(&options);
    assert_eq!(eval.evaluate(target(when), &[prereq("in", when, false)]), Staleness::Fresh);

    let options = BuildOptions {
      equal_is_stale: true,
      ..BuildOptions::default()
    };
    let eval = StalenessEvaluator::new(&options);
    assert!(eval.evaluate(target(when), &[prereq("in", when, false)]).is_stale());
  }

  #[test]
  fn rebuilt_prereq_counts_as_now() {
    let options = BuildOptions::default();
    let eval = StalenessEvaluator::new(&options);
    // On-disk time older than the target, but rebuilt this run.
    let result = eval.evaluate(target(ago(10)), &[prereq("gen.h", ago(1000), true)]);
    assert_eq!(result, Staleness::Stale(StaleReason::PrereqRebuilt("gen.h".into())));
  }

  #[test]
  fn what_if_marks_existing_target() {
    let options = BuildOptions {
      what_if: vec!["out".into()],
      ..BuildOptions::default()
    };
    let eval = StalenessEvaluator::new(&options);
    assert_eq!(eval.evaluate(target(ago(1)), &[]), Staleness::Stale(StaleReason::WhatIf));
  }

  #[test]
  fn newer_prereqs_lists_rebuilt_and_newer() {
    let options = BuildOptions::default();
    let eval = StalenessEvaluator::new(&options);
    let prereqs = [
      prereq("a", ago(500), false),
      prereq("b", ago(5), false),
      prereq("c", ago(500), true),
    ];
    assert_eq!(eval.newer_prereqs(target(ago(100)), &prereqs), vec!["b", "c"]);
    assert_eq!(eval.newer_prereqs(target(None), &prereqs), vec!["a", "b", "c"]);
  }

  #[test]
  fn stat_and_touch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stamp");

    assert_eq!(stat_mtime(&path).unwrap(), None);
    touch(&path).unwrap();
    let first = stat_mtime(&path).unwrap().unwrap();
    assert!(file_exists(&path));

    let old = SystemTime::now() - Duration::from_secs(3600);
    File::options().write(true).open(&path).unwrap().set_modified(old).unwrap();
    assert!(stat_mtime(&path).unwrap().unwrap() < first);

    touch(&path).unwrap();
    assert!(stat_mtime(&path).unwrap().unwrap() > old);
  }

  #[test]
  fn permission_denied_is_fatal() {
    let path = Path::new("locked/target");
    let denied = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");

    match stat_error(path, denied) {
      Err(MkError::Io { path: p, source }) => {
        assert_eq!(p, path);
        assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
      }
      other => panic!("expected fatal io error, got {other:?}"),
    }
    assert_eq!(stat_error(path, io::ErrorKind::NotFound.into()).unwrap(), None);
  }

  #[cfg(unix)]
  #[test]
  #[traced_test]
  fn unexpected_stat_error_counts_as_missing() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("plain");
    std::fs::write(&file, "").unwrap();

    // A path through a regular file fails with ENOTDIR, not ENOENT.
    assert_eq!(stat_mtime(&file.join("child")).unwrap(), None);
    assert!(logs_contain("cannot stat"));
  }
}
