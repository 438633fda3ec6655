//! Test utilities for mk-lib.
//!
//! Helpers for tests that need on-disk fixtures with controlled
//! modification times.

use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::rule::{RuleSpec, RuleStore};

/// Set a file's modification time to `secs` seconds in the past.
pub fn set_mtime_ago(path: &Path, secs: u64) {
  let when = SystemTime::now() - Duration::from_secs(secs);
  File::options()
    .write(true)
    .open(path)
    .unwrap()
    .set_modified(when)
    .unwrap();
}

/// Create `path` (empty) with a modification time `secs` seconds ago.
pub fn create_aged(path: &Path, secs: u64) {
  std::fs::write(path, "").unwrap();
  set_mtime_ago(path, secs);
}

/// Lines of a file a recipe appended to; empty when it was never written.
pub fn read_lines(path: &Path) -> Vec<String> {
  match std::fs::read_to_string(path) {
    Ok(content) => content.lines().map(str::to_string).collect(),
    Err(_) => Vec::new(),
  }
}

/// A store holding `specs`, registered in order.
pub fn store_of(specs: Vec<RuleSpec>) -> RuleStore {
  let mut store = RuleStore::new();
  for spec in specs {
    store.add_rule(spec).unwrap();
  }
  store
}
