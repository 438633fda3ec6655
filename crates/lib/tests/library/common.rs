//! Shared helpers for library integration tests.

use std::path::Path;

use mk_lib::rule::RuleStore;
use mk_lib::vars::Vars;
use mk_lib::{BuildContext, BuildOptions, mkfile};
use tempfile::TempDir;

/// A build directory holding an mkfile read into a context.
pub struct Project {
  pub dir: TempDir,
}

impl Project {
  pub fn new() -> Self {
    Self {
      dir: TempDir::new().unwrap(),
    }
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  /// Read `text` as the mkfile and apply `tweak` to the default options.
  pub fn context(&self, text: &str, tweak: impl FnOnce(&mut BuildOptions)) -> BuildContext {
    let mut rules = RuleStore::new();
    let mut vars = Vars::new();
    mkfile::read_str(text, "mkfile", self.path(), &mut rules, &mut vars).unwrap();
    let mut options = BuildOptions {
      dir: self.path().to_path_buf(),
      ..BuildOptions::default()
    };
    tweak(&mut options);
    BuildContext::new(rules, vars, options)
  }

  pub fn lines(&self, name: &str) -> Vec<String> {
    std::fs::read_to_string(self.path().join(name))
      .map(|s| s.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }

  pub fn exists(&self, name: &str) -> bool {
    self.path().join(name).exists()
  }
}

pub fn targets(names: &[&str]) -> Vec<String> {
  names.iter().map(|s| s.to_string()).collect()
}
