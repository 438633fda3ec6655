//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated build directory.
///
/// Each test gets its own temporary directory holding the mkfile, the
/// sources and everything the recipes produce.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create from a fixture file, copied to `mkfile`.
  pub fn from_fixture(name: &str) -> Self {
    let env = Self::empty();
    env.write_file("mkfile", &fixture_content(name));
    env
  }

  /// Create from mkfile text.
  pub fn with_mkfile(text: &str) -> Self {
    let env = Self::empty();
    env.write_file("mkfile", text);
    env
  }

  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn exists(&self, relative_path: &str) -> bool {
    self.temp.path().join(relative_path).exists()
  }

  /// Lines of a file the recipes appended to; empty if it does not exist.
  pub fn lines(&self, relative_path: &str) -> Vec<String> {
    std::fs::read_to_string(self.temp.path().join(relative_path))
      .map(|s| s.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }

  /// A Command for the mk binary running in the temp directory, with
  /// logging reset to the default level.
  pub fn mk_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("mk");
    cmd.current_dir(self.temp.path());
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("NPROC");
    cmd.env_remove("MKSHELL");
    cmd
  }
}
