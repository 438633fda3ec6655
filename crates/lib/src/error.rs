//! Error types for mk.
//!
//! Every error that can abort an invocation is an [`MkError`]. Recipe
//! failures local to a single target are not errors at this level: the
//! scheduler records them in the [`BuildReport`](crate::execute::BuildReport)
//! and keeps going according to the failure policy.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Where a rule (or a parse error) came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
  pub file: String,
  pub line: usize,
}

impl Location {
  pub fn new(file: impl Into<String>, line: usize) -> Self {
    Self {
      file: file.into(),
      line,
    }
  }

  /// Location used for rules synthesized by mk itself.
  pub fn builtin() -> Self {
    Self::new("<builtin>", 0)
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.file, self.line)
  }
}

/// Errors that abort an mk invocation.
#[derive(Debug, Error)]
pub enum MkError {
  /// No rule matches and no such file exists.
  #[error("don't know how to make '{target}'{}", needed_by.as_ref().map(|p| format!(" (needed by '{p}')")).unwrap_or_default())]
  UnknownTarget { target: String, needed_by: Option<String> },

  /// The dependency graph contains a cycle. `path` starts and ends at the
  /// same target.
  #[error("dependency cycle: {}", path.join(" -> "))]
  Cycle { path: Vec<String> },

  /// Invalid rule set, detected while registering rules.
  #[error("{location}: {message}")]
  Config { location: Location, message: String },

  /// Malformed mkfile text.
  #[error("{location}: syntax error: {message}")]
  Parse { location: Location, message: String },

  /// A recipe could not be run, or exited unsuccessfully.
  #[error("recipe for '{target}' failed: {message}")]
  RecipeExecution { target: String, message: String },

  /// A filesystem access failed in a way that cannot be treated as
  /// "target missing".
  #[error("{}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// No targets were requested and the mkfile declares none.
  #[error("nothing to mk")]
  NothingToMk,
}

impl MkError {
  pub fn config(location: &Location, message: impl Into<String>) -> Self {
    MkError::Config {
      location: location.clone(),
      message: message.into(),
    }
  }

  pub fn parse(location: Location, message: impl Into<String>) -> Self {
    MkError::Parse {
      location,
      message: message.into(),
    }
  }

  pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    MkError::Io {
      path: path.into(),
      source,
    }
  }
}

pub type Result<T, E = MkError> = std::result::Result<T, E>;
