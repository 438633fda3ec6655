//! mkfile reader.
//!
//! Turns mkfile text into rules and variable assignments:
//!
//! ```text
//! CFLAGS=-O2
//! <common.mk
//! prog: main.o util.o
//!     cc -o $target $prereq
//! %.o: %.c
//!     cc $CFLAGS -c $stem.c
//! clean:V:
//!     rm -f *.o prog
//! ```
//!
//! Headers and assignments are variable-expanded as they are read; recipe
//! lines are kept verbatim for the recipe runner.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Location, MkError};
use crate::rule::{RuleSpec, RuleStore};
use crate::vars::{Vars, expand, split_words};

const MAX_INCLUDE_DEPTH: usize = 16;

/// Read the mkfile at `path` into `store` and `vars`.
///
/// # Errors
///
/// `Io` when the file (or an included file) cannot be read, `Parse` for
/// malformed lines, `Config` for invalid rules.
pub fn read_file(path: &Path, store: &mut RuleStore, vars: &mut Vars) -> Result<(), MkError> {
  Reader { store, vars }.file(path, 0)
}

/// Read mkfile text. `name` is used in locations; includes are resolved
/// against `dir`.
pub fn read_str(text: &str, name: &str, dir: &Path, store: &mut RuleStore, vars: &mut Vars) -> Result<(), MkError> {
  Reader { store, vars }.text(text, name, dir, 0)
}

/// Log the parsed state at debug level.
pub fn dump(store: &RuleStore, vars: &Vars) {
  debug!(targets = ?store.default_targets(), "default targets");
  for rule in store.rules().filter(|r| !r.is_meta()) {
    debug!("rule {rule}");
  }
  for rule in store.rules().filter(|r| r.is_meta()) {
    debug!("metarule {rule}");
  }
  for (name, words) in vars.iter() {
    debug!("variable {name}={}", words.join(" "));
  }
}

struct Reader<'a> {
  store: &'a mut RuleStore,
  vars: &'a mut Vars,
}

/// One logical line: comments removed, continuations joined.
struct Line<'t> {
  text: String,
  number: usize,
  /// Raw physical line, for recipe bodies.
  raw: &'t str,
}

impl Reader<'_> {
  fn file(&mut self, path: &Path, depth: usize) -> Result<(), MkError> {
    let text = fs::read_to_string(path).map_err(|e| MkError::io(path, e))?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    debug!(file = %path.display(), "reading mkfile");
    self.text(&text, &path.display().to_string(), &dir, depth)
  }

  fn text(&mut self, text: &str, name: &str, dir: &Path, depth: usize) -> Result<(), MkError> {
    let physical: Vec<&str> = text.lines().collect();
    let mut i = 0;

    while i < physical.len() {
      let line = logical_line(&physical, &mut i);
      let location = Location::new(name, line.number);

      if line.raw.starts_with([' ', '\t']) {
        if line.text.trim().is_empty() {
          continue;
        }
        return Err(MkError::parse(location, "recipe line without a rule"));
      }
      let content = line.text.trim();
      if content.is_empty() {
        continue;
      }

      if let Some(include) = content.strip_prefix('<') {
        if depth >= MAX_INCLUDE_DEPTH {
          return Err(MkError::parse(location, "includes nested too deeply"));
        }
        let words = split_words(&expand(include, &*self.vars));
        let [file] = words.as_slice() else {
          return Err(MkError::parse(location, "expected one file name after '<'"));
        };
        self.file(&dir.join(file), depth + 1)?;
        continue;
      }

      if let Some((var, value)) = assignment(content) {
        let words = split_words(&expand(value, &*self.vars));
        trace!(variable = %var, value = ?words, "assignment");
        self.vars.set(var, words);
        continue;
      }

      let Some((targets, rest)) = content.split_once(':') else {
        return Err(MkError::parse(location, "expected one of ':' '=' '<'"));
      };
      let (attrs, prereqs) = match rest.split_once(':') {
        Some((attrs, prereqs)) => (attrs.trim(), prereqs),
        None => ("", rest),
      };

      let targets = split_words(&expand(targets, &*self.vars));
      if targets.is_empty() {
        return Err(MkError::parse(location, "missing target"));
      }
      let prereqs = split_words(&expand(prereqs, &*self.vars));
      let recipe = recipe_lines(&physical, &mut i);

      self.store.add_rule(RuleSpec {
        targets,
        prereqs,
        attrs: attrs.to_string(),
        recipe,
        location,
      })?;
    }
    Ok(())
  }
}

/// `name=value` when the text before the first `=` is a variable name
/// and no `:` precedes it.
fn assignment(content: &str) -> Option<(&str, &str)> {
  let eq = content.find('=')?;
  if content.find(':').is_some_and(|colon| colon < eq) {
    return None;
  }
  let name = content[..eq].trim();
  let valid = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
  valid.then(|| (name, &content[eq + 1..]))
}

/// Read the logical line starting at `physical[*i]`, advancing `i` past it.
fn logical_line<'t>(physical: &[&'t str], i: &mut usize) -> Line<'t> {
  let number = *i + 1;
  let raw = physical[*i];
  let mut text = String::new();

  loop {
    let current = strip_comment(physical[*i]);
    *i += 1;
    match current.strip_suffix('\\') {
      Some(joined) if *i < physical.len() => {
        text.push_str(joined);
        text.push(' ');
      }
      Some(joined) => {
        text.push_str(joined);
        break;
      }
      None => {
        text.push_str(current);
        break;
      }
    }
  }

  Line { text, number, raw }
}

/// Drop a `#` comment that is not inside single quotes.
fn strip_comment(line: &str) -> &str {
  let mut quoted = false;
  for (pos, c) in line.char_indices() {
    match c {
      '\'' => quoted = !quoted,
      '#' if !quoted => return &line[..pos],
      _ => {}
    }
  }
  line
}

/// Collect the indented lines following a rule header, minus their first
/// whitespace character.
fn recipe_lines(physical: &[&str], i: &mut usize) -> String {
  let mut lines = Vec::new();
  while *i < physical.len() {
    let line = physical[*i];
    let mut chars = line.chars();
    match chars.next() {
      Some(' ' | '\t') => lines.push(chars.as_str()),
      _ => break,
    }
    *i += 1;
  }
  lines.join("\n")
}
