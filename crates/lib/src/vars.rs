//! Variable table and `$name` expansion.
//!
//! Variables hold word lists. They are expanded in two ways:
//!
//! - [`expand`] is used on rule headers and assignments while reading an
//!   mkfile. Unknown variables expand to nothing and `$$` is a literal `$`.
//! - [`substitute_known`] is used on recipe text. Only names the lookup
//!   knows about are replaced; everything else (including `$HOME` or `$$`)
//!   is left for the shell.

use std::collections::{BTreeMap, HashSet};

/// Something that can answer "what is `$name`?".
pub trait VarLookup {
  fn lookup(&self, name: &str) -> Option<String>;
}

/// The variable table.
#[derive(Debug, Clone, Default)]
pub struct Vars {
  values: BTreeMap<String, Vec<String>>,
  /// Names set on the command line; mkfile assignments to them are ignored.
  overridden: HashSet<String>,
}

impl Vars {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start from a copy of the process environment.
  pub fn from_env() -> Self {
    let mut vars = Self::new();
    for (name, value) in std::env::vars() {
      vars.values.insert(name, vec![value]);
    }
    vars
  }

  /// Assign a variable, unless it was overridden on the command line.
  pub fn set(&mut self, name: impl Into<String>, words: Vec<String>) {
    let name = name.into();
    if self.overridden.contains(&name) {
      return;
    }
    self.values.insert(name, words);
  }

  /// Assign a variable that later [`Vars::set`] calls cannot replace.
  pub fn set_override(&mut self, name: impl Into<String>, words: Vec<String>) {
    let name = name.into();
    self.values.insert(name.clone(), words);
    self.overridden.insert(name);
  }

  pub fn get(&self, name: &str) -> Option<&[String]> {
    self.values.get(name).map(Vec::as_slice)
  }

  /// The value joined with single spaces.
  pub fn joined(&self, name: &str) -> Option<String> {
    self.get(name).map(|words| words.join(" "))
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
    self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

impl VarLookup for Vars {
  fn lookup(&self, name: &str) -> Option<String> {
    self.joined(name)
  }
}

impl VarLookup for BTreeMap<String, String> {
  fn lookup(&self, name: &str) -> Option<String> {
    self.get(name).cloned()
  }
}

/// Expand every `$name` and `${name}`; unknown names become empty.
pub fn expand(text: &str, vars: &impl VarLookup) -> String {
  scan(text, vars, true)
}

/// Replace only the `$name`/`${name}` references `vars` can resolve.
pub fn substitute_known(text: &str, vars: &impl VarLookup) -> String {
  scan(text, vars, false)
}

fn is_name_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_'
}

fn scan(text: &str, vars: &impl VarLookup, strict: bool) -> String {
  let mut out = String::with_capacity(text.len());
  let mut rest = text;

  while let Some(pos) = rest.find('$') {
    out.push_str(&rest[..pos]);
    let after = &rest[pos + 1..];

    if strict && after.starts_with('$') {
      out.push('$');
      rest = &after[1..];
      continue;
    }

    // ${name}
    if let Some(inner) = after.strip_prefix('{')
      && let Some(close) = inner.find('}')
    {
      let name = &inner[..close];
      let consumed = 1 + close + 1;
      match vars.lookup(name) {
        Some(value) => out.push_str(&value),
        None if strict => {}
        None => out.push_str(&rest[pos..pos + 1 + consumed]),
      }
      rest = &after[consumed..];
      continue;
    }

    // $name
    if after.starts_with(is_name_start) {
      let len = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
      let name = &after[..len];
      match vars.lookup(name) {
        Some(value) => out.push_str(&value),
        None if strict => {}
        None => {
          out.push('$');
          out.push_str(name);
        }
      }
      rest = &after[len..];
      continue;
    }

    out.push('$');
    rest = after;
  }

  out.push_str(rest);
  out
}

/// Split text into words on whitespace. Single quotes group words and a
/// doubled quote inside quotes is a literal quote.
pub fn split_words(text: &str) -> Vec<String> {
  let mut words = Vec::new();
  let mut word = String::new();
  let mut in_word = false;
  let mut chars = text.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '\'' => {
        in_word = true;
        while let Some(q) = chars.next() {
          if q == '\'' {
            if chars.peek() == Some(&'\'') {
              chars.next();
              word.push('\'');
            } else {
              break;
            }
          } else {
            word.push(q);
          }
        }
      }
      c if c.is_whitespace() => {
        if in_word {
          words.push(std::mem::take(&mut word));
          in_word = false;
        }
      }
      c => {
        in_word = true;
        word.push(c);
      }
    }
  }

  if in_word {
    words.push(word);
  }
  words
}
