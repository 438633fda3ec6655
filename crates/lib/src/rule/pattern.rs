//! Target patterns: literal names, `%`/`&` templates and regular expressions.

use regex::Regex;

use crate::error::{Location, MkError};

/// What a pattern captured from a target name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stem {
  /// `$stem`: the wildcard text of a template, or the first capture group
  /// of a regex (the whole match when the regex has no groups).
  pub stem: String,
  /// `$stem0`..`$stem9` for regex rules; empty for templates.
  pub captures: Vec<String>,
}

impl Stem {
  /// The automatic bindings this stem contributes to a recipe.
  pub fn bindings(&self) -> Vec<(String, String)> {
    let mut out = vec![("stem".to_string(), self.stem.clone())];
    for (i, capture) in self.captures.iter().enumerate().take(10) {
      out.push((format!("stem{i}"), capture.clone()));
    }
    out
  }
}

/// Matching capability shared by templates and regexes.
pub trait Matcher {
  /// Match the whole of `name`, returning the captured stem.
  fn matches(&self, name: &str) -> Option<Stem>;

  /// Length of the literal text; longer is more specific.
  fn specificity(&self) -> usize;

  /// Substitute the stem into one prerequisite pattern.
  fn instantiate(&self, prereq: &str, stem: &Stem) -> String;
}

/// The wildcard character of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wildcard {
  /// `%`: any non-empty text.
  Percent,
  /// `&`: any non-empty text without `/` or `.`.
  Ampersand,
}

impl Wildcard {
  fn as_char(self) -> char {
    match self {
      Wildcard::Percent => '%',
      Wildcard::Ampersand => '&',
    }
  }
}

/// A `prefix%suffix` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
  prefix: String,
  suffix: String,
  wildcard: Wildcard,
}

impl Template {
  /// Parse a target word; `None` when it has no wildcard.
  pub fn parse(word: &str) -> Option<Self> {
    let (pos, wildcard) = match word.find('%') {
      Some(pos) => (pos, Wildcard::Percent),
      None => (word.find('&')?, Wildcard::Ampersand),
    };
    Some(Self {
      prefix: word[..pos].to_string(),
      suffix: word[pos + 1..].to_string(),
      wildcard,
    })
  }
}

impl Matcher for Template {
  fn matches(&self, name: &str) -> Option<Stem> {
    if name.len() <= self.prefix.len() + self.suffix.len() {
      return None;
    }
    let stem = name.strip_prefix(self.prefix.as_str())?.strip_suffix(self.suffix.as_str())?;
    if self.wildcard == Wildcard::Ampersand && stem.contains(['/', '.']) {
      return None;
    }
    Some(Stem {
      stem: stem.to_string(),
      captures: Vec::new(),
    })
  }

  fn specificity(&self) -> usize {
    self.prefix.len() + self.suffix.len()
  }

  fn instantiate(&self, prereq: &str, stem: &Stem) -> String {
    prereq.replace(self.wildcard.as_char(), &stem.stem)
  }
}

/// A regular expression anchored to the whole target name.
#[derive(Debug, Clone)]
pub struct RegexPattern {
  source: String,
  regex: Regex,
}

impl RegexPattern {
  pub fn new(source: &str, location: &Location) -> Result<Self, MkError> {
    let regex = Regex::new(&format!("^(?:{source})$"))
      .map_err(|e| MkError::config(location, format!("regular expression error; {e}")))?;
    Ok(Self {
      source: source.to_string(),
      regex,
    })
  }
}

impl PartialEq for RegexPattern {
  fn eq(&self, other: &Self) -> bool {
    self.source == other.source
  }
}

impl Eq for RegexPattern {}

impl Matcher for RegexPattern {
  fn matches(&self, name: &str) -> Option<Stem> {
    let caps = self.regex.captures(name)?;
    let captures: Vec<String> = caps
      .iter()
      .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
      .collect();
    let stem = captures.get(1).unwrap_or(&captures[0]).clone();
    Some(Stem { stem, captures })
  }

  fn specificity(&self) -> usize {
    literal_len(&self.source)
  }

  /// Replace `\0`..`\9` with the corresponding capture.
  fn instantiate(&self, prereq: &str, stem: &Stem) -> String {
    let mut out = String::with_capacity(prereq.len());
    let mut chars = prereq.chars().peekable();
    while let Some(c) = chars.next() {
      if c == '\\'
        && let Some(d) = chars.peek().and_then(|d| d.to_digit(10))
      {
        chars.next();
        if let Some(capture) = stem.captures.get(d as usize) {
          out.push_str(capture);
        }
        continue;
      }
      out.push(c);
    }
    out
  }
}

/// Count the characters of a regex that match only themselves.
fn literal_len(source: &str) -> usize {
  let mut count = 0;
  let mut chars = source.chars();
  while let Some(c) = chars.next() {
    match c {
      '\\' => {
        // \d, \w, \1 and friends are classes or references; \. is a literal.
        if let Some(next) = chars.next()
          && !next.is_ascii_alphanumeric()
        {
          count += 1;
        }
      }
      '[' => {
        for c in chars.by_ref() {
          if c == ']' {
            break;
          }
        }
      }
      '{' => {
        for c in chars.by_ref() {
          if c == '}' {
            break;
          }
        }
      }
      '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '|' => {}
      _ => count += 1,
    }
  }
  count
}

/// How a rule's target is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetPattern {
  Literal(String),
  Template(Template),
  Regex(RegexPattern),
}

impl TargetPattern {
  /// Classify a target word. `regex` comes from the rule's `R` attribute.
  pub fn new(word: &str, regex: bool, location: &Location) -> Result<Self, MkError> {
    if regex {
      return Ok(TargetPattern::Regex(RegexPattern::new(word, location)?));
    }
    Ok(match Template::parse(word) {
      Some(template) => TargetPattern::Template(template),
      None => TargetPattern::Literal(word.to_string()),
    })
  }

  pub fn is_meta(&self) -> bool {
    !matches!(self, TargetPattern::Literal(_))
  }

  pub fn matcher(&self) -> Option<&dyn Matcher> {
    match self {
      TargetPattern::Literal(_) => None,
      TargetPattern::Template(t) => Some(t),
      TargetPattern::Regex(r) => Some(r),
    }
  }
}
