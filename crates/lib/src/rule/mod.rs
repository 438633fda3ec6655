//! Rules and the rule store.
//!
//! A rule is registered once per target word. Rules whose target is a
//! literal name are explicit rules; rules whose target is a `%`/`&`
//! template or (with the `R` attribute) a regular expression are
//! meta-rules, consulted only when no explicit rule names the target.

pub mod attrs;
pub mod pattern;
pub mod store;

use std::fmt;

pub use attrs::Attributes;
pub use pattern::{Matcher, Stem, TargetPattern, Template};
pub use store::{RuleId, RuleSpec, RuleStore};

use crate::error::Location;

/// One registered rule.
#[derive(Debug, Clone)]
pub struct Rule {
  /// How this rule's target matches names.
  pub target: TargetPattern,
  /// The target word as written.
  pub target_text: String,
  /// Every target word of the header this rule came from (`$alltarget`).
  pub targets: Vec<String>,
  /// Prerequisite patterns, in order.
  pub prereqs: Vec<String>,
  pub attrs: Attributes,
  /// Raw recipe text; empty when the rule has none.
  pub recipe: String,
  pub location: Location,
  /// Registration order, used for tie-breaks.
  pub order: usize,
}

impl Rule {
  pub fn has_recipe(&self) -> bool {
    !self.recipe.trim().is_empty()
  }

  pub fn is_meta(&self) -> bool {
    self.target.is_meta()
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:", self.target_text)?;
    if !self.attrs.is_empty() {
      write!(f, "{}:", self.attrs)?;
    }
    for prereq in &self.prereqs {
      write!(f, " {prereq}")?;
    }
    write!(f, " ({})", self.location)?;
    for line in self.recipe.lines() {
      write!(f, "\n\t{line}")?;
    }
    Ok(())
  }
}
