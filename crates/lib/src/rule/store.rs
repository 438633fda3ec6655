//! The rule store: explicit rules indexed by name, meta-rules in
//! registration order.

use std::collections::HashMap;

use tracing::debug;

use super::{Attributes, Rule, TargetPattern};
use crate::error::{Location, MkError};

/// Index of a rule in the store.
pub type RuleId = usize;

/// A rule header and its recipe, as produced by the mkfile reader.
#[derive(Debug, Clone)]
pub struct RuleSpec {
  pub targets: Vec<String>,
  pub prereqs: Vec<String>,
  /// Attribute letters (`"VQ"`).
  pub attrs: String,
  pub recipe: String,
  pub location: Location,
}

impl RuleSpec {
  pub fn new(targets: &[&str], prereqs: &[&str], recipe: &str) -> Self {
    Self {
      targets: targets.iter().map(|s| s.to_string()).collect(),
      prereqs: prereqs.iter().map(|s| s.to_string()).collect(),
      attrs: String::new(),
      recipe: recipe.to_string(),
      location: Location::builtin(),
    }
  }

  pub fn with_attrs(mut self, attrs: &str) -> Self {
    self.attrs = attrs.to_string();
    self
  }

  pub fn at(mut self, location: Location) -> Self {
    self.location = location;
    self
  }
}

/// All rules of an invocation. Read-only once parsing is done.
#[derive(Debug, Default)]
pub struct RuleStore {
  rules: Vec<Rule>,
  explicit: HashMap<String, Vec<RuleId>>,
  templates: Vec<RuleId>,
  regexes: Vec<RuleId>,
  default_targets: Vec<String>,
}

impl RuleStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register one rule per target word.
  ///
  /// # Errors
  ///
  /// Returns `Config` for an unknown attribute letter, an invalid regular
  /// expression, or a second recipe for an explicit target.
  pub fn add_rule(&mut self, spec: RuleSpec) -> Result<(), MkError> {
    let attrs = Attributes::parse(&spec.attrs, &spec.location)?;

    for word in &spec.targets {
      let target = TargetPattern::new(word, attrs.regex, &spec.location)?;
      let id = self.rules.len();
      let rule = Rule {
        target,
        target_text: word.clone(),
        targets: spec.targets.clone(),
        prereqs: spec.prereqs.clone(),
        attrs,
        recipe: spec.recipe.clone(),
        location: spec.location.clone(),
        order: id,
      };

      match &rule.target {
        TargetPattern::Literal(name) => {
          if rule.has_recipe()
            && let Some(previous) = self
              .explicit(name)
              .iter()
              .map(|&id| &self.rules[id])
              .find(|r| r.has_recipe())
          {
            return Err(MkError::config(
              &rule.location,
              format!("multiple recipes for '{name}' (previous recipe at {})", previous.location),
            ));
          }
          self.explicit.entry(name.clone()).or_default().push(id);
        }
        TargetPattern::Template(_) => self.templates.push(id),
        TargetPattern::Regex(_) => self.regexes.push(id),
      }

      debug!(target = %word, location = %spec.location, meta = rule.is_meta(), "registered rule");
      self.rules.push(rule);
    }

    if self.default_targets.is_empty() && !attrs.regex {
      let literal: Vec<String> = spec
        .targets
        .iter()
        .filter(|t| self.explicit.contains_key(t.as_str()))
        .cloned()
        .collect();
      if literal.len() == spec.targets.len() {
        self.default_targets = literal;
      }
    }

    Ok(())
  }

  pub fn rule(&self, id: RuleId) -> &Rule {
    &self.rules[id]
  }

  /// Explicit rules for `name`, in registration order.
  pub fn explicit(&self, name: &str) -> &[RuleId] {
    self.explicit.get(name).map(Vec::as_slice).unwrap_or(&[])
  }

  /// `%`/`&` template rules, in registration order.
  pub fn templates(&self) -> &[RuleId] {
    &self.templates
  }

  /// Regex meta-rules, in registration order.
  pub fn regexes(&self) -> &[RuleId] {
    &self.regexes
  }

  /// Targets of the first non-meta rule.
  pub fn default_targets(&self) -> &[String] {
    &self.default_targets
  }

  pub fn rules(&self) -> impl Iterator<Item = &Rule> {
    self.rules.iter()
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }
}
