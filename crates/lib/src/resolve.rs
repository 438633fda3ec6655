//! Target resolution: map a name to the rule that makes it.
//!
//! Precedence is explicit rules, then `%`/`&` templates, then regex
//! meta-rules, then an existing file. Among matching meta-rules the most
//! specific (longest literal text) wins and ties go to the earliest
//! registered rule. Within that best group a candidate whose prerequisites
//! can all be obtained is preferred over one that would fail further down;
//! if none can be obtained and the file exists, the name is a source file.
//! Obtainability never promotes a less specific rule or a lower tier.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::debug;

use crate::error::Location;
use crate::rule::{Attributes, RuleId, RuleStore, Stem};
use crate::stale::file_exists;
use crate::vars::substitute_known;

/// How many times a single meta-rule may be applied along one dependency
/// chain.
pub const DEFAULT_NREPS: usize = 1;

/// A rule bound to one target name.
#[derive(Debug, Clone)]
pub struct ResolvedRule {
  /// Prerequisite names, stem already substituted.
  pub prereqs: Vec<String>,
  /// Recipe text, `$stem` bindings already substituted.
  pub recipe: String,
  pub attrs: Attributes,
  pub location: Location,
  /// `$alltarget`.
  pub targets: Vec<String>,
}

impl ResolvedRule {
  pub fn has_recipe(&self) -> bool {
    !self.recipe.trim().is_empty()
  }
}

/// The outcome of resolving a name.
#[derive(Debug, Clone)]
pub enum Resolution {
  Explicit(ResolvedRule),
  Pattern { rule: ResolvedRule, stem: Stem, id: RuleId },
  SourceLeaf,
  Unresolvable,
}

/// Meta-rule applications along the current dependency chain.
#[derive(Debug, Clone, Default)]
pub struct ChainUsage {
  counts: HashMap<RuleId, usize>,
}

impl ChainUsage {
  pub fn enter(&mut self, id: RuleId) {
    *self.counts.entry(id).or_default() += 1;
  }

  pub fn leave(&mut self, id: RuleId) {
    if let Some(count) = self.counts.get_mut(&id) {
      *count = count.saturating_sub(1);
    }
  }

  fn uses(&self, id: RuleId) -> usize {
    self.counts.get(&id).copied().unwrap_or(0)
  }
}

pub struct Resolver<'a> {
  store: &'a RuleStore,
  dir: &'a Path,
  nreps: usize,
}

impl<'a> Resolver<'a> {
  /// `dir` is the directory relative names are checked against.
  pub fn new(store: &'a RuleStore, dir: &'a Path) -> Self {
    Self {
      store,
      dir,
      nreps: DEFAULT_NREPS,
    }
  }

  pub fn with_nreps(mut self, nreps: usize) -> Self {
    self.nreps = nreps.max(1);
    self
  }

  /// Resolve `name` given the meta-rules already applied on this chain.
  pub fn resolve(&self, name: &str, usage: &ChainUsage) -> Resolution {
    if let Some(rule) = self.explicit(name) {
      debug!(target = %name, location = %rule.location, "explicit rule");
      return Resolution::Explicit(rule);
    }

    let Some(group) = self.best_group(name, usage) else {
      if file_exists(&self.dir.join(name)) {
        debug!(target = %name, "source file");
        return Resolution::SourceLeaf;
      }
      return Resolution::Unresolvable;
    };

    if let Some((id, stem)) = group.iter().find(|(id, stem)| self.obtainable_rule(*id, stem, usage)) {
      debug!(target = %name, rule = id, stem = %stem.stem, "meta-rule");
      return self.bind_pattern(*id, stem.clone());
    }

    if file_exists(&self.dir.join(name)) {
      debug!(target = %name, "source file");
      return Resolution::SourceLeaf;
    }

    match group.into_iter().next() {
      Some((id, stem)) => {
        debug!(target = %name, rule = id, "meta-rule with unobtainable prerequisites");
        self.bind_pattern(id, stem)
      }
      None => Resolution::Unresolvable,
    }
  }

  /// Merge every explicit rule for `name`.
  fn explicit(&self, name: &str) -> Option<ResolvedRule> {
    let ids = self.store.explicit(name);
    let first = self.store.rule(*ids.first()?);
    let with_recipe = ids.iter().map(|&id| self.store.rule(id)).find(|r| r.has_recipe());
    let source = with_recipe.unwrap_or(first);

    let mut attrs = Attributes::default();
    let mut prereqs = Vec::new();
    for &id in ids {
      let rule = self.store.rule(id);
      attrs = attrs.merge(rule.attrs);
      prereqs.extend(rule.prereqs.iter().cloned());
    }

    Some(ResolvedRule {
      prereqs,
      recipe: source.recipe.clone(),
      attrs,
      location: source.location.clone(),
      targets: source.targets.clone(),
    })
  }

  /// The most specific matches of the first tier that matches at all,
  /// in registration order.
  fn best_group(&self, name: &str, usage: &ChainUsage) -> Option<Vec<(RuleId, Stem)>> {
    [self.store.templates(), self.store.regexes()].into_iter().find_map(|tier| {
      let candidates = self.candidates(tier, name, usage);
      let best = self.specificity(candidates.first()?.0);
      Some(
        candidates
          .into_iter()
          .take_while(|(id, _)| self.specificity(*id) == best)
          .collect(),
      )
    })
  }

  fn specificity(&self, id: RuleId) -> usize {
    self.store.rule(id).target.matcher().map(|m| m.specificity()).unwrap_or(0)
  }

  /// Matching rules of one tier, best first.
  fn candidates(&self, tier: &[RuleId], name: &str, usage: &ChainUsage) -> Vec<(RuleId, Stem)> {
    let mut matches: Vec<(RuleId, Stem)> = tier
      .iter()
      .filter(|&&id| usage.uses(id) < self.nreps)
      .filter_map(|&id| {
        let matcher = self.store.rule(id).target.matcher()?;
        matcher.matches(name).map(|stem| (id, stem))
      })
      .collect();

    matches.sort_by_key(|(id, _)| (std::cmp::Reverse(self.specificity(*id)), self.store.rule(*id).order));
    matches
  }

  fn instantiate(&self, id: RuleId, stem: &Stem) -> Vec<String> {
    let rule = self.store.rule(id);
    match rule.target.matcher() {
      Some(matcher) => rule.prereqs.iter().map(|p| matcher.instantiate(p, stem)).collect(),
      None => rule.prereqs.clone(),
    }
  }

  fn bind_pattern(&self, id: RuleId, stem: Stem) -> Resolution {
    let rule = self.store.rule(id);
    let bindings: BTreeMap<String, String> = stem.bindings().into_iter().collect();
    let resolved = ResolvedRule {
      prereqs: self.instantiate(id, &stem),
      recipe: substitute_known(&rule.recipe, &bindings),
      attrs: rule.attrs,
      location: rule.location.clone(),
      targets: rule.targets.clone(),
    };
    Resolution::Pattern {
      rule: resolved,
      stem,
      id,
    }
  }

  fn obtainable_rule(&self, id: RuleId, stem: &Stem, usage: &ChainUsage) -> bool {
    let mut usage = usage.clone();
    usage.enter(id);
    self
      .instantiate(id, stem)
      .iter()
      .all(|prereq| self.obtainable(prereq, &usage))
  }

  /// Whether `name` could be made: a file, an explicit target, or the
  /// target of a meta-rule whose own prerequisites can be obtained.
  fn obtainable(&self, name: &str, usage: &ChainUsage) -> bool {
    if !self.store.explicit(name).is_empty() || file_exists(&self.dir.join(name)) {
      return true;
    }
    self
      .best_group(name, usage)
      .is_some_and(|group| group.iter().any(|(id, stem)| self.obtainable_rule(*id, stem, usage)))
  }
}
