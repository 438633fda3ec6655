//! Rule attributes.

use std::fmt;

use serde::Serialize;

use crate::error::{Location, MkError};

/// The attribute set of a rule, written between two colons in a rule
/// header (`target:VQ: prereqs`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Attributes {
  /// `V`: the target is not a file and is always out of date.
  pub virtual_target: bool,
  /// `D`: remove the target file if its recipe fails.
  pub delete_on_error: bool,
  /// `U`: the target counts as updated after its recipe, even if the file
  /// was not touched.
  pub update_in_place: bool,
  /// `R`: the target is a regular expression.
  pub regex: bool,
  /// `Q`: do not echo the recipe.
  pub quiet: bool,
  /// `X`: do not export variables to the recipe environment.
  pub no_export: bool,
  /// `E`: a failing recipe is a warning, not an error.
  pub ignore_errors: bool,
  /// `N`: without a recipe, an out-of-date target still counts as updated.
  pub no_recipe_updates: bool,
}

/// Attribute letters in display order.
const LETTERS: &str = "VDURQXEN";

impl Attributes {
  /// Parse attribute letters. Unknown letters are a configuration error.
  pub fn parse(letters: &str, location: &Location) -> Result<Self, MkError> {
    let mut attrs = Attributes::default();
    for c in letters.chars().filter(|c| !c.is_whitespace()) {
      match attrs.flag_mut(c) {
        Some(flag) => *flag = true,
        None => return Err(MkError::config(location, format!("unknown attribute '{c}'"))),
      }
    }
    Ok(attrs)
  }

  fn flag_mut(&mut self, letter: char) -> Option<&mut bool> {
    let flag = match letter {
      'V' => &mut self.virtual_target,
      'D' => &mut self.delete_on_error,
      'U' => &mut self.update_in_place,
      'R' => &mut self.regex,
      'Q' => &mut self.quiet,
      'X' => &mut self.no_export,
      'E' => &mut self.ignore_errors,
      'N' => &mut self.no_recipe_updates,
      _ => return None,
    };
    Some(flag)
  }

  fn flag(&self, letter: char) -> bool {
    match letter {
      'V' => self.virtual_target,
      'D' => self.delete_on_error,
      'U' => self.update_in_place,
      'R' => self.regex,
      'Q' => self.quiet,
      'X' => self.no_export,
      'E' => self.ignore_errors,
      'N' => self.no_recipe_updates,
      _ => false,
    }
  }

  /// Union of two attribute sets.
  pub fn merge(self, other: Attributes) -> Attributes {
    let mut merged = self;
    for letter in LETTERS.chars() {
      if other.flag(letter)
        && let Some(flag) = merged.flag_mut(letter)
      {
        *flag = true;
      }
    }
    merged
  }

  pub fn is_empty(&self) -> bool {
    *self == Attributes::default()
  }
}

impl fmt::Display for Attributes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for letter in LETTERS.chars().filter(|&l| self.flag(l)) {
      write!(f, "{letter}")?;
    }
    Ok(())
  }
}
