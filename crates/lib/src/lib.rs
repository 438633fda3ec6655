//! mk-lib: the engine behind the `mk` build tool.
//!
//! Reading an mkfile produces a [`rule::RuleStore`] and a [`vars::Vars`]
//! table. A [`context::BuildContext`] then resolves requested targets into
//! a [`graph::BuildGraph`] and hands it to the scheduler in [`execute`],
//! which runs out-of-date recipes with bounded parallelism:
//!
//! ```text
//! mkfile -> RuleStore -> Resolver -> GraphBuilder -> Scheduler -> recipes
//!                                                     |
//!                                        StalenessEvaluator
//! ```

pub mod context;
pub mod error;
pub mod execute;
pub mod graph;
pub mod mkfile;
pub mod resolve;
pub mod rule;
pub mod stale;
pub mod vars;

#[cfg(test)]
mod util;

pub use context::BuildContext;
pub use error::{Location, MkError, Result};
pub use execute::{BuildOptions, BuildReport, Outcome};
