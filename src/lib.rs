//! Stochastic simulation of chemical reaction networks whose species and
//! reactions are discovered while the simulation runs.
//!
//! Species are plain name strings; a ruleset classifies them into categories
//! and generates reactions on demand whenever a species activates. The
//! engine implements Gillespie's direct method over an incrementally
//! maintained probability index, so the reaction set can grow and shrink
//! combinatorially (as it does for polymer chemistries) without rebuilding
//! anything.

pub mod arena;
pub mod chemical;
pub mod collect;
pub mod descriptor;
pub mod ends;
pub mod engine;
pub mod models;
pub mod output;
pub mod params;
pub mod proba;
pub mod ruleset;
mod utils;

pub use chemical::{Network, Reaction, Species};
pub use ends::Finished;
pub use engine::{run_replicas, Engine};
pub use output::{Ending, RunResult, Snapshot, StepRow};
pub use params::{DropMode, Param, Rates};
pub use proba::ProbaIndex;
pub use ruleset::{Model, ReacDescr, Registry, RuleDef, RulesetConfig};
pub use utils::DEFAULT_SEED;

#[cfg(test)]
mod tests;
