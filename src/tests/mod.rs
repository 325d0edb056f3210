use std::sync::Arc;

use crate::models::{default_config, polymer_registry};
use crate::params::Param;
use crate::ruleset::Model;

mod test_engine;
mod test_proba;
mod test_ruleset;

/// A model containing only the given rule kinds of the default polymer
/// ruleset.
pub fn polymer_model(kinds: &[&str]) -> Arc<Model> {
    let mut config = default_config();
    config.rules.retain(|kind, _| kinds.contains(&kind.as_str()));
    Arc::new(Model::from_config(&config, &polymer_registry()).unwrap())
}

/// Default parameters with the given initial populations and rate constants.
/// Setting `conc` to the total initial mass pins the volume at 1.
pub fn param_with(init: &[(&str, u64)], consts: &[(&str, f64)], conc: f64) -> Param {
    Param {
        conc,
        init: init
            .iter()
            .map(|(name, pop)| (name.to_string(), *pop))
            .collect(),
        consts: consts
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect(),
        ..Param::default()
    }
}
