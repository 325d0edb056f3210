use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ends::Finished;
use crate::ruleset::Relation;

/// What happens to the reactions of a species when it deactivates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropMode {
    /// Reactions are destroyed and removed from the pool.
    #[default]
    Drop,
    /// Reactions stay in the pool and are only unregistered from the index.
    Keep,
    /// Intermediate mode; behaves as `Keep`.
    Soft,
}

/// The run parameters, loaded from a JSON file.
///
/// Rate parameters are split in three groups: `consts` are the named rate
/// parameters read by the rule constant builders, `altconsts` are secondary
/// named parameters merged in after them, and `catconsts` map a rule kind to
/// its catalytic rate factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Param {
    /// Total concentration, fixing the volume as `ptot / conc`.
    pub conc: f64,
    /// Simulated time at which the run stops.
    pub tend: f64,
    /// Interval between two snapshots.
    pub tstep: f64,
    /// Wall-clock budget in seconds.
    pub rtlim: f64,
    /// Events processed per batch before control returns to the outer loop.
    pub maxsteps: u64,
    pub seed: u64,
    /// Initial populations.
    pub init: BTreeMap<String, u64>,
    /// Species whose concentration is written to every table row.
    pub save: Vec<String>,
    pub dropmode: DropMode,
    /// Recompute the index totals before every draw.
    pub autoclean: bool,
    /// Threshold below which probabilities are snapped to zero.
    pub minprob: f64,
    /// Number of replica threads.
    pub threads: usize,
    pub consts: BTreeMap<String, f64>,
    pub altconsts: BTreeMap<String, f64>,
    pub catconsts: BTreeMap<String, f64>,
    /// Inline ruleset definition; falls back to the bundled polymer model.
    pub ruleset: Option<crate::ruleset::RulesetConfig>,
}

impl Default for Param {
    fn default() -> Param {
        Param {
            conc: 0.1,
            tend: 1.0,
            tstep: 0.01,
            rtlim: 900.0,
            maxsteps: 10000,
            seed: 0,
            init: BTreeMap::new(),
            save: Vec::new(),
            dropmode: DropMode::default(),
            autoclean: true,
            minprob: 1e-10,
            threads: 1,
            consts: BTreeMap::new(),
            altconsts: BTreeMap::new(),
            catconsts: BTreeMap::new(),
            ruleset: None,
        }
    }
}

impl Param {
    pub fn from_file(path: &Path) -> Result<Param, Finished> {
        let file = File::open(path)
            .map_err(|err| Finished::FileNotFound(format!("{path:?}: {err}")))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|err| Finished::BadFile(format!("{path:?}: {err}")))
    }

    pub fn from_json(text: &str) -> Result<Param, Finished> {
        serde_json::from_str(text).map_err(|err| Finished::BadFile(err.to_string()))
    }
}

/// The resolved rate parameters handed to the rule constant builders.
///
/// Built once per run from `consts` and `altconsts`, then extended by the
/// model's parameter relations in their declaration order.
#[derive(Debug, Clone, Default)]
pub struct Rates {
    named: BTreeMap<String, f64>,
    cat: BTreeMap<String, f64>,
}

impl Rates {
    pub fn resolve(param: &Param, relations: &[Relation], rank: usize) -> Rates {
        let mut named = param.consts.clone();
        named.extend(param.altconsts.iter().map(|(k, v)| (k.clone(), *v)));
        let mut rates = Rates {
            named,
            cat: param.catconsts.clone(),
        };
        for relation in relations {
            let value = relation.apply(&rates, rank);
            rates.named.insert(relation.target.clone(), value);
        }
        rates
    }

    /// A named rate parameter. Unknown names resolve to 0.0, so a reaction
    /// built from a missing parameter registers at weight zero.
    pub fn k(&self, name: &str) -> f64 {
        self.named.get(name).copied().unwrap_or(0.0)
    }

    /// The catalytic rate factor of a rule kind, 1.0 when unset.
    pub fn catconst(&self, kind: &str) -> f64 {
        self.cat.get(kind).copied().unwrap_or(1.0)
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.named.insert(name.to_string(), value);
    }
}
