use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::chemical::Network;
use crate::ends::Finished;

/// One row of the per-snapshot table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRow {
    /// Replica rank, -1 for a single run.
    pub thread: i64,
    /// Wall-clock seconds since the engine started.
    pub ptime: f64,
    /// Resident memory in MiB.
    pub memuse: f64,
    pub step: u64,
    pub now: f64,
    /// Concentration of each saved species, in save-list order.
    pub concs: Vec<f64>,
    pub maxlength: u64,
    pub nbcomp: u64,
    pub poolsize: u64,
    pub nbreac: u64,
    pub poolreac: u64,
}

impl StepRow {
    pub fn tsv(&self) -> String {
        let mut line = format!(
            "{}\t{}\t{:.3}\t{}\t{}",
            self.thread, self.ptime, self.memuse, self.step, self.now
        );
        for conc in &self.concs {
            let _ = write!(line, "\t{conc}");
        }
        let _ = write!(
            line,
            "\t{}\t{}\t{}\t{}\t{}",
            self.maxlength, self.nbcomp, self.poolsize, self.nbreac, self.poolreac
        );
        line
    }
}

/// Populations and reaction rates captured at one sampling time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub now: f64,
    /// Active populations, in id order.
    pub populations: Vec<(String, u64)>,
    /// Active reactions as `(name, constant, current rate)`, in id order.
    pub rates: Vec<(String, f64, f64)>,
    /// Total population per chain length, active species only.
    pub lendist: BTreeMap<usize, u64>,
    /// Pooled species count per chain length.
    pub pooldist: BTreeMap<usize, u64>,
}

impl Snapshot {
    pub fn capture(net: &Network, now: f64) -> Snapshot {
        Snapshot {
            now,
            populations: net
                .species
                .iter_active()
                .map(|(_, species)| (species.name.clone(), species.pop))
                .collect(),
            rates: net
                .reactions
                .iter_active()
                .map(|(_, reaction)| {
                    (
                        reaction.name.clone(),
                        reaction.constant,
                        reaction.propensity(&net.species),
                    )
                })
                .collect(),
            lendist: net.lendist(),
            pooldist: net.pooldist(),
        }
    }

    /// Total active material weighted by chain length.
    pub fn mass(&self) -> u64 {
        self.lendist
            .iter()
            .map(|(length, pop)| *length as u64 * pop)
            .sum()
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ending {
    pub num: u8,
    pub message: String,
    /// Wall-clock runtime in seconds.
    pub runtime: f64,
}

impl Ending {
    pub fn new(end: &Finished, runtime: f64) -> Ending {
        Ending {
            num: end.num(),
            message: end.to_string(),
            runtime,
        }
    }
}

/// Everything one replica produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub rank: i64,
    pub table: Vec<StepRow>,
    pub snapshots: Vec<Snapshot>,
    pub ending: Ending,
}

impl RunResult {
    /// Writes the table as tab-separated values, one header line first.
    pub fn print_table(&self, save: &[String]) {
        let mut header = String::from("thread\tptime\tmemuse\tstep\ttime");
        for name in save {
            let _ = write!(header, "\t{name}");
        }
        header.push_str("\tmaxlength\tnbcomp\tpoolsize\tnbreac\tpoolreac");
        println!("{header}");
        for row in &self.table {
            println!("{}", row.tsv());
        }
    }
}
