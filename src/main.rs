use std::path::PathBuf;
use std::sync::Arc;

use clap::{command, Parser};
use log::info;

use rulespie::{models, run_replicas, Finished, Model, Param};

// See also `clap_cargo::style::CLAP_STYLING`
pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

#[derive(Debug, Parser)]
#[command(
    name = "rulespie",
    about = "Stochastic simulation of rule-generated reaction networks.",
    long_about = "Exact stochastic simulation (Gillespie's direct method) of chemical
reaction networks whose species and reactions are discovered as the run
proceeds, driven by a ruleset over species names.

The run is described by a JSON parameter file:

{
    \"init\": {\"a\": 100},
    \"conc\": 1.0,
    \"tend\": 10.0,
    \"tstep\": 1.0,
    \"consts\": {\"kpol_mono\": 1.0, \"kpol_long\": 1.0},
    \"save\": [\"a\", \"aa\"]
}

Without an inline \"ruleset\" section, the bundled polymer model is used.",
    styles = CLAP_STYLING,
)]
struct Cli {
    /// The path to the JSON parameter file.
    param: PathBuf,

    /// Override the seed from the parameter file.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of replica threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Override the end time.
    #[arg(long)]
    tend: Option<f64>,

    /// Skip printing the per-step table.
    #[arg(long)]
    no_table: bool,
}

fn run_cli(args: Cli) -> Result<(), Finished> {
    let mut param = Param::from_file(&args.param)?;
    if let Some(seed) = args.seed {
        param.seed = seed;
    }
    if let Some(threads) = args.threads {
        param.threads = threads;
    }
    if let Some(tend) = args.tend {
        param.tend = tend;
    }

    let registry = models::polymer_registry();
    let config = param
        .ruleset
        .clone()
        .unwrap_or_else(models::default_config);
    let model = Arc::new(Model::from_config(&config, &registry)?);

    let results = run_replicas(&model, &param, None)?;
    for result in &results {
        if !args.no_table {
            result.print_table(&param.save);
        }
        info!(
            "replica {}: {} ({:.3} s)",
            result.rank, result.ending.message, result.ending.runtime
        );
    }
    Ok(())
}

pub fn main() {
    env_logger::init();
    if let Err(end) = run_cli(Cli::parse()) {
        eprintln!("{end}");
        std::process::exit(end.num() as i32);
    }
}
