use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::chemical::Network;
use crate::ends::Finished;
use crate::output::{Ending, RunResult, Snapshot, StepRow};
use crate::params::Param;
use crate::ruleset::Model;
use crate::utils::memuse;

/// The stepping loop of one simulation replica.
///
/// The engine owns its network, RNG and output buffers; nothing is shared
/// with other replicas. Every termination path goes through [`Finished`],
/// and the ending is written into the run result.
pub struct Engine {
    pub net: Network,
    pub now: f64,
    pub step: u64,
    param: Param,
    rng: SmallRng,
    rank: i64,
    started: Instant,
    stop: Option<Arc<AtomicBool>>,
    table: Vec<StepRow>,
    snapshots: Vec<Snapshot>,
}

impl Engine {
    /// A single-run engine, seeded from the parameters.
    pub fn new(model: Arc<Model>, param: Param) -> Result<Engine, Finished> {
        Engine::with_rank(model, param, -1)
    }

    /// A replica engine; the rank offsets the seed and indexes the rows.
    pub fn with_rank(model: Arc<Model>, param: Param, rank: i64) -> Result<Engine, Finished> {
        let offset = rank.max(0) as u64;
        let net = Network::new(model, &param, offset as usize)?;
        let rng = SmallRng::seed_from_u64(param.seed.wrapping_add(offset));
        Ok(Engine {
            net,
            now: 0.0,
            step: 0,
            param,
            rng,
            rank,
            started: Instant::now(),
            stop: None,
            table: Vec::new(),
            snapshots: Vec::new(),
        })
    }

    /// Installs an external stop signal, checked between steps.
    pub fn set_stop_flag(&mut self, flag: Arc<AtomicBool>) {
        self.stop = Some(flag);
    }

    pub fn runtime(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Advances the simulation until `tstop` (true), the step budget runs
    /// out (false), or a termination condition surfaces as an error.
    fn process(&mut self, tstop: f64) -> Result<bool, Finished> {
        for _ in 0..self.param.maxsteps {
            if self.now >= tstop {
                return Ok(true);
            }
            if self.now >= self.param.tend {
                return Err(Finished::TimesUp(format!("t={}", self.now)));
            }
            if self.runtime() >= self.param.rtlim {
                return Err(Finished::RuntimeLim(format!("t={}", self.now)));
            }
            if let Some(flag) = &self.stop {
                if flag.load(Ordering::Relaxed) {
                    return Err(Finished::Interrupted(format!("t={}", self.now)));
                }
            }
            if self.param.autoclean {
                self.net.proba.clean();
            }
            let (chosen, dt) = match self.net.proba.choose(&mut self.rng) {
                Ok(drawn) => drawn,
                Err(Finished::RoundError(detail)) => {
                    // A fresh recount may repair the drift; retry once
                    // before surfacing.
                    debug!("cleaning the index after a rounding problem: {detail}");
                    self.net.proba.clean();
                    self.net.proba.choose(&mut self.rng)?
                }
                Err(end) => return Err(end),
            };
            self.net.fire(chosen)?;
            self.now += dt;
            self.step += 1;
            if self.net.proba.total() <= 0.0 {
                return Err(Finished::NoMore(format!("t={}", self.now)));
            }
        }
        Ok(false)
    }

    fn record(&mut self) {
        debug!("#{} t={} ({} reactions)", self.step, self.now, self.net.reactions.len_active());
        self.table.push(StepRow {
            thread: self.rank,
            ptime: self.runtime(),
            memuse: memuse(),
            step: self.step,
            now: self.now,
            concs: self
                .param
                .save
                .iter()
                .map(|name| self.net.conc_of(name))
                .collect(),
            maxlength: self.net.maxlength() as u64,
            nbcomp: self.net.species.len_active() as u64,
            poolsize: self.net.species.len_pool() as u64,
            nbreac: self.net.reactions.len_active() as u64,
            poolreac: self.net.reactions.len_pool() as u64,
        });
        self.snapshots.push(Snapshot::capture(&self.net, self.now));
    }

    /// Runs the outer loop to completion: snapshots at every multiple of
    /// `tstep`, then the ending record.
    pub fn run(mut self) -> RunResult {
        let mut tnext = 0.0;
        let mut last_recorded: Option<f64> = None;
        let ending = loop {
            match self.process(tnext) {
                Ok(true) => {
                    self.record();
                    last_recorded = Some(self.now);
                    tnext += self.param.tstep;
                }
                Ok(false) => {
                    warn!("maxsteps per batch (={}) too low", self.param.maxsteps);
                }
                Err(end) => {
                    // Happy endings get a final sample, unless the stop time
                    // coincides with the last recorded one.
                    if end.is_happy() && last_recorded.is_none_or(|t| self.now > t) {
                        self.record();
                    }
                    break end;
                }
            }
        };
        if ending.is_bad() {
            error!("{ending}");
        } else {
            info!("{ending}");
        }
        RunResult {
            rank: self.rank,
            table: self.table,
            snapshots: self.snapshots,
            ending: Ending::new(&ending, self.started.elapsed().as_secs_f64()),
        }
    }
}

/// Runs `param.threads` independent replicas and gathers their results in
/// rank order.
///
/// Replicas share the immutable model and nothing else; each gets the run
/// seed offset by its rank. An optional stop flag interrupts every replica
/// at its next step boundary.
pub fn run_replicas(
    model: &Arc<Model>,
    param: &Param,
    stop: Option<Arc<AtomicBool>>,
) -> Result<Vec<RunResult>, Finished> {
    let threads = param.threads.max(1);
    if threads == 1 {
        let mut engine = Engine::new(Arc::clone(model), param.clone())?;
        if let Some(flag) = stop {
            engine.set_stop_flag(flag);
        }
        return Ok(vec![engine.run()]);
    }
    info!("launching {threads} replicas");
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|rank| {
                let model = Arc::clone(model);
                let param = param.clone();
                let stop = stop.clone();
                scope.spawn(move || -> Result<RunResult, Finished> {
                    let mut engine = Engine::with_rank(model, param, rank as i64)?;
                    if let Some(flag) = stop {
                        engine.set_stop_flag(flag);
                    }
                    Ok(engine.run())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("replica thread panicked"))
            .collect()
    })
}
