use std::collections::VecDeque;

use itertools::izip;
use rand::Rng;
use rand_distr::Exp;

use crate::arena::ReactionId;
use crate::ends::Finished;

/// Number of weight cells per chunk before a new chunk is allocated.
const CHUNK_CAP: usize = 256;

/// A stable handle to one weight cell of a [`ProbaIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    chunk: u32,
    pos: u32,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.chunk, self.pos)
    }
}

#[derive(Debug, Clone, Default)]
struct Chunk {
    weights: Vec<f64>,
    owners: Vec<Option<ReactionId>>,
}

/// An incrementally updatable index for weighted random selection.
///
/// Weights live in fixed-cap chunks with cached per-chunk totals, so a draw
/// is two inverse-CDF scans instead of one scan over every registered
/// reaction. Freed cells go through a FIFO queue and are reused by later
/// registrations, which keeps slot handles stable for the reactions that own
/// them.
///
/// Totals are maintained by deltas and therefore drift; [`ProbaIndex::clean`]
/// recomputes them exactly and is expected to be called regularly.
#[derive(Debug, Clone)]
pub struct ProbaIndex {
    chunks: Vec<Chunk>,
    /// Cached total weight of each chunk.
    totals: Vec<f64>,
    /// Cached total weight of the whole index.
    total: f64,
    /// Values below this threshold are snapped to zero.
    minprob: f64,
    /// Freed slots awaiting reuse, oldest first.
    free: VecDeque<Slot>,
    /// Number of currently owned slots.
    live: usize,
}

impl ProbaIndex {
    pub fn new(minprob: f64) -> ProbaIndex {
        ProbaIndex {
            chunks: Vec::new(),
            totals: Vec::new(),
            total: 0.0,
            minprob,
            free: VecDeque::new(),
            live: 0,
        }
    }

    /// Total weight over all live slots, as maintained by deltas.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Number of slots currently owned by a reaction.
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Current weight stored at `slot`.
    pub fn weight(&self, slot: Slot) -> f64 {
        self.chunks[slot.chunk as usize].weights[slot.pos as usize]
    }

    /// Adds `delta` to a chunk total and the grand total, snapping chunk
    /// totals below `minprob` to zero so drift cannot linger there.
    fn bump(&mut self, chunk: usize, mut delta: f64) {
        let mut new = self.totals[chunk] + delta;
        if new < self.minprob {
            delta -= new;
            new = 0.0;
        }
        self.totals[chunk] = new;
        self.total += delta;
    }

    /// Claims a slot for `owner` with the given initial weight.
    pub fn register(&mut self, owner: ReactionId, weight: f64) -> Slot {
        debug_assert!(
            weight >= 0.0 && !weight.is_nan(),
            "A propensity cannot be registered as {weight}"
        );
        let w = if weight < self.minprob { 0.0 } else { weight };
        let slot = match self.free.pop_front() {
            Some(slot) => {
                let chunk = &mut self.chunks[slot.chunk as usize];
                let pos = slot.pos as usize;
                assert!(
                    chunk.owners[pos].is_none(),
                    "slot {slot} reused while still owned"
                );
                chunk.weights[pos] = w;
                chunk.owners[pos] = Some(owner);
                slot
            }
            None => {
                if self.chunks.last().is_none_or(|c| c.weights.len() >= CHUNK_CAP) {
                    self.chunks.push(Chunk::default());
                    self.totals.push(0.0);
                }
                let chunk_idx = self.chunks.len() - 1;
                let chunk = &mut self.chunks[chunk_idx];
                chunk.weights.push(w);
                chunk.owners.push(Some(owner));
                Slot {
                    chunk: chunk_idx as u32,
                    pos: (chunk.weights.len() - 1) as u32,
                }
            }
        };
        self.live += 1;
        self.bump(slot.chunk as usize, w);
        slot
    }

    /// Replaces the weight stored at `slot`.
    pub fn update(&mut self, slot: Slot, weight: f64) -> Result<(), Finished> {
        if weight.is_nan() || weight < 0.0 {
            return Err(Finished::RoundError(format!(
                "propensity {weight} at slot {slot}"
            )));
        }
        let w = if weight < self.minprob { 0.0 } else { weight };
        let cell = &mut self.chunks[slot.chunk as usize].weights[slot.pos as usize];
        let delta = w - *cell;
        *cell = w;
        self.bump(slot.chunk as usize, delta);
        Ok(())
    }

    /// Zeroes `slot` and queues it for reuse. Freeing a slot twice is a fatal
    /// bookkeeping error.
    pub fn unregister(&mut self, slot: Slot) {
        let chunk = &mut self.chunks[slot.chunk as usize];
        let pos = slot.pos as usize;
        assert!(
            chunk.owners[pos].take().is_some(),
            "double free of probability slot {slot}"
        );
        let old = std::mem::replace(&mut chunk.weights[pos], 0.0);
        self.free.push_back(slot);
        self.live -= 1;
        self.bump(slot.chunk as usize, -old);
    }

    /// Draws a random owner with probability proportional to its weight,
    /// together with the waiting time to the drawn event.
    ///
    /// The chunk is drawn from the cached chunk totals; the cell within the
    /// chunk is drawn against the freshly summed chunk weight, so that the
    /// inner draw is conditioned on the current content of the chunk rather
    /// than a drifted cache.
    pub fn choose(&self, rng: &mut impl Rng) -> Result<(ReactionId, f64), Finished> {
        if self.total <= 0.0 {
            return Err(Finished::NoMore(format!(
                "total propensity is {}",
                self.total
            )));
        }
        let mut target = rng.random::<f64>() * self.total;
        let mut drawn = None;
        for (chunk_idx, &chunk_total) in self.totals.iter().enumerate() {
            if chunk_total <= 0.0 {
                continue;
            }
            if target < chunk_total {
                drawn = Some(chunk_idx);
                break;
            }
            target -= chunk_total;
        }
        let Some(chunk_idx) = drawn else {
            return Err(Finished::RoundError(format!(
                "chunk draw exhausted: total={} =?= {}",
                self.total,
                self.totals.iter().sum::<f64>()
            )));
        };
        let chunk = &self.chunks[chunk_idx];
        let fresh: f64 = chunk.weights.iter().sum();
        if fresh <= 0.0 {
            return Err(Finished::RoundError(format!(
                "chunk {chunk_idx} drawn but sums to {fresh} (cached {})",
                self.totals[chunk_idx]
            )));
        }
        let mut target = rng.random::<f64>() * fresh;
        let mut pos = chunk.weights.len() - 1;
        for (cell, &weight) in chunk.weights.iter().enumerate() {
            if target < weight {
                pos = cell;
                break;
            }
            target -= weight;
        }
        let Some(owner) = chunk.owners[pos] else {
            return Err(Finished::NotFound(format!(
                "freed slot ({chunk_idx},{pos}) drawn"
            )));
        };
        let exp = Exp::new(self.total)
            .map_err(|err| Finished::RoundError(format!("Exp({}): {err}", self.total)))?;
        Ok((owner, rng.sample(exp)))
    }

    /// Recomputes every chunk total and the grand total from scratch.
    ///
    /// Far slower than the delta maintenance done by `update`, but the deltas
    /// accumulate rounding errors; calling this regularly keeps them bounded.
    pub fn clean(&mut self) {
        self.total = 0.0;
        for (chunk, total) in izip!(&self.chunks, &mut self.totals) {
            *total = chunk.weights.iter().sum();
            self.total += *total;
        }
    }
}
