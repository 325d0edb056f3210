use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;
use smallvec::SmallVec;

use crate::arena::{ReactionId, SpeciesId};
use crate::collect::{ReactionCollector, SpeciesCollector};
use crate::descriptor::Descriptor;
use crate::ends::Finished;
use crate::params::{DropMode, Param, Rates};
use crate::proba::{ProbaIndex, Slot};
use crate::ruleset::{Model, ReacDescr};

/// A named chemical population.
#[derive(Debug)]
pub struct Species {
    pub name: String,
    pub pop: u64,
    /// Chain length, from the `length` property when the model defines one.
    pub length: usize,
    /// Sorted category tags, a pure function of the name.
    pub categories: Vec<String>,
    /// Every reaction currently referencing this species, as reactant or
    /// catalyst.
    pub reactions: BTreeSet<ReactionId>,
    /// Pinned reactions that survive depopulation.
    pub kept: Vec<ReactionId>,
}

impl Species {
    fn new(name: String, categories: Vec<String>, length: usize) -> Species {
        Species {
            name,
            pop: 0,
            length,
            categories,
            reactions: BTreeSet::new(),
            kept: Vec::new(),
        }
    }

    /// A species takes part in the simulation while populated or while it
    /// pins kept reactions.
    pub fn is_active(&self) -> bool {
        self.pop > 0 || !self.kept.is_empty()
    }
}

/// One concrete reaction: a rule kind applied to specific reactants, with an
/// optional catalyst and variant.
///
/// The constant already includes the order-dependent volume scaling and the
/// catalytic factor, so the propensity is a plain product over populations.
#[derive(Debug, Clone)]
pub struct Reaction {
    /// Structured name `kind.reactants.catalyst.variant`, the pool key.
    pub name: String,
    pub kind: String,
    pub reactants: SmallVec<[SpeciesId; 2]>,
    pub catal: Option<SpeciesId>,
    /// How many units of the catalyst population are tied up as reactants:
    /// 0 for a generic catalyst, 1 for autocatalysis, 2 for an autocatalytic
    /// dimerization.
    autocat: u64,
    pub constant: f64,
    order: u8,
    dimer: bool,
    /// Product names, built once from the rule's product builder.
    pub product_names: Vec<String>,
    /// Product ids, resolved lazily on first firing (the products may not
    /// exist in the pool before that).
    products: Option<SmallVec<[SpeciesId; 2]>>,
    /// Registration slot in the probability index, while registered.
    pub slot: Option<Slot>,
    /// Pinned reactions are never destroyed by deactivation.
    pub kept: bool,
}

impl Reaction {
    /// The instantaneous rate of this reaction given current populations.
    pub fn propensity(&self, species: &SpeciesCollector) -> f64 {
        let base = match self.order {
            0 => self.constant,
            _ => {
                let pop0 = species.get(self.reactants[0]).pop;
                if pop0 == 0 {
                    return 0.0;
                }
                match (self.order, self.dimer) {
                    (1, _) => self.constant * pop0 as f64,
                    (2, true) => self.constant * pop0 as f64 * (pop0 - 1) as f64,
                    (2, false) => {
                        let pop1 = species.get(self.reactants[1]).pop;
                        self.constant * pop0 as f64 * pop1 as f64
                    }
                    _ => unreachable!("kinetic order {} materialized", self.order),
                }
            }
        };
        match self.catal {
            Some(catal) => {
                let avail = species.get(catal).pop.saturating_sub(self.autocat);
                base * avail as f64
            }
            None => base,
        }
    }
}

/// The whole mutable state of one simulation: species and reaction pools,
/// the probability index, and the descriptor cache, driven by a shared
/// immutable model.
///
/// All cross-entity bookkeeping runs through here, keeping populations,
/// propensities and the index mutually consistent after every mutation.
pub struct Network {
    pub model: Arc<Model>,
    pub descriptor: Descriptor,
    pub rates: Rates,
    pub species: SpeciesCollector,
    pub reactions: ReactionCollector,
    pub proba: ProbaIndex,
    pub vol: f64,
}

impl Network {
    pub fn new(model: Arc<Model>, param: &Param, rank: usize) -> Result<Network, Finished> {
        if param.conc <= 0.0 {
            return Err(Finished::BadFile(format!(
                "conc must be positive, not {}",
                param.conc
            )));
        }
        let mut descriptor = model.descriptor();
        let rates = Rates::resolve(param, &model.relations, rank);
        let ptot: u64 = param
            .init
            .iter()
            .map(|(name, pop)| pop * length_of(&mut descriptor, name) as u64)
            .sum();
        let vol = if ptot == 0 { 1.0 } else { ptot as f64 / param.conc };
        let mut net = Network {
            species: SpeciesCollector::new(&model.categories),
            reactions: ReactionCollector::new(param.dropmode),
            proba: ProbaIndex::new(param.minprob),
            model,
            descriptor,
            rates,
            vol,
        };
        for (name, &pop) in &param.init {
            net.init_pop(name, pop)?;
        }
        debug!(
            "network initialized: {} species, {} reactions, vol={}",
            net.species.len_pool(),
            net.reactions.len_pool(),
            net.vol
        );
        Ok(net)
    }

    /// The id of a named species, pooling it on first lookup.
    pub fn species_id(&mut self, name: &str) -> SpeciesId {
        if let Some(id) = self.species.lookup(name) {
            return id;
        }
        let info = self.descriptor.info(name);
        let length = length_of(&mut self.descriptor, name);
        self.species
            .insert(Species::new(name.to_string(), info.categories.clone(), length))
    }

    /// Atomically sets a population, activating or deactivating as needed.
    pub fn init_pop(&mut self, name: &str, pop: u64) -> Result<(), Finished> {
        let id = self.species_id(name);
        let was_active = self.species.is_active(id);
        self.species.get_mut(id).pop = pop;
        let is_active = self.species.get(id).is_active();
        if is_active && !was_active {
            self.activate(id)?;
        } else if !is_active && was_active {
            self.deactivate(id);
        }
        self.propagate(id)
    }

    /// Increments a population, activating the species on the 0→1
    /// transition, then refreshes every reaction referencing it.
    pub fn inc(&mut self, id: SpeciesId) -> Result<(), Finished> {
        let species = self.species.get_mut(id);
        species.pop += 1;
        let newly_active = species.pop == 1 && species.kept.is_empty();
        if newly_active {
            self.activate(id)?;
        }
        self.propagate(id)
    }

    /// Decrements a population, deactivating the species on the 1→0
    /// transition; fails with DecrZero when already empty.
    pub fn dec(&mut self, id: SpeciesId) -> Result<(), Finished> {
        {
            let species = self.species.get_mut(id);
            if species.pop == 0 {
                return Err(Finished::DecrZero(species.name.clone()));
            }
            species.pop -= 1;
        }
        let species = self.species.get(id);
        if species.pop == 0 && species.kept.is_empty() {
            self.deactivate(id);
        }
        self.propagate(id)
    }

    /// Puts the species in the active set and category indices, then
    /// materializes every reaction the ruleset generates for it.
    fn activate(&mut self, id: SpeciesId) -> Result<(), Finished> {
        self.species.activate(id);
        let (name, categories) = {
            let species = self.species.get(id);
            (species.name.clone(), species.categories.clone())
        };
        let model = Arc::clone(&self.model);
        let descrs = model.reactions_for(&name, &categories, |cat| {
            self.species.category_names(cat)
        });
        for descr in &descrs {
            self.materialize(descr)?;
        }
        Ok(())
    }

    /// Removes the species from the active set, destroying (or, in keep
    /// modes, unregistering) the non-kept reactions that consume it.
    /// Reactions referencing it only as catalyst survive; the following
    /// propensity refresh drives them to zero.
    fn deactivate(&mut self, id: SpeciesId) {
        self.species.deactivate(id);
        let referencing: Vec<ReactionId> =
            self.species.get(id).reactions.iter().copied().collect();
        for rid in referencing {
            let reaction = self.reactions.get(rid);
            if reaction.kept || !reaction.reactants.contains(&id) {
                continue;
            }
            match self.reactions.mode {
                DropMode::Drop => self.destroy(rid),
                DropMode::Keep | DropMode::Soft => self.unregister(rid),
            }
        }
    }

    /// Recomputes the propensity of every registered reaction referencing
    /// the species.
    fn propagate(&mut self, id: SpeciesId) -> Result<(), Finished> {
        let referencing: Vec<ReactionId> =
            self.species.get(id).reactions.iter().copied().collect();
        for rid in referencing {
            self.refresh(rid)?;
        }
        Ok(())
    }

    /// Pushes the current propensity of a registered reaction into the index.
    pub fn refresh(&mut self, rid: ReactionId) -> Result<(), Finished> {
        let reaction = self.reactions.get(rid);
        if let Some(slot) = reaction.slot {
            let weight = reaction.propensity(&self.species);
            self.proba.update(slot, weight)?;
        }
        Ok(())
    }

    /// Turns a descriptor into a pooled, registered reaction.
    ///
    /// An already pooled name is deduplicated; if it sits unregistered in
    /// the pool (keep mode after a deactivation) it is re-registered with
    /// its current propensity.
    pub fn materialize(&mut self, descr: &ReacDescr) -> Result<ReactionId, Finished> {
        let name = descr.name();
        if let Some(rid) = self.reactions.lookup(&name) {
            if self.reactions.get(rid).slot.is_none() {
                self.register(rid);
            }
            return Ok(rid);
        }
        let model = Arc::clone(&self.model);
        let rule = model
            .rule(&descr.kind)
            .ok_or_else(|| Finished::BadFile(format!("unknown rule kind {:?}", descr.kind)))?;
        let reactants: SmallVec<[SpeciesId; 2]> = descr
            .reactants
            .iter()
            .map(|reactant| self.species_id(reactant))
            .collect();
        let catal = descr.catal.as_ref().map(|catal| self.species_id(catal));
        let order = reactants.len() as u8;
        let dimer = order == 2 && reactants[0] == reactants[1];
        let names: Vec<&str> = descr.reactants.iter().map(String::as_str).collect();
        let mut constant = (rule.konst)(&names, &self.rates, descr.variant);
        if order == 2 {
            constant /= self.vol;
            if dimer {
                constant /= 2.0;
            }
        }
        if catal.is_some() {
            constant *= self.rates.catconst(&descr.kind);
            constant /= self.vol;
        }
        let autocat = match catal {
            Some(c) if reactants.contains(&c) => {
                if dimer {
                    2
                } else {
                    1
                }
            }
            _ => 0,
        };
        let product_names = (rule.prod)(&names, descr.variant);
        let rid = self.reactions.insert(Reaction {
            name,
            kind: descr.kind.clone(),
            reactants: reactants.clone(),
            catal,
            autocat,
            constant,
            order,
            dimer,
            product_names,
            products: None,
            slot: None,
            kept: false,
        });
        for &sid in reactants.iter().chain(catal.iter()) {
            self.species.get_mut(sid).reactions.insert(rid);
        }
        self.register(rid);
        Ok(rid)
    }

    /// Claims an index slot for the reaction at its current propensity.
    fn register(&mut self, rid: ReactionId) {
        let weight = self.reactions.get(rid).propensity(&self.species);
        let slot = self.proba.register(rid, weight);
        self.reactions.get_mut(rid).slot = Some(slot);
        self.reactions.mark_active(rid);
    }

    /// Frees the reaction's index slot, leaving it pooled.
    fn unregister(&mut self, rid: ReactionId) {
        if let Some(slot) = self.reactions.get_mut(rid).slot.take() {
            self.proba.unregister(slot);
            self.reactions.mark_inactive(rid);
        }
    }

    /// Unregisters the reaction, detaches it from every species referencing
    /// it, and removes it from the pool.
    pub fn destroy(&mut self, rid: ReactionId) {
        self.unregister(rid);
        let reaction = self.reactions.remove(rid);
        for &sid in reaction.reactants.iter().chain(reaction.catal.iter()) {
            self.species.get_mut(sid).reactions.remove(&rid);
        }
    }

    /// Fires one reaction event: consume the reactants, then materialize and
    /// produce the products. A DecrZero raised by a reactant is enriched
    /// with the full reaction context before being surfaced.
    pub fn fire(&mut self, rid: ReactionId) -> Result<(), Finished> {
        let (name, reactants, catal, product_names, products, slot) = {
            let reaction = self.reactions.get(rid);
            (
                reaction.name.clone(),
                reaction.reactants.clone(),
                reaction.catal,
                reaction.product_names.clone(),
                reaction.products.clone(),
                reaction.slot,
            )
        };
        for &sid in &reactants {
            match self.dec(sid) {
                Ok(()) => {}
                Err(Finished::DecrZero(detail)) => {
                    let proba = slot.map_or(0.0, |slot| self.proba.weight(slot));
                    let mut context = format!("{detail} from {name} (p={proba}");
                    for &other in &reactants {
                        let species = self.species.get(other);
                        context += &format!(", [{}]={}", species.name, species.pop);
                    }
                    if let Some(catal) = catal {
                        let species = self.species.get(catal);
                        context += &format!(", catal[{}]={}", species.name, species.pop);
                    }
                    context.push(')');
                    return Err(Finished::DecrZero(context));
                }
                Err(err) => return Err(err),
            }
        }
        let product_ids = match products {
            Some(ids) => ids,
            None => {
                let ids: SmallVec<[SpeciesId; 2]> = product_names
                    .iter()
                    .map(|product| self.species_id(product))
                    .collect();
                // The reaction may have died mid-fire (last unit of a dimer);
                // only cache the resolution if it is still pooled.
                if let Some(reaction) = self.reactions.try_get_mut(rid) {
                    reaction.products = Some(ids.clone());
                }
                ids
            }
        };
        for &pid in &product_ids {
            self.inc(pid)?;
        }
        Ok(())
    }

    /// Parses a structured reaction name, materializes it, and pins it so it
    /// survives depopulation of its reactants. Species pinned this way count
    /// as active even at population zero.
    pub fn add_kept(&mut self, name: &str) -> Result<ReactionId, Finished> {
        let descr = ReacDescr::parse(name)?;
        let rid = self.materialize(&descr)?;
        self.reactions.get_mut(rid).kept = true;
        let pinned: Vec<SpeciesId> = {
            let reaction = self.reactions.get(rid);
            reaction
                .reactants
                .iter()
                .chain(reaction.catal.iter())
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };
        for sid in pinned {
            self.species.get_mut(sid).kept.push(rid);
            if !self.species.is_active(sid) {
                self.activate(sid)?;
            }
        }
        Ok(rid)
    }

    /// Concentration of a species, zero when absent or inactive.
    pub fn conc_of(&self, name: &str) -> f64 {
        match self.species.lookup(name) {
            Some(id) if self.species.is_active(id) => {
                self.species.get(id).pop as f64 / self.vol
            }
            _ => 0.0,
        }
    }

    /// Total population per chain length, over active species.
    pub fn lendist(&self) -> BTreeMap<usize, u64> {
        let mut dist = BTreeMap::new();
        for (_, species) in self.species.iter_active() {
            *dist.entry(species.length).or_insert(0) += species.pop;
        }
        dist
    }

    /// Number of pooled species per chain length.
    pub fn pooldist(&self) -> BTreeMap<usize, u64> {
        let mut dist = BTreeMap::new();
        for (_, species) in self.species.iter_pool() {
            *dist.entry(species.length).or_insert(0) += 1;
        }
        dist
    }

    /// Longest active chain.
    pub fn maxlength(&self) -> usize {
        self.lendist().keys().last().copied().unwrap_or(0)
    }
}

/// Chain length of a name: the `length` property when the model computes
/// one, the character count otherwise.
fn length_of(descriptor: &mut Descriptor, name: &str) -> usize {
    match descriptor.info(name).properties.get("length") {
        Some(&length) => length as usize,
        None => name.chars().count(),
    }
}
