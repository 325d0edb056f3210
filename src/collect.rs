use std::collections::{BTreeSet, VecDeque};

use rustc_hash::FxHashMap;

use crate::arena::{Arena, ReactionId, ReactionMark, SpeciesId, SpeciesMark};
use crate::chemical::{Reaction, Species};
use crate::params::DropMode;

/// The pool of every species seen so far, its active subset, and the
/// per-category indices of active members.
///
/// The pool maps a name to a stable arena id on first lookup and never
/// forgets it. Active and category sets are id-ordered, so iterating them is
/// deterministic for a given seed.
#[derive(Debug, Default)]
pub struct SpeciesCollector {
    arena: Arena<SpeciesMark, Species>,
    pool: FxHashMap<String, SpeciesId>,
    active: BTreeSet<SpeciesId>,
    categories: FxHashMap<String, BTreeSet<SpeciesId>>,
}

impl SpeciesCollector {
    /// An empty collector maintaining an index for each given category.
    pub fn new(categories: &[String]) -> SpeciesCollector {
        SpeciesCollector {
            arena: Arena::new(),
            pool: FxHashMap::default(),
            active: BTreeSet::new(),
            categories: categories
                .iter()
                .map(|cat| (cat.clone(), BTreeSet::new()))
                .collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<SpeciesId> {
        self.pool.get(name).copied()
    }

    /// Stores a new species; its name must not be pooled yet.
    pub fn insert(&mut self, species: Species) -> SpeciesId {
        let name = species.name.clone();
        let id = self.arena.push(species);
        let previous = self.pool.insert(name, id);
        assert!(previous.is_none(), "species {} pooled twice", self.arena[id].name);
        id
    }

    pub fn get(&self, id: SpeciesId) -> &Species {
        &self.arena[id]
    }

    pub fn get_mut(&mut self, id: SpeciesId) -> &mut Species {
        &mut self.arena[id]
    }

    pub fn is_active(&self, id: SpeciesId) -> bool {
        self.active.contains(&id)
    }

    /// Inserts the species into the active set and each of its category
    /// indices.
    pub fn activate(&mut self, id: SpeciesId) {
        self.active.insert(id);
        let species = &self.arena[id];
        for cat in &species.categories {
            if let Some(index) = self.categories.get_mut(cat) {
                index.insert(id);
            }
        }
    }

    /// Removes the species from the active set and its category indices.
    pub fn deactivate(&mut self, id: SpeciesId) {
        self.active.remove(&id);
        let species = &self.arena[id];
        for cat in &species.categories {
            if let Some(index) = self.categories.get_mut(cat) {
                index.remove(&id);
            }
        }
    }

    /// The names of the active members of a category, in id order.
    pub fn category_names(&self, category: &str) -> Vec<String> {
        match self.categories.get(category) {
            Some(index) => index.iter().map(|&id| self.arena[id].name.clone()).collect(),
            None => Vec::new(),
        }
    }

    pub fn category_len(&self, category: &str) -> usize {
        self.categories.get(category).map_or(0, BTreeSet::len)
    }

    pub fn len_pool(&self) -> usize {
        self.arena.len()
    }

    pub fn len_active(&self) -> usize {
        self.active.len()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (SpeciesId, &Species)> {
        self.active.iter().map(|&id| (id, &self.arena[id]))
    }

    pub fn iter_pool(&self) -> impl Iterator<Item = (SpeciesId, &Species)> {
        self.arena.entries()
    }
}

/// The pool of reactions, keyed by structured name, over a slab arena.
///
/// Destroyed reactions leave their arena slot vacant; the slot id goes
/// through a FIFO queue and is reused by the next insertion, mirroring the
/// slot reuse of the probability index. The active set tracks the reactions
/// currently registered there.
#[derive(Debug)]
pub struct ReactionCollector {
    arena: Arena<ReactionMark, Option<Reaction>>,
    free: VecDeque<ReactionId>,
    pool: FxHashMap<String, ReactionId>,
    active: BTreeSet<ReactionId>,
    pub mode: DropMode,
}

impl ReactionCollector {
    pub fn new(mode: DropMode) -> ReactionCollector {
        ReactionCollector {
            arena: Arena::new(),
            free: VecDeque::new(),
            pool: FxHashMap::default(),
            active: BTreeSet::new(),
            mode,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<ReactionId> {
        self.pool.get(name).copied()
    }

    /// Pools a new reaction, reusing a vacant arena slot when one is queued.
    pub fn insert(&mut self, reaction: Reaction) -> ReactionId {
        let name = reaction.name.clone();
        let id = match self.free.pop_front() {
            Some(id) => {
                assert!(self.arena[id].is_none(), "reaction slot {id} reused while occupied");
                self.arena[id] = Some(reaction);
                id
            }
            None => self.arena.push(Some(reaction)),
        };
        let previous = self.pool.insert(name, id);
        assert!(previous.is_none(), "reaction {} pooled twice", self.get(id).name);
        id
    }

    /// Removes a reaction from the pool and vacates its slot.
    pub fn remove(&mut self, id: ReactionId) -> Reaction {
        let reaction = self.arena[id]
            .take()
            .unwrap_or_else(|| panic!("removing vacant reaction slot {id}"));
        self.pool.remove(&reaction.name);
        self.active.remove(&id);
        self.free.push_back(id);
        reaction
    }

    pub fn get(&self, id: ReactionId) -> &Reaction {
        self.arena[id]
            .as_ref()
            .unwrap_or_else(|| panic!("vacant reaction slot {id}"))
    }

    pub fn get_mut(&mut self, id: ReactionId) -> &mut Reaction {
        self.arena[id]
            .as_mut()
            .unwrap_or_else(|| panic!("vacant reaction slot {id}"))
    }

    pub fn try_get(&self, id: ReactionId) -> Option<&Reaction> {
        self.arena.get(id).and_then(Option::as_ref)
    }

    pub fn try_get_mut(&mut self, id: ReactionId) -> Option<&mut Reaction> {
        self.arena[id].as_mut()
    }

    pub fn mark_active(&mut self, id: ReactionId) {
        self.active.insert(id);
    }

    pub fn mark_inactive(&mut self, id: ReactionId) {
        self.active.remove(&id);
    }

    pub fn len_pool(&self) -> usize {
        self.pool.len()
    }

    pub fn len_active(&self) -> usize {
        self.active.len()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (ReactionId, &Reaction)> {
        self.active.iter().map(|&id| (id, self.get(id)))
    }

    pub fn iter_pool(&self) -> impl Iterator<Item = (ReactionId, &Reaction)> {
        self.arena
            .entries()
            .filter_map(|(id, slot)| slot.as_ref().map(|reaction| (id, reaction)))
    }
}
