use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::i64 as variant_num,
    combinator::{all_consuming, opt},
    multi::separated_list0,
    IResult, Parser,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::descriptor::{Categorizer, Descriptor, Propertizer};
use crate::ends::Finished;
use crate::params::Rates;

/// Builds the product names of a reaction from its reactant names and the
/// variant index.
pub type ProdBuilder = Arc<dyn Fn(&[&str], Option<i64>) -> Vec<String> + Send + Sync>;
/// Computes the base rate constant of a reaction from its reactant names,
/// the resolved rate parameters, and the variant index.
pub type ConstBuilder = Arc<dyn Fn(&[&str], &Rates, Option<i64>) -> f64 + Send + Sync>;
/// Expands one reactant combination into the variants it spawns.
pub type VariantBuilder = Arc<dyn Fn(&[&str]) -> Vec<Option<i64>> + Send + Sync>;

/// Molar gas constant, in J·mol⁻¹·K⁻¹.
pub const GAS_CONSTANT: f64 = 8.314_462_618;

/// Derives one rate parameter from already resolved ones; applied once at
/// network construction.
#[derive(Clone)]
pub struct Relation {
    pub target: String,
    func: Arc<dyn Fn(&Rates, usize) -> f64 + Send + Sync>,
}

impl Relation {
    pub fn new(
        target: &str,
        func: impl Fn(&Rates, usize) -> f64 + Send + Sync + 'static,
    ) -> Relation {
        Relation {
            target: target.to_string(),
            func: Arc::new(func),
        }
    }

    pub fn apply(&self, rates: &Rates, rank: usize) -> f64 {
        (self.func)(rates, rank)
    }

    /// `target = source · factor`.
    pub fn mult(target: &str, source: &str, factor: f64) -> Relation {
        let source = source.to_string();
        Relation::new(target, move |rates, _| rates.k(&source) * factor)
    }

    /// Arrhenius law `target = prefactor · exp(−Ea / (R·T))`, with the
    /// activation energy and temperature read from the rate parameters.
    pub fn arrhenius(target: &str, prefactor: &str, ea: &str, temp: &str) -> Relation {
        let (prefactor, ea, temp) = (prefactor.to_string(), ea.to_string(), temp.to_string());
        Relation::new(target, move |rates, _| {
            rates.k(&prefactor) * (-rates.k(&ea) / (GAS_CONSTANT * rates.k(&temp))).exp()
        })
    }

    /// `target = base + slope · rank`, for parameters scanned over replicas.
    pub fn linear(target: &str, base: &str, slope: &str) -> Relation {
        let (base, slope) = (base.to_string(), slope.to_string());
        Relation::new(target, move |rates, rank| {
            rates.k(&base) + rates.k(&slope) * rank as f64
        })
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Relation -> {}", self.target)
    }
}

// Builder combinators.

/// A ProdBuilder joining the reactant names with `sep`.
pub fn joiner(sep: &str) -> ProdBuilder {
    let sep = sep.to_string();
    Arc::new(move |names, _| vec![names.join(&sep)])
}

/// A ConstBuilder returning the parameter `name_t` or `name_f` depending on
/// a predicate over the reactants and variant.
pub fn kalternate(
    condition: impl Fn(&[&str], Option<i64>) -> bool + Send + Sync + 'static,
    name_t: &str,
    name_f: &str,
) -> ConstBuilder {
    let (name_t, name_f) = (name_t.to_string(), name_f.to_string());
    Arc::new(move |names, rates, variant| {
        rates.k(if condition(names, variant) {
            &name_t
        } else {
            &name_f
        })
    })
}

/// A ConstBuilder choosing between three parameters from two predicates:
/// `name_tt` when both hold, `name_ff` when neither does, `name_tf` for the
/// mixed cases.
pub fn kdualchoice(
    condition_1: impl Fn(&[&str], Option<i64>) -> bool + Send + Sync + 'static,
    condition_2: impl Fn(&[&str], Option<i64>) -> bool + Send + Sync + 'static,
    name_tt: &str,
    name_ff: &str,
    name_tf: &str,
) -> ConstBuilder {
    let (name_tt, name_ff, name_tf) = (
        name_tt.to_string(),
        name_ff.to_string(),
        name_tf.to_string(),
    );
    Arc::new(move |names, rates, variant| {
        let first = condition_1(names, variant);
        let second = condition_2(names, variant);
        rates.k(match (first, second) {
            (true, true) => &name_tt,
            (false, false) => &name_ff,
            _ => &name_tf,
        })
    })
}

/// A ConstBuilder reading a single named parameter.
pub fn ksimple(name: &str) -> ConstBuilder {
    let name = name.to_string();
    Arc::new(move |_, rates, _| rates.k(&name))
}

/// The VariantBuilder of rules without variants.
pub fn novariant() -> VariantBuilder {
    Arc::new(|_| vec![None])
}

/// A VariantBuilder expanding to a single fixed variant.
pub fn singlevariant(num: i64) -> VariantBuilder {
    Arc::new(move |_| vec![Some(num)])
}

/// A VariantBuilder ranging from `first_offset` to the length of the first
/// reactant, exclusive. Offset 1 enumerates the internal bonds of a chain,
/// offset 0 its positions.
pub fn rangevariant(
    first_offset: i64,
    length: impl Fn(&str) -> i64 + Send + Sync + 'static,
) -> VariantBuilder {
    Arc::new(move |names| (first_offset..length(names[0])).map(Some).collect())
}

/// Name → implementation tables for every function kind a ruleset may refer
/// to. Populated at program start and immutable afterwards.
#[derive(Default)]
pub struct Registry {
    cats: FxHashMap<String, Categorizer>,
    props: FxHashMap<String, Propertizer>,
    prods: FxHashMap<String, ProdBuilder>,
    consts: FxHashMap<String, ConstBuilder>,
    variants: FxHashMap<String, VariantBuilder>,
    relations: FxHashMap<String, Relation>,
}

impl Registry {
    pub fn add_cat(&mut self, name: &str, rule: impl Fn(&str) -> bool + Send + Sync + 'static) {
        self.cats.insert(name.to_string(), Arc::new(rule));
    }

    pub fn add_prop(&mut self, name: &str, func: impl Fn(&str) -> f64 + Send + Sync + 'static) {
        self.props.insert(name.to_string(), Arc::new(func));
    }

    pub fn add_prod(&mut self, name: &str, builder: ProdBuilder) {
        self.prods.insert(name.to_string(), builder);
    }

    pub fn add_const(&mut self, name: &str, builder: ConstBuilder) {
        self.consts.insert(name.to_string(), builder);
    }

    pub fn add_variant(&mut self, name: &str, builder: VariantBuilder) {
        self.variants.insert(name.to_string(), builder);
    }

    pub fn add_relation(&mut self, name: &str, relation: Relation) {
        self.relations.insert(name.to_string(), relation);
    }
}

/// One rule of a ruleset configuration, referring to its builder functions
/// by registry name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    /// Category required of each reactant slot.
    pub reactants: Vec<String>,
    pub builder_func: String,
    pub builder_const: String,
    pub builder_variant: String,
    /// Category whose active members catalyze the reaction, if any.
    #[serde(default)]
    pub catal: Option<String>,
    #[serde(default)]
    pub descr: String,
}

/// A ruleset definition: which categories to index, which properties to
/// cache, which parameter relations to apply, and the rules themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesetConfig {
    pub categories: Vec<String>,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub relations: Vec<String>,
    pub rules: BTreeMap<String, RuleDef>,
}

/// A rule with its builders resolved from the registry.
#[derive(Clone)]
pub struct Rule {
    pub kind: String,
    pub reactants: Vec<String>,
    pub catal: Option<String>,
    pub prod: ProdBuilder,
    pub konst: ConstBuilder,
    pub variants: VariantBuilder,
    pub descr: String,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({:?})", self.kind, self.descr, self.reactants)
    }
}

/// A compiled ruleset: the rules with resolved builders, plus the category
/// and property functions the descriptor needs.
pub struct Model {
    pub rules: Vec<Rule>,
    pub categories: Vec<String>,
    pub relations: Vec<Relation>,
    cats: Vec<(String, Categorizer)>,
    props: Vec<(String, Propertizer)>,
}

impl Model {
    /// Resolves a configuration against a registry. Any name the registry
    /// does not know, and any rule of kinetic order above two, is a BadFile.
    pub fn from_config(config: &RulesetConfig, registry: &Registry) -> Result<Model, Finished> {
        let mut cats = Vec::new();
        for name in &config.categories {
            let rule = registry
                .cats
                .get(name)
                .ok_or_else(|| Finished::BadFile(format!("unknown category {name:?}")))?;
            cats.push((name.clone(), Arc::clone(rule)));
        }
        let mut props = Vec::new();
        for name in &config.properties {
            let func = registry
                .props
                .get(name)
                .ok_or_else(|| Finished::BadFile(format!("unknown property {name:?}")))?;
            props.push((name.clone(), Arc::clone(func)));
        }
        let mut relations = Vec::new();
        for name in &config.relations {
            let relation = registry
                .relations
                .get(name)
                .ok_or_else(|| Finished::BadFile(format!("unknown relation {name:?}")))?;
            relations.push(relation.clone());
        }
        let mut rules = Vec::new();
        for (kind, def) in &config.rules {
            if def.reactants.is_empty() || def.reactants.len() > 2 {
                return Err(Finished::BadFile(format!(
                    "rule {kind:?} has {} reactants; kinetic orders above two are not supported",
                    def.reactants.len()
                )));
            }
            for cat in def.reactants.iter().chain(def.catal.iter()) {
                if !config.categories.contains(cat) {
                    return Err(Finished::BadFile(format!(
                        "rule {kind:?} refers to unindexed category {cat:?}"
                    )));
                }
            }
            let prod = registry.prods.get(&def.builder_func).ok_or_else(|| {
                Finished::BadFile(format!("unknown product builder {:?}", def.builder_func))
            })?;
            let konst = registry.consts.get(&def.builder_const).ok_or_else(|| {
                Finished::BadFile(format!("unknown constant builder {:?}", def.builder_const))
            })?;
            let variants = registry.variants.get(&def.builder_variant).ok_or_else(|| {
                Finished::BadFile(format!("unknown variant builder {:?}", def.builder_variant))
            })?;
            rules.push(Rule {
                kind: kind.clone(),
                reactants: def.reactants.clone(),
                catal: def.catal.clone(),
                prod: Arc::clone(prod),
                konst: Arc::clone(konst),
                variants: Arc::clone(variants),
                descr: def.descr.clone(),
            });
        }
        Ok(Model {
            rules,
            categories: config.categories.clone(),
            relations,
            cats,
            props,
        })
    }

    /// A fresh descriptor over this model's categories and properties.
    pub fn descriptor(&self) -> Descriptor {
        let mut descriptor = Descriptor::new();
        for (name, rule) in &self.cats {
            descriptor.add_cat(name, Arc::clone(rule));
        }
        for (name, func) in &self.props {
            descriptor.add_prop(name, Arc::clone(func));
        }
        descriptor
    }

    pub fn rule(&self, kind: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.kind == kind)
    }

    /// Every reaction descriptor in which `name` takes part as a reactant,
    /// given its sorted categories and a lookup of the currently active
    /// members of each category.
    ///
    /// The species is pinned at each reactant slot it can fill in turn; the
    /// other slots range over the active members of their category, and each
    /// combination is expanded by the rule's variant builder, then crossed
    /// with the active catalysts where the rule asks for one. Duplicate
    /// descriptors (the same structured name reached through different slots)
    /// are expected and deduplicated by the reaction pool.
    pub fn reactions_for(
        &self,
        name: &str,
        categories: &[String],
        members: impl Fn(&str) -> Vec<String>,
    ) -> Vec<ReacDescr> {
        let mut result = Vec::new();
        for rule in &self.rules {
            for pos in 0..rule.reactants.len() {
                if !categories.contains(&rule.reactants[pos]) {
                    continue;
                }
                let slots: Vec<Vec<String>> = rule
                    .reactants
                    .iter()
                    .enumerate()
                    .map(|(other, cat)| {
                        if other == pos {
                            vec![name.to_string()]
                        } else {
                            members(cat)
                        }
                    })
                    .collect();
                if slots.iter().any(|slot| slot.is_empty()) {
                    continue;
                }
                for combo in slots.into_iter().multi_cartesian_product() {
                    let refs: Vec<&str> = combo.iter().map(String::as_str).collect();
                    for variant in (rule.variants)(&refs) {
                        match &rule.catal {
                            None => result.push(ReacDescr {
                                kind: rule.kind.clone(),
                                reactants: combo.clone(),
                                catal: None,
                                variant,
                            }),
                            Some(catcat) => {
                                for catal in members(catcat) {
                                    result.push(ReacDescr {
                                        kind: rule.kind.clone(),
                                        reactants: combo.clone(),
                                        catal: Some(catal),
                                        variant,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        result
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("rules", &self.rules)
            .field("categories", &self.categories)
            .finish()
    }
}

/// The identity of one reaction: a rule kind, its reactant names, an
/// optional catalyst, and an optional variant. Serializes to the structured
/// name `kind.reactants.catalyst.variant` that keys the reaction pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReacDescr {
    pub kind: String,
    pub reactants: Vec<String>,
    pub catal: Option<String>,
    pub variant: Option<i64>,
}

impl ReacDescr {
    /// The structured name, e.g. `P.aa+b..` or `H.aaaa..2`.
    pub fn name(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.kind,
            self.reactants.join("+"),
            self.catal.as_deref().unwrap_or(""),
            self.variant.map(|v| v.to_string()).unwrap_or_default()
        )
    }

    /// Parses a structured reaction name back into a descriptor.
    pub fn parse(name: &str) -> Result<ReacDescr, Finished> {
        all_consuming(descr_name)
            .parse(name)
            .map(|(_, descr)| descr)
            .map_err(|err| Finished::BadFile(format!("invalid reaction name {name:?}: {err}")))
    }
}

impl fmt::Display for ReacDescr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Parses one species name inside a reaction name.
fn species_name(data: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != '.' && c != '+').parse(data)
}

fn descr_name(data: &str) -> IResult<&str, ReacDescr> {
    let (rem, (kind, _, reactants, _, catal, _, variant)) = (
        take_while1(|c: char| c != '.'),
        tag("."),
        separated_list0(tag("+"), species_name),
        tag("."),
        take_while(|c: char| c != '.'),
        tag("."),
        opt(variant_num),
    )
        .parse(data)?;

    Ok((
        rem,
        ReacDescr {
            kind: kind.to_string(),
            reactants: reactants.iter().map(|s| s.to_string()).collect(),
            catal: (!catal.is_empty()).then(|| catal.to_string()),
            variant,
        },
    ))
}
