//! The bundled polymer chemistry: monomers written as single letters, chains
//! as words, activated chains with a trailing `*`. Case encodes chirality,
//! so `aA` is a heterochiral dimer and epimerization flips one letter.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ruleset::{
    joiner, kalternate, kdualchoice, novariant, rangevariant, singlevariant, Registry, Relation,
    RuleDef, RulesetConfig,
};

fn polym(name: &str) -> bool {
    !name.is_empty() && name.chars().all(char::is_alphabetic)
}

fn mono(name: &str) -> bool {
    polym(name) && name.chars().count() == 1
}

fn longpol(name: &str) -> bool {
    polym(name) && name.chars().count() > 1
}

fn actpol(name: &str) -> bool {
    name.ends_with('*') && polym(&name[..name.len() - 1])
}

fn actmono(name: &str) -> bool {
    actpol(name) && name.chars().count() == 2
}

fn length(name: &str) -> f64 {
    if polym(name) {
        name.chars().count() as f64
    } else if actpol(name) {
        (name.chars().count() - 1) as f64
    } else {
        0.0
    }
}

/// Chirality balance: +1 per uppercase letter, -1 per lowercase one.
fn asym(name: &str) -> f64 {
    name.chars()
        .map(|c| {
            if c.is_uppercase() {
                1.0
            } else if c.is_lowercase() {
                -1.0
            } else {
                0.0
            }
        })
        .sum()
}

fn samecase(one: char, two: char) -> bool {
    (one.is_lowercase() && two.is_lowercase()) || (one.is_uppercase() && two.is_uppercase())
}

fn char_at(name: &str, pos: usize) -> char {
    name.chars().nth(pos).unwrap_or(' ')
}

/// Whether the chain letter at `variant` has the same case as its successor.
fn samebefore(names: &[&str], variant: Option<i64>) -> bool {
    let name = names[0];
    let pos = variant.unwrap_or(0).max(0) as usize;
    pos + 1 < length(name) as usize && samecase(char_at(name, pos), char_at(name, pos + 1))
}

/// Whether the chain letter at `variant` has the same case as its predecessor.
fn sameafter(names: &[&str], variant: Option<i64>) -> bool {
    let name = names[0];
    let pos = variant.unwrap_or(0).max(0) as usize;
    pos > 0 && samecase(char_at(name, pos), char_at(name, pos - 1))
}

/// The registry of every named function the polymer rulesets refer to.
pub fn polymer_registry() -> Registry {
    let mut reg = Registry::default();

    reg.add_cat("mono", mono);
    reg.add_cat("polym", polym);
    reg.add_cat("longpol", longpol);
    reg.add_cat("actpol", actpol);
    reg.add_cat("actmono", actmono);
    reg.add_cat("left", |name| asym(name) < 0.0);
    reg.add_cat("right", |name| asym(name) > 0.0);

    reg.add_prop("length", length);
    reg.add_prop("asym", asym);

    reg.add_prod("merge", joiner(""));
    reg.add_prod(
        "cut",
        Arc::new(|names: &[&str], variant| {
            let name = names[0];
            let pos = variant.unwrap_or(0).max(0) as usize;
            let split = name
                .char_indices()
                .nth(pos)
                .map_or(name.len(), |(at, _)| at);
            vec![name[..split].to_string(), name[split..].to_string()]
        }),
    );
    reg.add_prod(
        "act_polym",
        Arc::new(|names: &[&str], _| vec![format!("{}{}", &names[0][..names[0].len() - 1], names[1])]),
    );
    reg.add_prod("activ", Arc::new(|names: &[&str], _| vec![format!("{}*", names[0])]));
    reg.add_prod(
        "deactiv",
        Arc::new(|names: &[&str], _| vec![names[0][..names[0].len() - 1].to_string()]),
    );
    reg.add_prod(
        "epimer",
        Arc::new(|names: &[&str], variant| {
            let pos = variant.unwrap_or(0).max(0) as usize;
            vec![names[0]
                .chars()
                .enumerate()
                .map(|(at, c)| {
                    if at == pos {
                        if c.is_uppercase() {
                            c.to_ascii_lowercase()
                        } else {
                            c.to_ascii_uppercase()
                        }
                    } else {
                        c
                    }
                })
                .collect()]
        }),
    );
    reg.add_prod("vanish", Arc::new(|_: &[&str], _| Vec::new()));

    reg.add_const(
        "kpol",
        kalternate(|names, _| length(names[0]) as i64 == 1, "kpol_mono", "kpol_long"),
    );
    reg.add_const(
        "kpola",
        kalternate(
            |names, _| {
                samecase(
                    char_at(names[0], names[0].chars().count() - 2),
                    char_at(names[1], 0),
                )
            },
            "kpola_same",
            "kpola_diff",
        ),
    );
    reg.add_const(
        "kpola_mono",
        kalternate(
            |names, _| {
                samecase(
                    char_at(names[0], names[0].chars().count() - 2),
                    char_at(names[1], 0),
                )
            },
            "kpola_mono_same",
            "kpola_mono_diff",
        ),
    );
    reg.add_const(
        "kact",
        kalternate(|names, _| length(names[0]) as i64 == 1, "kact_mono", "kact_pol"),
    );
    reg.add_const(
        "kdeact",
        kalternate(|names, _| length(names[0]) as i64 == 1, "kdeact_mono", "kdeact_pol"),
    );
    reg.add_const(
        "khyd",
        kalternate(
            |names, variant| {
                let pos = variant.unwrap_or(1).max(1) as usize;
                samecase(char_at(names[0], pos - 1), char_at(names[0], pos))
            },
            "khyd_same",
            "khyd_diff",
        ),
    );
    reg.add_const(
        "kepi",
        kdualchoice(samebefore, sameafter, "kepi_same", "kepi_diff", "kepi_mixed"),
    );
    reg.add_const(
        "krac",
        kdualchoice(samebefore, sameafter, "krac_same", "krac_diff", "krac_mixed"),
    );

    reg.add_variant("novariant", novariant());
    reg.add_variant("intervariant", rangevariant(1, |name| length(name) as i64));
    reg.add_variant("lenvariant", rangevariant(0, |name| length(name) as i64));
    reg.add_variant("firstonly", singlevariant(0));

    // Parameter relations a ruleset may opt into.
    reg.add_relation(
        "khyd_thermal",
        Relation::arrhenius("khyd_same", "khyd_prefactor", "khyd_ea", "temperature"),
    );
    reg.add_relation("kpol_rank", Relation::linear("kpol_long", "kpol_base", "kpol_slope"));
    reg.add_relation("krac_from_kepi", Relation::mult("krac_same", "kepi_same", 1.0));

    reg
}

fn rule(
    reactants: &[&str],
    builder_func: &str,
    builder_const: &str,
    builder_variant: &str,
    descr: &str,
) -> RuleDef {
    RuleDef {
        reactants: reactants.iter().map(|s| s.to_string()).collect(),
        builder_func: builder_func.to_string(),
        builder_const: builder_const.to_string(),
        builder_variant: builder_variant.to_string(),
        catal: None,
        descr: descr.to_string(),
    }
}

/// The default polymer ruleset: polymerization, activated polymerization,
/// chain activation, hydrolysis, and epimerization.
pub fn default_config() -> RulesetConfig {
    let mut rules = BTreeMap::new();
    rules.insert(
        "P".to_string(),
        rule(&["polym", "polym"], "merge", "kpol", "novariant", "Polymerization"),
    );
    rules.insert(
        "A".to_string(),
        rule(
            &["actpol", "polym"],
            "act_polym",
            "kpola",
            "novariant",
            "Activated Polymerization",
        ),
    );
    rules.insert(
        "M".to_string(),
        rule(
            &["actmono", "polym"],
            "act_polym",
            "kpola_mono",
            "novariant",
            "Activated Monomer Polymerization",
        ),
    );
    rules.insert(
        "a".to_string(),
        rule(&["polym"], "activ", "kact", "novariant", "Activation"),
    );
    rules.insert(
        "d".to_string(),
        rule(&["actpol"], "deactiv", "kdeact", "novariant", "Deactivation"),
    );
    rules.insert(
        "H".to_string(),
        rule(&["polym"], "cut", "khyd", "intervariant", "Hydrolysis"),
    );
    rules.insert(
        "R".to_string(),
        rule(&["longpol"], "epimer", "krac", "lenvariant", "Epimerization"),
    );
    rules.insert(
        "E".to_string(),
        rule(
            &["longpol"],
            "epimer",
            "kepi",
            "firstonly",
            "Epimerization at first end",
        ),
    );
    RulesetConfig {
        categories: vec![
            "mono".to_string(),
            "polym".to_string(),
            "longpol".to_string(),
            "actpol".to_string(),
            "actmono".to_string(),
            "left".to_string(),
            "right".to_string(),
        ],
        properties: vec!["length".to_string(), "asym".to_string()],
        relations: Vec::new(),
        rules,
    }
}
