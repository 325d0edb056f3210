use std::collections::BTreeMap;

use crate::chemical::Network;
use crate::ends::Finished;
use crate::models::{default_config, polymer_registry};
use crate::params::{Param, Rates};
use crate::ruleset::{Model, ReacDescr, Relation, GAS_CONSTANT};
use crate::tests::{param_with, polymer_model};

#[test]
fn reaction_names_round_trip() {
    let plain = ReacDescr {
        kind: "P".to_string(),
        reactants: vec!["aa".to_string(), "b".to_string()],
        catal: None,
        variant: None,
    };
    assert_eq!(plain.name(), "P.aa+b..");
    assert_eq!(ReacDescr::parse("P.aa+b..").unwrap(), plain);

    let cut = ReacDescr {
        kind: "H".to_string(),
        reactants: vec!["aaaa".to_string()],
        catal: None,
        variant: Some(2),
    };
    assert_eq!(cut.name(), "H.aaaa..2");
    assert_eq!(ReacDescr::parse("H.aaaa..2").unwrap(), cut);

    let catalyzed = ReacDescr {
        kind: "cP".to_string(),
        reactants: vec!["aa".to_string(), "a".to_string()],
        catal: Some("A".to_string()),
        variant: Some(-1),
    };
    assert_eq!(catalyzed.name(), "cP.aa+a.A.-1");
    assert_eq!(ReacDescr::parse("cP.aa+a.A.-1").unwrap(), catalyzed);
}

#[test]
fn malformed_reaction_names_are_rejected() {
    for name in ["", "P.aa", "P.aa+b.", "P.aa+b..x", "P.aa+b..2extra"] {
        assert!(
            matches!(ReacDescr::parse(name), Err(Finished::BadFile(_))),
            "{name:?} parsed"
        );
    }
}

#[test]
fn categories_are_sorted_and_pure() {
    let model = polymer_model(&["P"]);
    let mut descriptor = model.descriptor();
    assert_eq!(descriptor.categories("a"), ["left", "mono", "polym"]);
    assert_eq!(descriptor.categories("aa"), ["left", "longpol", "polym"]);
    assert_eq!(descriptor.categories("aA"), ["longpol", "polym"]);
    assert_eq!(descriptor.categories("AA"), ["longpol", "polym", "right"]);
    assert_eq!(descriptor.categories("a*"), ["actmono", "actpol", "left"]);
    assert_eq!(descriptor.categories("ab*"), ["actpol", "left"]);
    // second query hits the cache and must agree
    assert_eq!(descriptor.categories("aa"), ["left", "longpol", "polym"]);
}

#[test]
fn properties_follow_the_model() {
    let model = polymer_model(&["P"]);
    let mut descriptor = model.descriptor();
    assert_eq!(descriptor.property("aaa", "length"), 3.0);
    assert_eq!(descriptor.property("aa*", "length"), 2.0);
    assert_eq!(descriptor.property("aA", "asym"), 0.0);
    assert_eq!(descriptor.property("ABa", "asym"), 1.0);
    assert_eq!(descriptor.property("aaa", "unknown"), 0.0);
}

#[test]
fn enumeration_pins_the_species_at_every_slot() {
    let model = polymer_model(&["P"]);
    let members = |cat: &str| -> Vec<String> {
        if cat == "polym" {
            vec!["a".to_string(), "b".to_string()]
        } else {
            Vec::new()
        }
    };
    let categories = ["left".to_string(), "mono".to_string(), "polym".to_string()];
    let descrs = model.reactions_for("a", &categories, members);
    // pinned first: (a,a), (a,b); pinned second: (a,a), (b,a)
    assert_eq!(descrs.len(), 4);
    let names: Vec<String> = descrs.iter().map(ReacDescr::name).collect();
    assert!(names.contains(&"P.a+a..".to_string()));
    assert!(names.contains(&"P.a+b..".to_string()));
    assert!(names.contains(&"P.b+a..".to_string()));
}

#[test]
fn hydrolysis_expands_one_reaction_per_bond() {
    let model = polymer_model(&["H"]);
    let param = param_with(
        &[("aaaa", 1)],
        &[("khyd_same", 1.0), ("khyd_diff", 1.0)],
        4.0,
    );
    let net = Network::new(model, &param, 0).unwrap();
    assert_eq!(net.reactions.len_pool(), 3);
    for variant in 1..=3 {
        assert!(net.reactions.lookup(&format!("H.aaaa..{variant}")).is_some());
    }
}

#[test]
fn unresolvable_configs_are_bad_files() {
    let registry = polymer_registry();

    let mut config = default_config();
    config
        .rules
        .get_mut("P")
        .unwrap()
        .builder_const = "missing".to_string();
    assert!(matches!(
        Model::from_config(&config, &registry),
        Err(Finished::BadFile(_))
    ));

    let mut config = default_config();
    config.rules.get_mut("P").unwrap().reactants =
        vec!["polym".to_string(), "polym".to_string(), "polym".to_string()];
    assert!(matches!(
        Model::from_config(&config, &registry),
        Err(Finished::BadFile(_))
    ));

    let mut config = default_config();
    config.categories = vec!["polym".to_string()];
    // rule P only needs polym, but rule a still asks for actpol products...
    config.rules.get_mut("A").unwrap().reactants = vec!["nosuchcat".to_string()];
    assert!(matches!(
        Model::from_config(&config, &registry),
        Err(Finished::BadFile(_))
    ));
}

#[test]
fn relations_resolve_once_from_named_parameters() {
    let mut param = Param::default();
    param.consts = BTreeMap::from([
        ("base".to_string(), 2.0),
        ("slope".to_string(), 0.5),
        ("pre".to_string(), 10.0),
        ("ea".to_string(), 1000.0),
        ("temp".to_string(), 300.0),
    ]);
    let relations = vec![
        Relation::mult("derived", "base", 3.0),
        Relation::linear("ramp", "base", "slope"),
        Relation::arrhenius("arr", "pre", "ea", "temp"),
    ];
    let rates = Rates::resolve(&param, &relations, 2);
    assert_eq!(rates.k("derived"), 6.0);
    assert_eq!(rates.k("ramp"), 3.0);
    let expected = 10.0 * (-1000.0 / (GAS_CONSTANT * 300.0)).exp();
    assert!((rates.k("arr") - expected).abs() < 1e-12);
    // unknown names resolve to zero, unknown catalytic factors to one
    assert_eq!(rates.k("missing"), 0.0);
    assert_eq!(rates.catconst("P"), 1.0);
}
