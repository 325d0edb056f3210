use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::{run_replicas, Engine};
use crate::models::{default_config, polymer_registry};
use crate::output::RunResult;
use crate::ruleset::{ksimple, Model, RuleDef};
use crate::tests::{param_with, polymer_model};

#[test]
fn polymerization_conserves_mass() {
    let model = polymer_model(&["P"]);
    let mut param = param_with(
        &[("a", 100)],
        &[("kpol_mono", 1.0), ("kpol_long", 1.0)],
        1.0,
    );
    param.tend = 10.0;
    param.tstep = 1.0;
    param.seed = 1;
    let result = Engine::new(model, param).unwrap().run();

    assert!(result.ending.num <= 1, "ending: {}", result.ending.message);
    assert!(result.snapshots.len() >= 2);
    for snap in &result.snapshots {
        assert_eq!(snap.mass(), 100, "mass drifted at t={}", snap.now);
        for (name, _, _) in &snap.rates {
            assert!(name.starts_with("P."));
        }
    }
    let maxlength = result.table.iter().map(|row| row.maxlength).max().unwrap();
    assert!(maxlength > 1, "no chain ever grew");
}

#[test]
fn hydrolysis_stops_at_monomers() {
    let model = polymer_model(&["H"]);
    let mut param = param_with(
        &[("aaaa", 10)],
        &[("khyd_same", 1.0), ("khyd_diff", 1.0)],
        1.0,
    );
    param.tend = 50.0;
    param.tstep = 1.0;
    param.seed = 7;
    let result = Engine::new(model, param).unwrap().run();

    assert_eq!(result.ending.num, 1, "ending: {}", result.ending.message);
    for snap in &result.snapshots {
        let longest = snap.lendist.keys().max().copied().unwrap_or(0);
        assert!(longest <= 4, "chain of length {longest} at t={}", snap.now);
    }
    let last = result.snapshots.last().unwrap();
    // everything hydrolyzed down to the 40 monomers
    assert_eq!(last.lendist, BTreeMap::from([(1, 40)]));
    // the pool visited exactly one species per length
    assert_eq!(
        last.pooldist,
        BTreeMap::from([(1, 1), (2, 1), (3, 1), (4, 1)])
    );
}

#[test]
fn destruction_of_the_last_unit_ends_with_nomore() {
    let mut registry = polymer_registry();
    registry.add_const("kdestroy", ksimple("kdestroy"));
    let mut config = default_config();
    config.rules.clear();
    config.rules.insert(
        "D".to_string(),
        RuleDef {
            reactants: vec!["polym".to_string()],
            builder_func: "vanish".to_string(),
            builder_const: "kdestroy".to_string(),
            builder_variant: "novariant".to_string(),
            catal: None,
            descr: "Destruction".to_string(),
        },
    );
    let model = Arc::new(Model::from_config(&config, &registry).unwrap());
    let mut param = param_with(&[("a", 1)], &[("kdestroy", 1.0)], 1.0);
    param.seed = 3;
    let result = Engine::new(model, param).unwrap().run();

    assert_eq!(result.ending.num, 1);
    assert_eq!(result.table.len(), 2);
    let last = result.table.last().unwrap();
    assert_eq!(last.step, 1);
    // the recorded time is the single sampled waiting time
    assert!(last.now > 0.0);
    let final_snap = result.snapshots.last().unwrap();
    assert_eq!(final_snap.now, last.now);
    assert!(final_snap.populations.is_empty());
}

#[test]
fn an_empty_network_ends_immediately_with_nomore() {
    let model = polymer_model(&["P"]);
    let param = param_with(&[], &[("kpol_mono", 1.0)], 1.0);
    let result = Engine::new(model, param).unwrap().run();
    assert_eq!(result.ending.num, 1);
    assert_eq!(result.table.len(), 1);
    assert_eq!(result.table[0].now, 0.0);
}

#[test]
fn a_snapshot_is_taken_at_tend_even_past_tstep() {
    let model = polymer_model(&["P"]);
    let mut param = param_with(
        &[("a", 50)],
        &[("kpol_mono", 1.0), ("kpol_long", 1.0)],
        1.0,
    );
    param.tend = 0.5;
    param.tstep = 5.0;
    param.seed = 5;
    let result = Engine::new(model, param).unwrap().run();
    assert_eq!(result.ending.num, 0);
    assert_eq!(result.table.len(), 2);
    assert!(result.table[1].now >= 0.5);
}

#[test]
fn zero_constant_reactions_register_but_never_fire() {
    let model = polymer_model(&["P"]);
    let mut param = param_with(
        &[("a", 10)],
        &[("kpol_mono", 0.0), ("kpol_long", 0.0)],
        1.0,
    );
    param.seed = 11;
    param.save = vec!["a".to_string()];
    let result = Engine::new(model, param).unwrap().run();
    assert_eq!(result.ending.num, 1);
    assert_eq!(result.table.len(), 1);
    let snap = &result.snapshots[0];
    assert_eq!(snap.populations, vec![("a".to_string(), 10)]);
    assert_eq!(snap.rates.len(), 1);
    assert_eq!(snap.rates[0].2, 0.0);
}

fn seeded_run() -> RunResult {
    let model = polymer_model(&["P", "H"]);
    let mut param = param_with(
        &[("aaa", 30)],
        &[
            ("kpol_mono", 1.0),
            ("kpol_long", 1.0),
            ("khyd_same", 1.0),
            ("khyd_diff", 1.0),
        ],
        1.0,
    );
    param.tend = 2.0;
    param.tstep = 0.5;
    param.seed = 42;
    Engine::new(model, param).unwrap().run()
}

#[test]
fn identical_seeds_reproduce_bit_exact_trajectories() {
    let one = seeded_run();
    let two = seeded_run();
    assert_eq!(one.ending.num, two.ending.num);
    assert_eq!(one.snapshots, two.snapshots);
    // rows match except for the wall-clock fields
    let trajectory = |result: &RunResult| {
        result
            .table
            .iter()
            .map(|row| {
                (
                    row.step,
                    row.now.to_bits(),
                    row.concs.iter().map(|c| c.to_bits()).collect::<Vec<_>>(),
                    row.maxlength,
                    row.nbcomp,
                    row.poolsize,
                    row.nbreac,
                    row.poolreac,
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(trajectory(&one), trajectory(&two));
}

#[test]
fn replicas_run_on_distinct_seeds_and_gather_in_rank_order() {
    let model = polymer_model(&["P"]);
    let mut param = param_with(
        &[("a", 20)],
        &[("kpol_mono", 1.0), ("kpol_long", 1.0)],
        1.0,
    );
    param.tend = 1.0;
    param.tstep = 0.5;
    param.seed = 9;
    param.threads = 3;
    let results = run_replicas(&model, &param, None).unwrap();
    assert_eq!(results.len(), 3);
    for (rank, result) in results.iter().enumerate() {
        assert_eq!(result.rank, rank as i64);
        assert!(result.ending.num <= 1);
    }
    assert_ne!(results[0].snapshots, results[1].snapshots);
}
