use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use rulespie::models::{default_config, polymer_registry};
use rulespie::{Engine, Model, Param, DEFAULT_SEED};

fn criterion_benchmark(c: &mut Criterion) {
    let mut config = default_config();
    config.rules.retain(|kind, _| kind == "P" || kind == "H");
    let model = Arc::new(Model::from_config(&config, &polymer_registry()).unwrap());

    let mut param = Param::default();
    param.init.insert("a".to_string(), 200);
    param.conc = 1.0;
    param.tend = 5.0;
    param.tstep = 1.0;
    param.seed = DEFAULT_SEED;
    param.consts = [
        ("kpol_mono", 1.0),
        ("kpol_long", 1.0),
        ("khyd_same", 1.0),
        ("khyd_diff", 1.0),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();

    c.bench_function("polymer soup", |b| {
        b.iter(|| {
            let engine = Engine::new(Arc::clone(&model), black_box(param.clone())).unwrap();
            engine.run()
        })
    });
}

criterion_group! {
    name=benches; config=Criterion::default().sample_size(10); targets=criterion_benchmark
}
criterion_main!(benches);
