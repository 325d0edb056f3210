use kdam::tqdm;
use rand::{rngs::StdRng, SeedableRng};

use crate::arena::ReactionId;
use crate::ends::Finished;
use crate::proba::ProbaIndex;

fn rid(index: usize) -> ReactionId {
    ReactionId::new(index)
}

#[test]
fn totals_track_register_update_unregister() {
    let mut index = ProbaIndex::new(1e-10);
    let a = index.register(rid(0), 1.0);
    let b = index.register(rid(1), 2.0);
    let _c = index.register(rid(2), 3.0);
    assert_eq!(index.total(), 6.0);
    assert_eq!(index.live(), 3);

    index.update(b, 4.0).unwrap();
    assert_eq!(index.total(), 8.0);
    assert_eq!(index.weight(b), 4.0);

    index.unregister(a);
    assert_eq!(index.live(), 2);
    index.clean();
    assert_eq!(index.total(), 7.0);
}

#[test]
fn freed_slots_are_reused_in_fifo_order() {
    let mut index = ProbaIndex::new(1e-10);
    let a = index.register(rid(0), 1.0);
    let b = index.register(rid(1), 1.0);
    let _c = index.register(rid(2), 1.0);
    index.unregister(a);
    index.unregister(b);
    assert_eq!(index.register(rid(3), 1.0), a);
    assert_eq!(index.register(rid(4), 1.0), b);
    assert_eq!(index.live(), 3);
}

#[test]
#[should_panic(expected = "double free")]
fn double_free_is_fatal() {
    let mut index = ProbaIndex::new(1e-10);
    let slot = index.register(rid(0), 1.0);
    index.unregister(slot);
    index.unregister(slot);
}

#[test]
fn tiny_weights_snap_to_zero() {
    let mut index = ProbaIndex::new(1e-10);
    let slot = index.register(rid(0), 1.0);
    index.update(slot, 1e-12).unwrap();
    assert_eq!(index.weight(slot), 0.0);
    assert_eq!(index.total(), 0.0);
}

#[test]
fn invalid_weights_are_round_errors() {
    let mut index = ProbaIndex::new(1e-10);
    let slot = index.register(rid(0), 1.0);
    assert!(matches!(
        index.update(slot, f64::NAN),
        Err(Finished::RoundError(_))
    ));
    assert!(matches!(
        index.update(slot, -1.0),
        Err(Finished::RoundError(_))
    ));
}

#[test]
fn choosing_from_an_empty_index_is_nomore() {
    let index = ProbaIndex::new(1e-10);
    let rng = &mut StdRng::seed_from_u64(0);
    assert!(matches!(index.choose(rng), Err(Finished::NoMore(_))));
}

#[test]
fn zero_weight_slots_are_never_chosen() {
    let mut index = ProbaIndex::new(1e-10);
    index.register(rid(0), 0.0);
    index.register(rid(1), 5.0);
    index.register(rid(2), 0.0);
    let rng = &mut StdRng::seed_from_u64(1);
    for _ in 0..100 {
        let (owner, dt) = index.choose(rng).unwrap();
        assert_eq!(owner, rid(1));
        assert!(dt > 0.0 && dt.is_finite());
    }
}

#[test]
fn the_index_grows_past_one_chunk() {
    let mut index = ProbaIndex::new(1e-10);
    for i in 0..600 {
        index.register(rid(i), 1.0);
    }
    assert_eq!(index.live(), 600);
    assert_eq!(index.total(), 600.0);
    index.clean();
    assert_eq!(index.total(), 600.0);
    let rng = &mut StdRng::seed_from_u64(2);
    for _ in 0..100 {
        assert!(index.choose(rng).is_ok());
    }
}

#[test]
fn register_update_unregister_leaves_the_total_unchanged() {
    let mut index = ProbaIndex::new(1e-10);
    index.register(rid(0), 1.5);
    index.register(rid(1), 2.5);
    index.clean();
    let before = index.total();

    let slot = index.register(rid(2), 0.75);
    index.update(slot, 3.25).unwrap();
    index.unregister(slot);
    index.clean();
    assert_eq!(index.total(), before);
}

/// The empirical pick frequency and waiting time must match the weights.
#[test]
fn choose_follows_the_weights() {
    let mut index = ProbaIndex::new(1e-10);
    index.register(rid(0), 1.0);
    index.register(rid(1), 3.0);
    let rng = &mut StdRng::seed_from_u64(3);

    let n = 1 << 16;
    let mut hits = 0u64;
    let mut dt_sum = 0.0;
    for _ in tqdm!(0..n, desc = "choose") {
        let (owner, dt) = index.choose(rng).unwrap();
        if owner == rid(1) {
            hits += 1;
        }
        dt_sum += dt;
    }
    let freq = hits as f64 / n as f64;
    assert!((freq - 0.75).abs() < 0.02, "frequency {freq}");
    let mean_dt = dt_sum / n as f64;
    assert!((mean_dt - 0.25).abs() < 0.01, "mean waiting time {mean_dt}");
}
