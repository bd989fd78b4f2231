//! Fixtures for tests and benchmarks.
//!
//! Everything here is deterministic: a seed and a fixed clock epoch fully
//! determine the data and the timestamps.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::prelude::*;

use crate::data::{ExampleId, TrainingExample};
use crate::repr::PathValue;
use crate::store::{ManualClock, MemoryStore, StoreResult};
use crate::training::TrainingConfig;

/// Start of fixture time.
pub fn fixture_epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// A clock starting at [`fixture_epoch`] that advances one second per read.
pub fn ticking_clock() -> ManualClock {
    ManualClock::ticking(fixture_epoch(), Duration::seconds(1))
}

/// The smallest interesting data set: two examples of `1.2` whose context is
/// `1.2`, and one `3.1` whose context is `3.1`.
pub fn three_examples() -> Vec<TrainingExample> {
    let path = |text: &str| PathValue::parse(text).unwrap_or_else(|e| panic!("bad fixture path: {e}"));
    vec![
        TrainingExample::new(1, path("1.2"), vec![path("1.2")]),
        TrainingExample::new(2, path("1.2"), vec![path("1.2")]),
        TrainingExample::new(3, path("3.1"), vec![path("3.1")]),
    ]
}

/// Synthetic examples over a small taxonomy.
///
/// Targets are `a.b` with `a` in `1..=branches` and `b` in `1..=branches`.
/// Context position 1 shares the target's top-level category with
/// probability `signal`; the other positions are uniform noise.
pub fn synthetic_examples(
    n: usize,
    context_length: usize,
    branches: u32,
    signal: f64,
    seed: u64,
) -> Vec<TrainingExample> {
    assert!(branches >= 1, "need at least one branch");
    assert!((0.0..=1.0).contains(&signal));
    let mut rng = StdRng::seed_from_u64(seed);
    let random_path = |rng: &mut StdRng, top: Option<u32>| {
        let a = top.unwrap_or_else(|| rng.gen_range(1..=branches));
        let b = rng.gen_range(1..=branches);
        let depth = rng.gen_range(1..=3);
        let components = [a, b, rng.gen_range(1..=branches)][..depth].to_vec();
        PathValue::new(components).unwrap_or_else(|e| panic!("bad synthetic path: {e}"))
    };

    (0..n)
        .map(|i| {
            let a = rng.gen_range(1..=branches);
            let b = rng.gen_range(1..=branches);
            let target = PathValue::new(vec![a, b]).unwrap_or_else(|e| panic!("bad synthetic path: {e}"));
            let context = (0..context_length)
                .map(|k| {
                    let informative = k == 0 && rng.gen_bool(signal);
                    random_path(&mut rng, informative.then_some(a))
                })
                .collect();
            TrainingExample::new(i as ExampleId + 1, target, context)
        })
        .collect()
}

/// A store holding `examples`, on [`ticking_clock`].
pub fn store_with(examples: Vec<TrainingExample>) -> StoreResult<MemoryStore> {
    let store = MemoryStore::with_clock(ticking_clock());
    store.insert_examples(examples)?;
    Ok(store)
}

/// A configuration with small trial counts, for fast tests.
pub fn quick_config(context_length: usize, seed: u64) -> TrainingConfig {
    TrainingConfig::builder()
        .exemplar_trials(30)
        .cost_trials(30)
        .split_trials(8)
        .circles_per_split(6)
        .context_length(context_length)
        .seed(seed)
        .build()
        .unwrap_or_else(|e| panic!("invalid fixture config: {e}"))
}
