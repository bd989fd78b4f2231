//! Monte-Carlo exemplar search.
//!
//! Finds a representative path for a set of targets without the quadratic
//! cost of an exact medoid: a fixed number of random candidates are each
//! scored against a fixed number of random comparators, and the sampled mean
//! cost is scaled up to the size of the set.

use std::borrow::Borrow;

use rand::Rng;

use crate::repr::{cost, LeafEstimate, PathValue};

use super::TrainError;

/// Sampling budget of one exemplar search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExemplarParams {
    /// Candidate exemplars drawn.
    pub exemplar_trials: usize,
    /// Comparators drawn per candidate, with replacement.
    pub cost_trials: usize,
}

impl Default for ExemplarParams {
    fn default() -> Self {
        Self {
            exemplar_trials: 1000,
            cost_trials: 1000,
        }
    }
}

/// Estimate the best exemplar of `targets`.
///
/// The returned loss approximates `sum(cost(exemplar, t) for t in targets)`;
/// `data_quantity` is `targets.len()`. The first candidate with the strictly
/// lowest estimate wins, so the result depends only on `targets`, `params`
/// and the state of `rng`.
///
/// # Errors
///
/// [`TrainError::EmptyInput`] if `targets` is empty.
pub fn find_best_exemplar<P, R>(
    targets: &[P],
    params: &ExemplarParams,
    rng: &mut R,
) -> Result<LeafEstimate, TrainError>
where
    P: Borrow<PathValue>,
    R: Rng + ?Sized,
{
    let n = targets.len();
    if n == 0 {
        return Err(TrainError::EmptyInput);
    }
    let cost_trials = params.cost_trials.max(1);

    let mut best: Option<(usize, f64)> = None;
    for _ in 0..params.exemplar_trials.max(1) {
        let candidate = rng.gen_range(0..n);
        let exemplar = targets[candidate].borrow();
        let mut total = 0.0;
        for _ in 0..cost_trials {
            total += cost(exemplar, targets[rng.gen_range(0..n)].borrow());
        }
        let loss = total / cost_trials as f64 * n as f64;
        if best.map_or(true, |(_, best_loss)| loss < best_loss) {
            best = Some((candidate, loss));
        }
    }

    let (index, loss) = best.ok_or(TrainError::EmptyInput)?;
    Ok(LeafEstimate {
        exemplar: targets[index].borrow().clone(),
        data_quantity: n,
        loss,
    })
}

/// Exact aggregate cost of predicting `exemplar` for every target.
pub fn total_cost<P: Borrow<PathValue>>(exemplar: &PathValue, targets: &[P]) -> f64 {
    targets.iter().map(|t| cost(exemplar, t.borrow())).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn paths(texts: &[&str]) -> Vec<PathValue> {
        texts.iter().map(|t| t.parse().unwrap()).collect()
    }

    fn small() -> ExemplarParams {
        ExemplarParams {
            exemplar_trials: 50,
            cost_trials: 50,
        }
    }

    #[test]
    fn empty_input_fails() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let targets: Vec<PathValue> = Vec::new();
        assert!(matches!(
            find_best_exemplar(&targets, &small(), &mut rng),
            Err(TrainError::EmptyInput)
        ));
    }

    #[test]
    fn identical_targets_give_minimum_loss() {
        let targets = paths(&["1.2", "1.2"]);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let est = find_best_exemplar(&targets, &ExemplarParams::default(), &mut rng).unwrap();
        assert_eq!(est.exemplar.to_string(), "1.2");
        assert_eq!(est.data_quantity, 2);
        // Two comparators at 2^-2 each.
        assert_relative_eq!(est.loss, 0.5);
        assert_relative_eq!(est.loss, total_cost(&est.exemplar, &targets));
    }

    #[test]
    fn same_seed_same_result() {
        let targets = paths(&["1.2.3", "1.2.4", "1.5", "2.1", "2.1.1", "1.2.3.9"]);
        let run = |seed| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            find_best_exemplar(&targets, &small(), &mut rng).unwrap()
        };
        assert_eq!(run(3), run(3));
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn majority_branch_wins_with_enough_trials() {
        let mut texts = vec!["1.2.3"; 20];
        texts.extend(["4.1", "5.1"]);
        let targets = paths(&texts);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let est = find_best_exemplar(&targets, &small(), &mut rng).unwrap();
        assert_eq!(est.exemplar.to_string(), "1.2.3");
    }

    #[test]
    fn accepts_borrowed_targets() {
        let owned = paths(&["3.1", "3.1.2"]);
        let borrowed: Vec<&PathValue> = owned.iter().collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let est = find_best_exemplar(&borrowed, &small(), &mut rng).unwrap();
        assert!(est.exemplar.to_string().starts_with("3.1"));
        // Both share two components with "3.1".
        assert_relative_eq!(total_cost(&owned[0], &borrowed), 0.25 + 0.25);
    }
}
