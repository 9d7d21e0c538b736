//! Uniform random sampling of the coordinate space.

use super::{Coordinates, SearchTechnique};
use crate::tuning_data::Cost;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Each proposal is an i.i.d. uniform draw from `(0,1]^D`, implemented
/// as `1 − U[0,1)`. Stateless apart from the PRNG; cost reports are
/// ignored.
#[derive(Debug)]
pub struct RandomSearch {
    dimensionality: usize,
    rng: StdRng,
}

impl RandomSearch {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic proposal sequence for a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        RandomSearch {
            dimensionality: 0,
            rng,
        }
    }
}

impl Default for RandomSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTechnique for RandomSearch {
    fn initialize(&mut self, dimensionality: usize) {
        self.dimensionality = dimensionality;
    }

    fn next_coordinates(&mut self) -> HashSet<Coordinates> {
        let point: Vec<f64> = (0..self.dimensionality)
            .map(|_| 1.0 - self.rng.gen::<f64>())
            .collect();
        HashSet::from([Coordinates::new(point)])
    }

    fn report_costs(&mut self, _costs: &HashMap<Coordinates, Option<Cost>>) {}

    fn name(&self) -> &'static str {
        "RandomSearch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draws_stay_in_half_open_unit_cube() {
        let mut technique = RandomSearch::with_seed(7);
        technique.initialize(4);
        for _ in 0..100 {
            let batch = technique.next_coordinates();
            let point = batch.iter().next().unwrap();
            assert_eq!(point.len(), 4);
            assert!(point.as_slice().iter().all(|&c| c > 0.0 && c <= 1.0));
        }
    }

    #[test]
    fn test_fixed_seed_reproduces_sequence() {
        let mut a = RandomSearch::with_seed(42);
        let mut b = RandomSearch::with_seed(42);
        a.initialize(3);
        b.initialize(3);
        for _ in 0..10 {
            assert_eq!(a.next_coordinates(), b.next_coordinates());
        }
    }
}
