//! Differential evolution over the coordinate space.

use super::{clamp_coordinates_capped, wrap_unit, Coordinates, SearchTechnique};
use crate::tuning_data::Cost;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Population size; needs at least 4 so three distinct donors exist.
const NUM_VECTORS: usize = 30;
/// Vectors combined into the donor.
const NUM_MUT_VECTORS: usize = 3;
/// Mutation factor scaling the donor difference.
const F_VAL: f64 = 0.7;
/// Crossover rate mixing donor and current vector.
const CR: f64 = 0.2;

/// Classic three-vector DE: after seeding a random population and
/// evaluating it one member per step (invalid members are re-drawn),
/// each step crosses the current member with a donor
/// `v_a + F·(v_b − v_c)` and keeps the trial iff its cost does not
/// exceed the member's. Trials leaving `(0,1]` wrap by `fmod(|x|, 1)`.
#[derive(Debug)]
pub struct DifferentialEvolution {
    rng: StdRng,
    dimensionality: usize,
    population: Vec<Vec<f64>>,
    population_costs: Vec<Option<Cost>>,
    trial: Vec<f64>,
    current_vec: usize,
}

impl DifferentialEvolution {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        DifferentialEvolution {
            rng,
            dimensionality: 0,
            population: Vec::new(),
            population_costs: Vec::new(),
            trial: Vec::new(),
            current_vec: 0,
        }
    }

    fn uniform_draw(&mut self) -> Vec<f64> {
        (0..self.dimensionality)
            .map(|_| 1.0 - self.rng.gen::<f64>())
            .collect()
    }

    /// Three distinct population indices, all different from the
    /// current one.
    fn mutation_vector_indices(&mut self) -> [usize; NUM_MUT_VECTORS] {
        let mut indices = [0usize; NUM_MUT_VECTORS];
        for i in 0..NUM_MUT_VECTORS {
            loop {
                let candidate = self.rng.gen_range(0..NUM_VECTORS);
                if candidate != self.current_vec && !indices[..i].contains(&candidate) {
                    indices[i] = candidate;
                    break;
                }
            }
        }
        indices
    }

    fn build_trial_vector(&mut self) {
        let pivot = self.rng.gen_range(0..self.dimensionality);
        let donors = self.mutation_vector_indices();
        for d in 0..self.dimensionality {
            if self.rng.gen::<f64>() <= CR || d == pivot {
                self.trial[d] = self.population[donors[0]][d]
                    + F_VAL * (self.population[donors[1]][d] - self.population[donors[2]][d]);
            } else {
                self.trial[d] = self.population[self.current_vec][d];
            }
        }
        for c in &mut self.trial {
            *c = wrap_unit(*c);
        }
    }
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTechnique for DifferentialEvolution {
    fn initialize(&mut self, dimensionality: usize) {
        self.dimensionality = dimensionality;
        self.current_vec = 0;
        self.population = (0..NUM_VECTORS).map(|_| Vec::new()).collect();
        for i in 0..NUM_VECTORS {
            self.population[i] = self.uniform_draw();
        }
        self.population_costs = vec![None; NUM_VECTORS];
        self.trial = self.uniform_draw();
    }

    fn next_coordinates(&mut self) -> HashSet<Coordinates> {
        if self.population_costs[self.current_vec].is_none() {
            HashSet::from([clamp_coordinates_capped(
                &self.population[self.current_vec],
            )])
        } else {
            self.build_trial_vector();
            HashSet::from([clamp_coordinates_capped(&self.trial)])
        }
    }

    fn report_costs(&mut self, costs: &HashMap<Coordinates, Option<Cost>>) {
        debug_assert_eq!(costs.len(), 1, "expecting costs for exactly one coordinate");
        let Some((_, cost)) = costs.iter().next() else {
            return;
        };
        let cost = cost.unwrap_or(f64::INFINITY);
        match self.population_costs[self.current_vec] {
            None => {
                if cost == f64::INFINITY {
                    // member is infeasible; replace it and try again
                    // on the next pass
                    self.population[self.current_vec] = self.uniform_draw();
                } else {
                    self.population_costs[self.current_vec] = Some(cost);
                }
            }
            Some(current_cost) => {
                if cost <= current_cost {
                    self.population[self.current_vec] = self.trial.clone();
                    self.population_costs[self.current_vec] = Some(cost);
                }
            }
        }

        self.current_vec = (self.current_vec + 1) % NUM_VECTORS;
    }

    fn name(&self) -> &'static str {
        "DifferentialEvolution"
    }
}
