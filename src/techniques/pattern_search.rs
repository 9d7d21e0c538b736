//! Hooke–Jeeves pattern search over the coordinate space.

use super::{clamp_coordinates_capped, wrap_unit, Coordinates, SearchTechnique};
use crate::tuning_data::Cost;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

const INITIAL_STEP_SIZE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initialization,
    ExploratoryPlus,
    ExploratoryMinus,
    Pattern,
}

/// Exploratory probes along each dimension around a base point; when a
/// sweep improves, the pattern move `2·exploratory − base` extrapolates
/// along the improvement direction, otherwise the step size halves and
/// the search restarts from the base. Steps leaving `(0,1]` wrap by
/// `fmod(|x|, 1)`.
#[derive(Debug)]
pub struct PatternSearch {
    rng: StdRng,
    dimensionality: usize,
    base: Vec<f64>,
    base_fitness: Cost,
    exploratory: Vec<f64>,
    exploratory_fitness: Cost,
    pattern: Vec<f64>,
    pattern_fitness: Cost,
    /// Set when the plus probe of the current dimension improved; the
    /// minus probe then has to undo a double step.
    trigger: bool,
    current_parameter: usize,
    step_size: f64,
    state: State,
}

impl PatternSearch {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        PatternSearch {
            rng,
            dimensionality: 0,
            base: Vec::new(),
            base_fitness: f64::INFINITY,
            exploratory: Vec::new(),
            exploratory_fitness: f64::INFINITY,
            pattern: Vec::new(),
            pattern_fitness: f64::INFINITY,
            trigger: false,
            current_parameter: 0,
            step_size: INITIAL_STEP_SIZE,
            state: State::Initialization,
        }
    }

    fn uniform_draw(&mut self) -> Vec<f64> {
        (0..self.dimensionality)
            .map(|_| 1.0 - self.rng.gen::<f64>())
            .collect()
    }
}

impl Default for PatternSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTechnique for PatternSearch {
    fn initialize(&mut self, dimensionality: usize) {
        self.dimensionality = dimensionality;
        self.base = self.uniform_draw();
        self.trigger = false;
        self.step_size = INITIAL_STEP_SIZE;
        self.current_parameter = 0;
        self.state = State::Initialization;
    }

    fn next_coordinates(&mut self) -> HashSet<Coordinates> {
        match self.state {
            State::Initialization => {
                self.exploratory = self.base.clone();
                self.pattern = self.base.clone();
                HashSet::from([clamp_coordinates_capped(&self.base)])
            }
            State::ExploratoryPlus => {
                self.exploratory[self.current_parameter] += self.step_size;
                HashSet::from([clamp_coordinates_capped(&self.exploratory)])
            }
            State::ExploratoryMinus => {
                if self.trigger {
                    self.exploratory[self.current_parameter] -= 2.0 * self.step_size;
                } else {
                    self.exploratory[self.current_parameter] -= self.step_size;
                }
                HashSet::from([clamp_coordinates_capped(&self.exploratory)])
            }
            State::Pattern => HashSet::from([clamp_coordinates_capped(&self.pattern)]),
        }
    }

    fn report_costs(&mut self, costs: &HashMap<Coordinates, Option<Cost>>) {
        debug_assert_eq!(costs.len(), 1, "expecting costs for exactly one coordinate");
        let Some((_, cost)) = costs.iter().next() else {
            return;
        };
        let cost = cost.unwrap_or(f64::INFINITY);
        match self.state {
            State::Initialization => {
                if cost == f64::INFINITY {
                    // infeasible starting point; roll a fresh one
                    self.base = self.uniform_draw();
                } else {
                    self.base_fitness = cost;
                    self.exploratory_fitness = cost;
                    self.pattern_fitness = cost;
                    self.state = State::ExploratoryPlus;
                }
            }
            State::ExploratoryPlus => {
                if cost < self.exploratory_fitness {
                    let p = self.current_parameter;
                    self.exploratory[p] = wrap_unit(self.exploratory[p] + self.step_size);
                    self.exploratory_fitness = cost;
                    self.trigger = true;
                }
                self.state = State::ExploratoryMinus;
            }
            State::ExploratoryMinus => {
                if cost < self.exploratory_fitness {
                    let p = self.current_parameter;
                    let undo = if self.trigger {
                        2.0 * self.step_size
                    } else {
                        self.step_size
                    };
                    self.exploratory[p] = wrap_unit(self.exploratory[p] - undo);
                    self.exploratory_fitness = cost;
                }
                self.trigger = false;
                self.current_parameter += 1;

                if self.current_parameter == self.dimensionality {
                    if self.exploratory_fitness < self.pattern_fitness {
                        for d in 0..self.dimensionality {
                            self.pattern[d] =
                                wrap_unit(2.0 * self.exploratory[d] - self.base[d]);
                        }
                        self.base = self.exploratory.clone();
                        self.base_fitness = self.exploratory_fitness;
                        self.exploratory = self.pattern.clone();
                        self.state = State::Pattern;
                    } else {
                        self.exploratory = self.base.clone();
                        self.exploratory_fitness = self.base_fitness;
                        self.pattern = self.base.clone();
                        self.pattern_fitness = self.base_fitness;
                        self.step_size *= 0.5;
                        self.state = State::ExploratoryPlus;
                    }
                    self.current_parameter = 0;
                } else {
                    self.state = State::ExploratoryPlus;
                }
            }
            State::Pattern => {
                self.pattern_fitness = cost;
                self.exploratory_fitness = cost;
                self.state = State::ExploratoryPlus;
            }
        }
    }

    fn name(&self) -> &'static str {
        "PatternSearch"
    }
}
