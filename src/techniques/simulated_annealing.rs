//! Simulated annealing over the coordinate space.

use super::{clamp_coordinates_capped, Coordinates, SearchTechnique};
use crate::tuning_data::Cost;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Number of interpolation sub-steps between adjacent schedule
/// temperatures.
const INTERP_STEPS: usize = 100;
/// Fixed temperatures the cooling schedule interpolates between.
const TEMPS: [f64; 2] = [30.0, 0.0];

fn interp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

fn step_size(time: usize, temp: f64) -> f64 {
    (-(20.0 + time as f64 / 100.0) / (temp + 1.0)).exp()
}

/// Metropolis acceptance probability for moving from energy `e` to
/// `e_new` at temperature `temp`. Exponents above 10 clamp the
/// probability to zero.
fn acceptance(e: f64, e_new: f64, temp: f64) -> f64 {
    if e >= e_new {
        return 1.0;
    }
    if temp == 0.0 {
        return 0.0;
    }
    if 50.0 * (e_new - e) / temp > 10.0 {
        return 0.0;
    }
    (50.0 * (e - e_new) / temp).exp()
}

fn relative(result: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return result * f64::INFINITY;
    }
    result / baseline
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initialization,
    ExplorePlus,
    ExploreMinus,
}

/// Per-dimension neighborhood exploration with a precomputed cooling
/// schedule: every dimension is probed upward and downward around the
/// current point, then one neighbor survives Metropolis acceptance and
/// becomes the next center.
#[derive(Debug)]
pub struct SimulatedAnnealing {
    rng: StdRng,
    dimensionality: usize,
    state: State,
    time: usize,
    max_time: usize,
    current_parameter: usize,
    best_cost: Cost,
    temp: f64,
    step_size: f64,
    current: Vec<f64>,
    best: Vec<f64>,
    schedule: Vec<f64>,
    /// Probed neighbors of the current center, insertion-ordered so a
    /// seeded run stays deterministic.
    neighbors: Vec<(Coordinates, Cost)>,
}

impl SimulatedAnnealing {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        SimulatedAnnealing {
            rng,
            dimensionality: 0,
            state: State::Initialization,
            time: 0,
            max_time: 0,
            current_parameter: 0,
            best_cost: f64::INFINITY,
            temp: 0.0,
            step_size: 0.0,
            current: Vec::new(),
            best: Vec::new(),
            schedule: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    fn record_neighbor(&mut self, coordinates: Coordinates, cost: Cost) {
        if let Some(entry) = self.neighbors.iter_mut().find(|(c, _)| *c == coordinates) {
            entry.1 = cost;
        } else {
            self.neighbors.push((coordinates, cost));
        }
    }

    fn uniform_draw(&mut self) -> Vec<f64> {
        (0..self.dimensionality)
            .map(|_| 1.0 - self.rng.gen::<f64>())
            .collect()
    }

    /// Uniformly picks surviving neighbors until one passes Metropolis
    /// acceptance; rejected candidates are dropped. Falls back to the
    /// best point seen when every neighbor is rejected.
    fn select_next_center(&mut self) -> (Vec<f64>, Cost) {
        loop {
            if self.neighbors.is_empty() {
                return (self.best.clone(), self.best_cost);
            }
            let pick = self.rng.gen_range(0..self.neighbors.len());
            let (candidate, candidate_cost) = self.neighbors[pick].clone();
            let p = acceptance(1.0, relative(candidate_cost, self.best_cost), self.temp);
            if self.rng.gen::<f64>() < p {
                return (candidate.as_slice().to_vec(), candidate_cost);
            }
            self.neighbors.remove(pick);
        }
    }
}

impl Default for SimulatedAnnealing {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTechnique for SimulatedAnnealing {
    fn initialize(&mut self, dimensionality: usize) {
        self.dimensionality = dimensionality;
        self.state = State::Initialization;
        self.time = 0;
        self.schedule.clear();
        for t in 0..TEMPS.len() - 1 {
            for steps in (1..=INTERP_STEPS).rev() {
                self.schedule.push(interp(
                    TEMPS[t + 1],
                    TEMPS[t],
                    steps as f64 / INTERP_STEPS as f64,
                ));
            }
        }
        self.schedule.push(TEMPS[TEMPS.len() - 1]);
        self.max_time = self.schedule.len() - 1;
        self.neighbors.clear();
    }

    fn next_coordinates(&mut self) -> HashSet<Coordinates> {
        match self.state {
            State::Initialization => {
                self.current_parameter = 0;
                self.temp = self.schedule[self.time.min(self.max_time)];
                self.step_size = step_size(self.time, self.temp);
                self.current = self.uniform_draw();
                let clamped = clamp_coordinates_capped(&self.current);
                self.record_neighbor(clamped.clone(), 0.0);
                HashSet::from([clamped])
            }
            State::ExplorePlus => {
                let p = self.current_parameter;
                let mut probe = self.current.clone();
                if self.current[p] < 1.0 {
                    probe[p] += self.step_size * self.rng.gen::<f64>();
                } else {
                    // already at the upper bound; probe downward and
                    // skip straight to the minus phase
                    self.state = State::ExploreMinus;
                    probe[p] -= self.step_size * self.rng.gen::<f64>();
                }
                let clamped = clamp_coordinates_capped(&probe);
                self.record_neighbor(clamped.clone(), 0.0);
                HashSet::from([clamped])
            }
            State::ExploreMinus => {
                let p = self.current_parameter;
                let mut probe = self.current.clone();
                probe[p] -= self.step_size * self.rng.gen::<f64>();
                let clamped = clamp_coordinates_capped(&probe);
                self.record_neighbor(clamped.clone(), 0.0);
                HashSet::from([clamped])
            }
        }
    }

    fn report_costs(&mut self, costs: &HashMap<Coordinates, Option<Cost>>) {
        debug_assert_eq!(costs.len(), 1, "expecting costs for exactly one coordinate");
        let Some((coordinates, cost)) = costs.iter().next() else {
            return;
        };
        let cost = cost.unwrap_or(f64::INFINITY);
        self.record_neighbor(coordinates.clone(), cost);
        match self.state {
            State::Initialization => {
                self.best = coordinates.as_slice().to_vec();
                self.best_cost = cost;
                self.state = State::ExplorePlus;
            }
            State::ExplorePlus => {
                if cost < self.best_cost {
                    self.best = coordinates.as_slice().to_vec();
                    self.best_cost = cost;
                }
                self.state = State::ExploreMinus;
            }
            State::ExploreMinus => {
                if cost < self.best_cost {
                    self.best = coordinates.as_slice().to_vec();
                    self.best_cost = cost;
                }
                self.current_parameter += 1;
                if self.current_parameter == self.dimensionality {
                    self.current_parameter = 0;
                    let (next_center, next_cost) = self.select_next_center();
                    self.current = next_center;
                    self.time += 1;
                    if self.time > self.max_time {
                        self.time -= self.max_time;
                    }
                    self.temp = self.schedule[self.time.min(self.max_time)];
                    self.step_size = step_size(self.time, self.temp);
                    self.neighbors.clear();
                    self.record_neighbor(clamp_coordinates_capped(&self.current), next_cost);
                    self.state = State::ExplorePlus;
                } else {
                    self.state = State::ExplorePlus;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "SimulatedAnnealing"
    }
}
