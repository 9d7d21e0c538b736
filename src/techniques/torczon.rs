//! Torczon multidirectional simplex search over the coordinate space.

use super::{clamp_coordinates_capped, Coordinates, SearchTechnique};
use crate::tuning_data::Cost;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Normalized side length of the initial simplex, in (0, 0.5].
const INIT_SIMPLEX_SIDE_LENGTH: f64 = 0.1;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    Reflected,
    Expanded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Active {
    Base,
    Test,
}

#[derive(Debug, Clone, Default)]
struct Simplex {
    vertices: Vec<Vec<f64>>,
    best_vertex: usize,
}

/// Maintains a simplex of `D + 1` vertices and repeatedly reflects it
/// through its best vertex; improving reflections are expanded,
/// failing ones contract the simplex and restart the evaluation
/// cycle. All transformed vertices are clamp-capped into `(0,1]`.
#[derive(Debug)]
pub struct Torczon {
    rng: StdRng,
    dimensionality: usize,
    base: Simplex,
    test: Simplex,
    active: Active,
    current_vertex: usize,
    current_center: usize,
    state: State,
    best_cost: Cost,
    cost_improved: bool,
}

impl Torczon {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Torczon {
            rng,
            dimensionality: 0,
            base: Simplex::default(),
            test: Simplex::default(),
            active: Active::Base,
            current_vertex: 0,
            current_center: 0,
            state: State::Initial,
            best_cost: f64::INFINITY,
            cost_improved: true,
        }
    }

    fn active_simplex(&self) -> &Simplex {
        match self.active {
            Active::Base => &self.base,
            Active::Test => &self.test,
        }
    }

    fn active_simplex_mut(&mut self) -> &mut Simplex {
        match self.active {
            Active::Base => &mut self.base,
            Active::Test => &mut self.test,
        }
    }

    /// Random base vertex plus one vertex per dimension, perturbed by
    /// the initial side length away from the nearer bound.
    fn initial_simplex_vertices(&mut self) -> Vec<Vec<f64>> {
        let base: Vec<f64> = (0..self.dimensionality)
            .map(|_| 1.0 - self.rng.gen::<f64>())
            .collect();
        let mut vertices = vec![base.clone()];
        for i in 0..self.dimensionality {
            let mut v = base.clone();
            if v[i] <= 0.5 {
                v[i] += INIT_SIMPLEX_SIDE_LENGTH;
            } else {
                v[i] -= INIT_SIMPLEX_SIDE_LENGTH;
            }
            vertices.push(v);
        }
        vertices
    }

    /// Component-wise affine map of every base vertex about the
    /// current center: `center·(1 − factor) + vertex·factor`.
    fn transform_base_vertices(&self, factor: f64) -> Vec<Vec<f64>> {
        let center = &self.base.vertices[self.current_center];
        self.base
            .vertices
            .iter()
            .map(|v| {
                let mapped: Vec<f64> = center
                    .iter()
                    .zip(v)
                    .map(|(c, x)| c * (1.0 - factor) + x * factor)
                    .collect();
                clamp_coordinates_capped(&mapped).as_slice().to_vec()
            })
            .collect()
    }

    fn switch_state(&mut self, new_state: State) {
        self.state = new_state;
        self.current_vertex = 0;
        self.cost_improved = false;
    }

    fn generate_next_simplex(&mut self) {
        match self.state {
            State::Initial => {
                self.test.vertices = self.transform_base_vertices(-1.0);
                self.test.best_vertex = 0;
                self.active = Active::Test;
                self.switch_state(State::Reflected);
            }
            State::Reflected => {
                if self.cost_improved {
                    self.base = self.test.clone();
                    self.test.vertices = self.transform_base_vertices(EXPANSION);
                    self.test.best_vertex = 0;
                    self.active = Active::Test;
                    self.switch_state(State::Expanded);
                } else {
                    self.base.vertices = self.transform_base_vertices(CONTRACTION);
                    self.base.best_vertex = 0;
                    self.active = Active::Base;
                    self.best_cost = f64::INFINITY;
                    self.current_center = 0;
                    self.switch_state(State::Initial);
                }
            }
            State::Expanded => {
                if self.cost_improved {
                    self.base = self.test.clone();
                }
                self.current_center = self.base.best_vertex;
                self.test.vertices = self.transform_base_vertices(-1.0);
                self.test.best_vertex = 0;
                self.active = Active::Test;
                self.switch_state(State::Reflected);
            }
        }
    }
}

impl Default for Torczon {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTechnique for Torczon {
    fn initialize(&mut self, dimensionality: usize) {
        self.dimensionality = dimensionality;
        self.base = Simplex {
            vertices: self.initial_simplex_vertices(),
            best_vertex: 0,
        };
        self.test = Simplex::default();
        self.active = Active::Base;
        self.state = State::Initial;
        self.current_vertex = 0;
        self.current_center = 0;
        self.cost_improved = true;
        self.best_cost = f64::INFINITY;
    }

    fn next_coordinates(&mut self) -> HashSet<Coordinates> {
        if self.current_vertex == self.dimensionality + 1 {
            self.generate_next_simplex();
        }
        let vertex = &self.active_simplex().vertices[self.current_vertex];
        HashSet::from([clamp_coordinates_capped(vertex)])
    }

    fn report_costs(&mut self, costs: &HashMap<Coordinates, Option<Cost>>) {
        debug_assert_eq!(costs.len(), 1, "expecting costs for exactly one coordinate");
        let Some((_, cost)) = costs.iter().next() else {
            return;
        };
        let cost = cost.unwrap_or(f64::INFINITY);
        if cost < self.best_cost {
            self.best_cost = cost;
            self.cost_improved = true;
            let vertex = self.current_vertex;
            self.active_simplex_mut().best_vertex = vertex;
            if self.state == State::Initial {
                self.current_center = vertex;
            }
        }
        self.current_vertex += 1;
    }

    fn name(&self) -> &'static str {
        "Torczon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(technique: &mut Torczon, cost: Cost) -> Coordinates {
        let point = technique.next_coordinates().iter().next().unwrap().clone();
        technique.report_costs(&HashMap::from([(point.clone(), Some(cost))]));
        point
    }

    #[test]
    fn test_initial_simplex_has_dimensionality_plus_one_vertices() {
        let mut technique = Torczon::with_seed(3);
        technique.initialize(4);
        assert_eq!(technique.base.vertices.len(), 5);
        for v in &technique.base.vertices {
            assert!(v.iter().all(|&c| c > 0.0 && c <= 1.0));
        }
    }

    #[test]
    fn test_reflection_after_initial_evaluations() {
        let mut technique = Torczon::with_seed(5);
        technique.initialize(2);
        step(&mut technique, 3.0);
        step(&mut technique, 2.0);
        step(&mut technique, 4.0);
        assert_eq!(technique.state, State::Initial);
        // requesting the next vertex rolls the simplex over
        let _ = technique.next_coordinates();
        assert_eq!(technique.state, State::Reflected);
        assert_eq!(technique.current_center, 1);
    }

    #[test]
    fn test_failed_reflection_contracts_and_resets() {
        let mut technique = Torczon::with_seed(7);
        technique.initialize(1);
        step(&mut technique, 1.0);
        step(&mut technique, 2.0);
        // reflected simplex: nothing beats cost 1.0
        step(&mut technique, 5.0);
        step(&mut technique, 6.0);
        let _ = technique.next_coordinates();
        assert_eq!(technique.state, State::Initial);
        assert_eq!(technique.best_cost, f64::INFINITY);
        assert_eq!(technique.current_center, 0);
    }

    #[test]
    fn test_vertices_remain_clamped() {
        let mut technique = Torczon::with_seed(11);
        technique.initialize(3);
        for round in 0..100 {
            let point = technique.next_coordinates().iter().next().unwrap().clone();
            assert!(
                point.as_slice().iter().all(|&c| c > 0.0 && c <= 1.0),
                "round {round}"
            );
            technique
                .report_costs(&HashMap::from([(point, Some((round % 7) as f64))]));
        }
    }
}
