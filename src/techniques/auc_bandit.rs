//! Multi-armed bandit over coordinate techniques, rewarded by the
//! area under each technique's improvement curve.

use super::{Coordinates, PatternSearch, SearchTechnique, SimulatedAnnealing, Torczon};
use crate::tuning_data::Cost;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};

/// Exploration weight in the UCB-style score.
const DEFAULT_C: f64 = 0.05;
/// Number of recent outcomes the reward estimate is computed over.
const DEFAULT_WINDOW_SIZE: usize = 500;

#[derive(Debug, Clone, Copy)]
struct Outcome {
    technique: usize,
    improved: bool,
}

/// AUC bandit: keeps a sliding window of per-technique outcomes and
/// scores each technique by `AUC + c · sqrt(2·log2(|window|) / uses)`,
/// proposing through the argmax. Improvement is judged against the
/// bandit's own running best cost, not the tuner's.
///
/// Tie-breaking shuffles the technique order with the bandit's own
/// PRNG, so a fixed seed makes selection fully deterministic.
pub struct AucBandit {
    techniques: Vec<Box<dyn SearchTechnique + Send>>,
    c: f64,
    window_size: usize,
    rng: StdRng,
    current_technique: usize,
    current_best_cost: Cost,
    window: VecDeque<Outcome>,
    uses: Vec<u64>,
    raw_auc: Vec<u64>,
    decay: Vec<u64>,
}

impl AucBandit {
    /// The default arm set: simulated annealing, pattern search,
    /// Torczon.
    pub fn new() -> Self {
        Self::with_techniques(
            vec![
                Box::new(SimulatedAnnealing::new()),
                Box::new(PatternSearch::new()),
                Box::new(Torczon::new()),
            ],
            StdRng::from_entropy(),
        )
    }

    /// The default arm set with per-technique seeds derived from one.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_techniques(
            vec![
                Box::new(SimulatedAnnealing::with_seed(seed)),
                Box::new(PatternSearch::with_seed(seed.wrapping_add(1))),
                Box::new(Torczon::with_seed(seed.wrapping_add(2))),
            ],
            StdRng::seed_from_u64(seed.wrapping_add(3)),
        )
    }

    pub fn with_techniques(
        techniques: Vec<Box<dyn SearchTechnique + Send>>,
        rng: StdRng,
    ) -> Self {
        assert!(!techniques.is_empty(), "expecting at least one technique");
        let n = techniques.len();
        AucBandit {
            techniques,
            c: DEFAULT_C,
            window_size: DEFAULT_WINDOW_SIZE,
            rng,
            current_technique: 0,
            current_best_cost: f64::INFINITY,
            window: VecDeque::new(),
            uses: vec![0; n],
            raw_auc: vec![0; n],
            decay: vec![0; n],
        }
    }

    /// Overrides the exploration weight `c`.
    pub fn exploration_weight(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Overrides the sliding-window length.
    pub fn window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    fn push_outcome(&mut self, technique: usize, improved: bool) {
        if self.window.len() == self.window_size {
            if let Some(oldest) = self.window.pop_front() {
                self.uses[oldest.technique] -= 1;
                self.raw_auc[oldest.technique] -= self.decay[oldest.technique];
                if oldest.improved {
                    self.decay[oldest.technique] -= 1;
                }
            }
        }
        self.uses[technique] += 1;
        if improved {
            self.raw_auc[technique] += self.uses[technique];
            self.decay[technique] += 1;
        }
        self.window.push_back(Outcome {
            technique,
            improved,
        });
    }

    fn auc(&self, technique: usize) -> f64 {
        let uses = self.uses[technique];
        if uses > 0 {
            self.raw_auc[technique] as f64 * 2.0 / (uses as f64 * (uses as f64 + 1.0))
        } else {
            0.0
        }
    }

    fn exploration_value(&self, technique: usize) -> f64 {
        let uses = self.uses[technique];
        if uses > 0 {
            (2.0 * (self.window.len() as f64).log2() / uses as f64).sqrt()
        } else {
            f64::INFINITY
        }
    }

    fn score(&self, technique: usize) -> f64 {
        self.auc(technique) + self.c * self.exploration_value(technique)
    }

    /// Argmax over scores; the index order is shuffled first so ties
    /// break uniformly.
    fn best_technique(&mut self) -> usize {
        let mut order: Vec<usize> = (0..self.techniques.len()).collect();
        order.shuffle(&mut self.rng);
        let mut best = order[0];
        let mut best_score = self.score(best);
        for &candidate in &order[1..] {
            let score = self.score(candidate);
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }
        best
    }
}

impl Default for AucBandit {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTechnique for AucBandit {
    fn initialize(&mut self, dimensionality: usize) {
        for technique in &mut self.techniques {
            technique.initialize(dimensionality);
        }
        let n = self.techniques.len();
        self.current_technique = 0;
        self.current_best_cost = f64::INFINITY;
        self.window.clear();
        self.uses = vec![0; n];
        self.raw_auc = vec![0; n];
        self.decay = vec![0; n];
    }

    fn finalize(&mut self) {
        for technique in &mut self.techniques {
            technique.finalize();
        }
    }

    fn next_coordinates(&mut self) -> HashSet<Coordinates> {
        self.current_technique = self.best_technique();
        self.techniques[self.current_technique].next_coordinates()
    }

    fn report_costs(&mut self, costs: &HashMap<Coordinates, Option<Cost>>) {
        self.techniques[self.current_technique].report_costs(costs);

        let min_cost = costs
            .values()
            .filter_map(|c| *c)
            .fold(f64::INFINITY, f64::min);
        let improved = min_cost < self.current_best_cost;
        if improved {
            self.current_best_cost = min_cost;
        }

        let technique = self.current_technique;
        self.push_outcome(technique, improved);
    }

    fn name(&self) -> &'static str {
        "AucBandit"
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({
            "kind": self.name(),
            "techniques": self.techniques.iter().map(|t| t.descriptor()).collect::<Vec<_>>(),
            "c": self.c,
            "window_size": self.window_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::RandomSearch;
    use super::*;

    fn bandit_over(n: usize, window: usize) -> AucBandit {
        let techniques: Vec<Box<dyn SearchTechnique + Send>> = (0..n)
            .map(|i| Box::new(RandomSearch::with_seed(i as u64)) as _)
            .collect();
        AucBandit::with_techniques(techniques, StdRng::seed_from_u64(99)).window_size(window)
    }

    fn run_step(bandit: &mut AucBandit, cost: Cost) -> usize {
        let point = bandit.next_coordinates().iter().next().unwrap().clone();
        bandit.report_costs(&HashMap::from([(point, Some(cost))]));
        bandit.current_technique
    }

    #[test]
    fn test_window_invariants_hold() {
        let mut bandit = bandit_over(3, 10);
        bandit.initialize(2);
        for i in 0..50 {
            run_step(&mut bandit, (100 - i) as f64);
            let total_uses: u64 = bandit.uses.iter().sum();
            assert_eq!(total_uses as usize, bandit.window.len());
            assert!(bandit.window.len() <= 10);
            for t in 0..3 {
                let uses = bandit.uses[t];
                assert!(bandit.raw_auc[t] <= uses * (uses + 1) / 2);
            }
        }
    }

    #[test]
    fn test_unused_techniques_score_infinite() {
        let mut bandit = bandit_over(2, 10);
        bandit.initialize(1);
        assert_eq!(bandit.score(0), f64::INFINITY);
        run_step(&mut bandit, 5.0);
        let used = bandit.current_technique;
        assert!(bandit.score(used).is_finite());
        assert_eq!(bandit.score(1 - used), f64::INFINITY);
    }

    #[test]
    fn test_improvement_is_against_own_best() {
        let mut bandit = bandit_over(1, 10);
        bandit.initialize(1);
        run_step(&mut bandit, 5.0);
        assert_eq!(bandit.current_best_cost, 5.0);
        run_step(&mut bandit, 7.0);
        assert_eq!(bandit.current_best_cost, 5.0);
        assert_eq!(bandit.decay[0], 1);
    }

    #[test]
    fn test_only_improving_technique_dominates() {
        let mut bandit = bandit_over(2, 100);
        bandit.initialize(1);
        let mut next_improving_cost = 100_000.0;
        let mut picks = [0u32; 2];
        for _ in 0..400 {
            let point = bandit.next_coordinates().iter().next().unwrap().clone();
            let chosen = bandit.current_technique;
            picks[chosen] += 1;
            let cost = if chosen == 0 {
                next_improving_cost -= 1.0;
                next_improving_cost
            } else {
                200_000.0
            };
            bandit.report_costs(&HashMap::from([(point, Some(cost))]));
        }
        // once both arms have been tried, the improving one wins every
        // selection; the other is picked at most a handful of times
        assert!(picks[0] > 380, "{picks:?}");
    }

    #[test]
    fn test_fixed_seed_gives_deterministic_selection() {
        let run = || {
            let mut bandit = bandit_over(3, 20);
            bandit.initialize(2);
            (0..30)
                .map(|i| run_step(&mut bandit, (50 - i) as f64))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
