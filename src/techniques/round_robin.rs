//! Round-robin rotation over a set of coordinate techniques.

use super::{
    Coordinates, DifferentialEvolution, PatternSearch, SearchTechnique, SimulatedAnnealing,
    Torczon,
};
use crate::tuning_data::Cost;
use serde_json::json;
use std::collections::{HashMap, HashSet};

/// Step `k` proposes through technique `k mod K`; each cost report is
/// forwarded to the technique that produced the current proposal, then
/// the rotation advances. All inner techniques must be
/// coordinate-typed with the same dimensionality.
pub struct RoundRobin {
    techniques: Vec<Box<dyn SearchTechnique + Send>>,
    current: usize,
}

impl RoundRobin {
    /// The default rotation: simulated annealing, differential
    /// evolution, pattern search, Torczon.
    pub fn new() -> Self {
        Self::with_techniques(vec![
            Box::new(SimulatedAnnealing::new()),
            Box::new(DifferentialEvolution::new()),
            Box::new(PatternSearch::new()),
            Box::new(Torczon::new()),
        ])
    }

    /// The default rotation with per-technique seeds derived from one.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_techniques(vec![
            Box::new(SimulatedAnnealing::with_seed(seed)),
            Box::new(DifferentialEvolution::with_seed(seed.wrapping_add(1))),
            Box::new(PatternSearch::with_seed(seed.wrapping_add(2))),
            Box::new(Torczon::with_seed(seed.wrapping_add(3))),
        ])
    }

    pub fn with_techniques(techniques: Vec<Box<dyn SearchTechnique + Send>>) -> Self {
        assert!(!techniques.is_empty(), "expecting at least one technique");
        RoundRobin {
            techniques,
            current: 0,
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTechnique for RoundRobin {
    fn initialize(&mut self, dimensionality: usize) {
        for technique in &mut self.techniques {
            technique.initialize(dimensionality);
        }
        self.current = 0;
    }

    fn finalize(&mut self) {
        for technique in &mut self.techniques {
            technique.finalize();
        }
    }

    fn next_coordinates(&mut self) -> HashSet<Coordinates> {
        self.techniques[self.current].next_coordinates()
    }

    fn report_costs(&mut self, costs: &HashMap<Coordinates, Option<Cost>>) {
        self.techniques[self.current].report_costs(costs);
        self.current = (self.current + 1) % self.techniques.len();
    }

    fn name(&self) -> &'static str {
        "RoundRobin"
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({
            "kind": self.name(),
            "techniques": self.techniques.iter().map(|t| t.descriptor()).collect::<Vec<_>>(),
        })
    }
}
