//! # Search Techniques
//!
//! Two disjoint proposer contracts drive the tuner:
//!
//! * [`SearchTechnique`]: proposes points in the coordinate space
//!   `(0,1]^D`, one component per tuning parameter. All techniques
//!   except the exhaustive one speak coordinates, which keeps them
//!   agnostic of parameter counts, ranges, and constraints.
//! * [`SearchTechnique1D`]: proposes dense integer indices in
//!   `[0, constrained_size)`. Used by [`Exhaustive`].
//!
//! A proposal batch is usually a singleton. Costs for a batch are
//! reported exactly once, before the next batch is requested; invalid
//! configurations arrive as `None` and compare as `+∞` inside the
//! techniques. Every emitted coordinate is clamp-capped to
//! `[ulp(0), 1]` so it stays addressable.
//!
//! Each technique owns its PRNG stream; `with_seed` constructors make
//! runs reproducible.

mod auc_bandit;
mod differential_evolution;
mod exhaustive;
mod pattern_search;
mod random_search;
mod round_robin;
mod simulated_annealing;
mod torczon;

pub use auc_bandit::AucBandit;
pub use differential_evolution::DifferentialEvolution;
pub use exhaustive::Exhaustive;
pub use pattern_search::PatternSearch;
pub use random_search::RandomSearch;
pub use round_robin::RoundRobin;
pub use simulated_annealing::SimulatedAnnealing;
pub use torczon::Torczon;

use crate::tuning_data::Cost;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// Smallest positive coordinate: `ulp(0.0)`. Coordinates of exactly
/// zero would fall outside the addressable domain `(0,1]`.
pub(crate) const COORDINATE_FLOOR: f64 = 5e-324;

/// A point in the coordinate space `(0,1]^D`.
///
/// Components hash and compare by their bit representation so points
/// can key cost maps, mirroring how costs are handed back to
/// techniques.
#[derive(Debug, Clone)]
pub struct Coordinates(Vec<f64>);

impl Coordinates {
    pub fn new(components: Vec<f64>) -> Self {
        Coordinates(components)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for Coordinates {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for Coordinates {}

impl Hash for Coordinates {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in &self.0 {
            c.to_bits().hash(state);
        }
    }
}

impl From<Vec<f64>> for Coordinates {
    fn from(components: Vec<f64>) -> Self {
        Coordinates(components)
    }
}

/// Clamps every component into `[ulp(0), 1]`.
pub(crate) fn clamp_coordinates_capped(components: &[f64]) -> Coordinates {
    Coordinates(
        components
            .iter()
            .map(|c| c.clamp(COORDINATE_FLOOR, 1.0))
            .collect(),
    )
}

/// Wraps a stepped coordinate back into `(0,1]` by `fmod(|x|, 1)`.
pub(crate) fn wrap_unit(x: f64) -> f64 {
    if x <= 0.0 || x > 1.0 {
        x.abs() % 1.0
    } else {
        x
    }
}

/// Proposer over the coordinate space `(0,1]^D`.
pub trait SearchTechnique {
    /// Called once at tuning start with the dimensionality `D`.
    fn initialize(&mut self, dimensionality: usize);

    /// Called once at tuning end.
    fn finalize(&mut self) {}

    /// The next coordinates to evaluate. Called before each
    /// [`report_costs`](SearchTechnique::report_costs).
    fn next_coordinates(&mut self) -> HashSet<Coordinates>;

    /// Costs for the batch returned by the most recent
    /// [`next_coordinates`](SearchTechnique::next_coordinates) call;
    /// `None` marks an invalid configuration.
    fn report_costs(&mut self, costs: &HashMap<Coordinates, Option<Cost>>);

    /// Technique name for log descriptors.
    fn name(&self) -> &'static str;

    /// JSON descriptor for the tuning log.
    fn descriptor(&self) -> serde_json::Value {
        json!({ "kind": self.name() })
    }
}

/// Proposer over dense configuration indices.
pub trait SearchTechnique1D {
    /// Called once at tuning start with the constrained-space size.
    fn initialize(&mut self, search_space_size: u64);

    fn finalize(&mut self) {}

    /// The next indices in `[0, search_space_size)` to evaluate.
    fn next_indices(&mut self) -> HashSet<u64>;

    /// Costs for the most recent batch; `None` marks an invalid
    /// configuration.
    fn report_costs(&mut self, costs: &HashMap<u64, Option<Cost>>);

    fn name(&self) -> &'static str;

    fn descriptor(&self) -> serde_json::Value {
        json!({ "kind": self.name() })
    }
}

/// A technique of either addressing kind; the tuner never mixes the
/// two mid-run.
pub enum Technique {
    Coordinate(Box<dyn SearchTechnique + Send>),
    Index(Box<dyn SearchTechnique1D + Send>),
}

impl Technique {
    pub fn descriptor(&self) -> serde_json::Value {
        match self {
            Technique::Coordinate(t) => t.descriptor(),
            Technique::Index(t) => t.descriptor(),
        }
    }
}

impl<T: SearchTechnique + Send + 'static> From<T> for Technique {
    fn from(technique: T) -> Self {
        Technique::Coordinate(Box::new(technique))
    }
}

impl From<Exhaustive> for Technique {
    fn from(technique: Exhaustive) -> Self {
        Technique::Index(Box::new(technique))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_cap_bounds() {
        let clamped = clamp_coordinates_capped(&[-0.5, 0.0, 0.3, 1.0, 2.0]);
        assert_eq!(
            clamped.as_slice(),
            &[COORDINATE_FLOOR, COORDINATE_FLOOR, 0.3, 1.0, 1.0]
        );
        assert!(COORDINATE_FLOOR > 0.0);
    }

    #[test]
    fn test_wrap_unit() {
        assert_eq!(wrap_unit(0.4), 0.4);
        assert_eq!(wrap_unit(1.0), 1.0);
        assert!((wrap_unit(1.3) - 0.3).abs() < 1e-12);
        assert!((wrap_unit(-0.7) - 0.7).abs() < 1e-12);
        assert_eq!(wrap_unit(-2.0), 0.0);
    }

    #[test]
    fn test_coordinates_as_map_keys() {
        let a = Coordinates::new(vec![0.25, 0.5]);
        let b = Coordinates::new(vec![0.25, 0.5]);
        let mut costs: HashMap<Coordinates, Option<Cost>> = HashMap::new();
        costs.insert(a, Some(1.0));
        assert_eq!(costs.get(&b), Some(&Some(1.0)));
    }
}
