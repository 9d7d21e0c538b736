//! Exhaustive enumeration of the search space by index.

use super::SearchTechnique1D;
use crate::tuning_data::Cost;
use std::collections::{HashMap, HashSet};

/// Emits indices `0, 1, …, |SP|-1` in order, wrapping back to 0 on
/// overflow. Cost reports are ignored. Serves as the ground-truth
/// baseline when the abort condition is "evaluate everything".
#[derive(Debug, Default)]
pub struct Exhaustive {
    next_index: u64,
    search_space_size: u64,
}

impl Exhaustive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchTechnique1D for Exhaustive {
    fn initialize(&mut self, search_space_size: u64) {
        self.next_index = 0;
        self.search_space_size = search_space_size;
    }

    fn next_indices(&mut self) -> HashSet<u64> {
        let indices = HashSet::from([self.next_index]);
        self.next_index += 1;
        if self.next_index >= self.search_space_size {
            self.next_index = 0;
        }
        indices
    }

    fn report_costs(&mut self, _costs: &HashMap<u64, Option<Cost>>) {}

    fn name(&self) -> &'static str {
        "Exhaustive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_in_order_and_wraps() {
        let mut technique = Exhaustive::new();
        technique.initialize(3);
        let drawn: Vec<u64> = (0..7)
            .map(|_| *technique.next_indices().iter().next().unwrap())
            .collect();
        assert_eq!(drawn, vec![0, 1, 2, 0, 1, 2, 0]);
    }
}
